//! SQLite persistence for users, exercises, workouts and logs.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::domain::{Exercise, LogEntry, User, Workout, WorkoutLog, WorkoutLogDetail};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS exercises (
    exercise_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    user_id INTEGER REFERENCES users(user_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS workouts (
    workout_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    workout_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS workout_logs (
    log_id INTEGER PRIMARY KEY AUTOINCREMENT,
    workout_id INTEGER NOT NULL REFERENCES workouts(workout_id) ON DELETE CASCADE,
    exercise_id INTEGER NOT NULL REFERENCES exercises(exercise_id) ON DELETE CASCADE,
    sets INTEGER NOT NULL,
    reps INTEGER NOT NULL,
    weight_kg REAL NOT NULL,
    notes TEXT
);

CREATE INDEX IF NOT EXISTS idx_workouts_user_date ON workouts(user_id, workout_date);
CREATE INDEX IF NOT EXISTS idx_logs_exercise ON workout_logs(exercise_id);
";

/// Fields of a new workout log.
#[derive(Debug, Clone)]
pub struct NewLog {
    pub workout_id: i64,
    pub exercise_id: i64,
    pub sets: u32,
    pub reps: u32,
    pub weight_kg: f64,
    pub notes: Option<String>,
}

/// Handle to the application database.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connects to a SQLite database URL and creates the schema.
    ///
    /// In-memory databases are limited to one connection so every query sees
    /// the same data.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;
        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    // === Users ===

    /// Returns true if the email or username is already registered.
    pub async fn user_exists(&self, email: &str, username: &str) -> Result<bool, sqlx::Error> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = $1 OR username = $2")
                .bind(email)
                .bind(username)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    pub async fn create_user(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r"
            INSERT INTO users (email, username, password_hash, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id, email, username, password_hash, created_at
            ",
        )
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT user_id, email, username, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    // === Exercises ===

    /// Inserts catalog exercises as shared rows if no shared exercise exists yet.
    ///
    /// Returns the number of exercises inserted.
    pub async fn seed_exercises(
        &self,
        catalog: &BTreeMap<String, Vec<String>>,
    ) -> Result<u64, sqlx::Error> {
        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM exercises WHERE user_id IS NULL")
                .fetch_one(&self.pool)
                .await?;
        if existing > 0 {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for (category, names) in catalog {
            for name in names {
                sqlx::query("INSERT INTO exercises (name, category, user_id) VALUES ($1, $2, NULL)")
                    .bind(name)
                    .bind(category)
                    .execute(&mut *tx)
                    .await?;
                inserted += 1;
            }
        }
        tx.commit().await?;

        Ok(inserted)
    }

    /// Shared exercises plus the user's own, ordered by name.
    pub async fn list_exercises(&self, user_id: i64) -> Result<Vec<Exercise>, sqlx::Error> {
        sqlx::query_as::<_, Exercise>(
            r"
            SELECT exercise_id, name, category, user_id
            FROM exercises
            WHERE user_id IS NULL OR user_id = $1
            ORDER BY name
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// An exercise visible to the user.
    pub async fn get_exercise(
        &self,
        user_id: i64,
        exercise_id: i64,
    ) -> Result<Option<Exercise>, sqlx::Error> {
        sqlx::query_as::<_, Exercise>(
            r"
            SELECT exercise_id, name, category, user_id
            FROM exercises
            WHERE exercise_id = $1 AND (user_id IS NULL OR user_id = $2)
            ",
        )
        .bind(exercise_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn create_exercise(
        &self,
        user_id: i64,
        name: &str,
        category: &str,
    ) -> Result<Exercise, sqlx::Error> {
        sqlx::query_as::<_, Exercise>(
            r"
            INSERT INTO exercises (name, category, user_id)
            VALUES ($1, $2, $3)
            RETURNING exercise_id, name, category, user_id
            ",
        )
        .bind(name)
        .bind(category)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }

    /// Deletes one of the user's own exercises. Shared exercises are kept.
    pub async fn delete_exercise(&self, user_id: i64, exercise_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM exercises WHERE exercise_id = $1 AND user_id = $2")
            .bind(exercise_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // === Workouts ===

    pub async fn create_workout(
        &self,
        user_id: i64,
        name: &str,
        workout_date: DateTime<Utc>,
    ) -> Result<Workout, sqlx::Error> {
        sqlx::query_as::<_, Workout>(
            r"
            INSERT INTO workouts (name, user_id, workout_date)
            VALUES ($1, $2, $3)
            RETURNING workout_id, user_id, name, workout_date
            ",
        )
        .bind(name)
        .bind(user_id)
        .bind(workout_date)
        .fetch_one(&self.pool)
        .await
    }

    /// Creates several workouts atomically.
    pub async fn create_workouts(
        &self,
        user_id: i64,
        workouts: &[(String, DateTime<Utc>)],
    ) -> Result<Vec<Workout>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(workouts.len());

        for (name, date) in workouts {
            let workout = sqlx::query_as::<_, Workout>(
                r"
                INSERT INTO workouts (name, user_id, workout_date)
                VALUES ($1, $2, $3)
                RETURNING workout_id, user_id, name, workout_date
                ",
            )
            .bind(name)
            .bind(user_id)
            .bind(date)
            .fetch_one(&mut *tx)
            .await?;
            created.push(workout);
        }

        tx.commit().await?;
        Ok(created)
    }

    /// The user's workouts, newest first.
    pub async fn list_workouts(&self, user_id: i64) -> Result<Vec<Workout>, sqlx::Error> {
        sqlx::query_as::<_, Workout>(
            r"
            SELECT workout_id, user_id, name, workout_date
            FROM workouts
            WHERE user_id = $1
            ORDER BY workout_date DESC, workout_id DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get_workout(
        &self,
        user_id: i64,
        workout_id: i64,
    ) -> Result<Option<Workout>, sqlx::Error> {
        sqlx::query_as::<_, Workout>(
            r"
            SELECT workout_id, user_id, name, workout_date
            FROM workouts
            WHERE workout_id = $1 AND user_id = $2
            ",
        )
        .bind(workout_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Logs of one of the user's workouts with exercise names.
    pub async fn workout_logs(
        &self,
        user_id: i64,
        workout_id: i64,
    ) -> Result<Vec<WorkoutLogDetail>, sqlx::Error> {
        sqlx::query_as::<_, WorkoutLogDetail>(
            r"
            SELECT wl.log_id, wl.exercise_id, e.name AS exercise_name,
                   wl.sets, wl.reps, wl.weight_kg, wl.notes
            FROM workout_logs wl
            JOIN exercises e ON wl.exercise_id = e.exercise_id
            JOIN workouts w ON wl.workout_id = w.workout_id
            WHERE wl.workout_id = $1 AND w.user_id = $2
            ORDER BY wl.log_id
            ",
        )
        .bind(workout_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Deletes one of the user's workouts; its logs cascade.
    pub async fn delete_workout(&self, user_id: i64, workout_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workouts WHERE workout_id = $1 AND user_id = $2")
            .bind(workout_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // === Logs ===

    pub async fn create_log(&self, log: &NewLog) -> Result<WorkoutLog, sqlx::Error> {
        sqlx::query_as::<_, WorkoutLog>(
            r"
            INSERT INTO workout_logs (workout_id, exercise_id, sets, reps, weight_kg, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING log_id, workout_id, exercise_id, sets, reps, weight_kg, notes
            ",
        )
        .bind(log.workout_id)
        .bind(log.exercise_id)
        .bind(log.sets)
        .bind(log.reps)
        .bind(log.weight_kg)
        .bind(log.notes.as_deref())
        .fetch_one(&self.pool)
        .await
    }

    /// Deletes a log if it belongs to one of the user's workouts.
    pub async fn delete_log(&self, user_id: i64, log_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            DELETE FROM workout_logs
            WHERE log_id = $1
              AND workout_id IN (SELECT workout_id FROM workouts WHERE user_id = $2)
            ",
        )
        .bind(log_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Full history of an exercise for a user, oldest first.
    pub async fn exercise_history(
        &self,
        user_id: i64,
        exercise_id: i64,
    ) -> Result<Vec<LogEntry>, sqlx::Error> {
        sqlx::query_as::<_, LogEntry>(
            r"
            SELECT w.workout_date, wl.weight_kg, wl.reps, wl.sets
            FROM workout_logs wl
            JOIN workouts w ON wl.workout_id = w.workout_id
            WHERE wl.exercise_id = $1 AND w.user_id = $2
            ORDER BY w.workout_date ASC, wl.log_id ASC
            ",
        )
        .bind(exercise_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }
}
