//! Web server exposing the workout tracking REST API.
//!
//! Provides authentication, CRUD for exercises, workouts and logs, progress
//! charts with rank badges, the strength standards table, and the language
//! model coach. Static frontend files are served when a directory is given.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
};
use chrono::{Duration, Local};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::auth::{AuthConfig, AuthUser, verify_password};
use crate::coach::{CoachClient, GeneratedPlan, LlmConfig, MAX_PLAN_WORKOUTS, PlanRequest};
use crate::database::{Database, NewLog};
use crate::domain::{
    Exercise, LogEntry, Workout, WorkoutLog, WorkoutLogDetail, deserialize_optional_weight,
    local_noon, parse_workout_date,
};
use crate::error::ApiError;
use crate::progress::{ChartData, Window, build_chart};
use crate::standards::{StandardsTable, TierThreshold};

/// Shared application state.
pub struct AppState {
    pub db: Database,
    /// Strength standards, replaced wholesale when the file is reloaded.
    pub standards: RwLock<StandardsTable>,
    pub auth: AuthConfig,
    pub llm: LlmConfig,
    /// Connection pool shared by request-scoped coach clients.
    pub http: reqwest::Client,
}

// === Request Types ===

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateExerciseRequest {
    pub name: Option<String>,
    pub category: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateWorkoutRequest {
    pub name: Option<String>,
    pub date: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateLogRequest {
    pub workout_id: Option<i64>,
    pub exercise_id: Option<i64>,
    pub sets: Option<i64>,
    pub reps: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_optional_weight")]
    pub weight_kg: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct ChartQuery {
    pub days: Option<u32>,
}

#[derive(Deserialize)]
pub struct CoachRequest {
    pub message: Option<String>,
}

#[derive(Deserialize)]
pub struct ApplyPlanRequest {
    pub workouts: Vec<String>,
}

// === JSON Response Types ===

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct CoachResponse {
    pub reply: String,
}

#[derive(Serialize)]
pub struct DistributionResponse {
    pub exercise: String,
    pub tiers: Vec<TierThreshold>,
}

// === Router Setup ===

/// Creates the application router.
pub fn create_router(state: Arc<AppState>, static_dir: Option<PathBuf>) -> Router {
    let api = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/exercises", get(list_exercises).post(create_exercise))
        .route("/api/exercises/{id}", delete(delete_exercise))
        .route("/api/workouts", get(list_workouts).post(create_workout))
        .route("/api/workouts/{id}", get(get_workout_logs).delete(delete_workout))
        .route("/api/logs", post(create_log))
        .route("/api/logs/{id}", delete(delete_log))
        .route("/api/progress/{exercise_id}", get(get_progress_history))
        .route("/api/progress/{exercise_id}/chart", get(get_progress_chart))
        .route("/api/standards", get(get_standards))
        .route("/api/standards/{name}", get(get_exercise_standards))
        .route("/api/catalog", get(get_catalog))
        .route("/api/coach", post(ask_coach))
        .route("/api/generate-plan", post(generate_plan))
        .route("/api/plans/apply", post(apply_plan))
        .layer(CorsLayer::permissive())
        .with_state(state);

    match static_dir {
        Some(dir) => {
            api.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true))
        }
        None => api,
    }
}

/// Runs the web server.
pub async fn run_server(
    state: Arc<AppState>,
    port: u16,
    static_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let app = create_router(state, static_dir);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    println!("Server is running on http://localhost:{}", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// === Helper Functions ===

/// Unwraps a JSON body, turning extractor rejections into JSON 400s.
fn json_body<T: DeserializeOwned>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

/// Unwraps a path parameter, turning extractor rejections into JSON 400s.
fn path_param<T>(param: Result<Path<T>, PathRejection>) -> Result<T, ApiError> {
    param
        .map(|Path(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

/// Returns the trimmed value if present and non-blank.
fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn positive_u32(value: Option<i64>) -> Option<u32> {
    value
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
}

// === Auth Handlers ===

/// GET /api/health
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /api/auth/signup - Register and return a token.
async fn signup(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let body = json_body(payload)?;
    let (Some(email), Some(username), Some(password)) = (
        required(body.email),
        required(body.username),
        body.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request(
            "Email, username and password are required",
        ));
    };

    if state.db.user_exists(&email, &username).await? {
        return Err(ApiError::bad_request("Email or Username already taken"));
    }

    let auth = state.auth.clone();
    let password_hash = tokio::task::spawn_blocking(move || auth.hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    let user = match state.db.create_user(&email, &username, &password_hash).await {
        Ok(user) => user,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(ApiError::bad_request("Email or Username already taken"));
        }
        Err(e) => return Err(e.into()),
    };

    log::info!("New user registered: {}", user.user_id);

    let token = state.auth.issue_token(user.user_id)?;
    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

/// POST /api/auth/login - Exchange credentials for a token.
async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let body = json_body(payload)?;
    let (Some(email), Some(password)) = (required(body.email), body.password) else {
        return Err(ApiError::InvalidCredentials);
    };

    let Some(user) = state.db.find_user_by_email(&email).await? else {
        log::warn!("Login attempt for unknown email");
        return Err(ApiError::InvalidCredentials);
    };

    let hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    if !valid {
        log::warn!("Invalid password for user {}", user.user_id);
        return Err(ApiError::InvalidCredentials);
    }

    let token = state.auth.issue_token(user.user_id)?;
    Ok(Json(TokenResponse { token }))
}

// === Exercise Handlers ===

/// GET /api/exercises - Shared and own exercises, by name.
async fn list_exercises(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<Exercise>>, ApiError> {
    Ok(Json(state.db.list_exercises(user.user_id).await?))
}

/// POST /api/exercises
async fn create_exercise(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: Result<Json<CreateExerciseRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Exercise>), ApiError> {
    let body = json_body(payload)?;
    let (Some(name), Some(category)) = (required(body.name), required(body.category)) else {
        return Err(ApiError::bad_request("Name and category are required"));
    };

    let exercise = state
        .db
        .create_exercise(user.user_id, &name, &category)
        .await?;
    Ok((StatusCode::CREATED, Json(exercise)))
}

/// DELETE /api/exercises/:id
async fn delete_exercise(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = path_param(id)?;
    if !state.db.delete_exercise(user.user_id, id).await? {
        return Err(ApiError::NotFound("Exercise"));
    }
    Ok(Json(MessageResponse {
        message: "Exercise deleted",
    }))
}

// === Workout Handlers ===

/// GET /api/workouts - The user's workouts, newest first.
async fn list_workouts(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<Workout>>, ApiError> {
    Ok(Json(state.db.list_workouts(user.user_id).await?))
}

/// POST /api/workouts - Date defaults to now.
async fn create_workout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: Result<Json<CreateWorkoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Workout>), ApiError> {
    let body = json_body(payload)?;
    let name = required(body.name).ok_or_else(|| ApiError::bad_request("Workout name is required"))?;

    let workout_date = match required(body.date) {
        Some(date) => parse_workout_date(&date)
            .ok_or_else(|| ApiError::bad_request(format!("Invalid workout date: {}", date)))?,
        None => chrono::Utc::now(),
    };

    let workout = state
        .db
        .create_workout(user.user_id, &name, workout_date)
        .await?;
    Ok((StatusCode::CREATED, Json(workout)))
}

/// GET /api/workouts/:id - Logs of one workout with exercise names.
async fn get_workout_logs(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<WorkoutLogDetail>>, ApiError> {
    let id = path_param(id)?;
    if state.db.get_workout(user.user_id, id).await?.is_none() {
        return Err(ApiError::NotFound("Workout"));
    }
    Ok(Json(state.db.workout_logs(user.user_id, id).await?))
}

/// DELETE /api/workouts/:id - Removes the workout and its logs.
async fn delete_workout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = path_param(id)?;
    if !state.db.delete_workout(user.user_id, id).await? {
        return Err(ApiError::NotFound("Workout"));
    }
    Ok(Json(MessageResponse {
        message: "Workout deleted",
    }))
}

// === Log Handlers ===

/// POST /api/logs
async fn create_log(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: Result<Json<CreateLogRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<WorkoutLog>), ApiError> {
    let body = json_body(payload)?;
    let (Some(workout_id), Some(exercise_id), Some(sets), Some(reps), Some(weight_kg)) = (
        body.workout_id,
        body.exercise_id,
        positive_u32(body.sets),
        positive_u32(body.reps),
        body.weight_kg.filter(|w| w.is_finite() && *w > 0.0),
    ) else {
        return Err(ApiError::bad_request("Missing required log fields"));
    };

    if state.db.get_workout(user.user_id, workout_id).await?.is_none() {
        return Err(ApiError::NotFound("Workout"));
    }
    if state.db.get_exercise(user.user_id, exercise_id).await?.is_none() {
        return Err(ApiError::NotFound("Exercise"));
    }

    let log = state
        .db
        .create_log(&NewLog {
            workout_id,
            exercise_id,
            sets,
            reps,
            weight_kg,
            notes: required(body.notes),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(log)))
}

/// DELETE /api/logs/:id
async fn delete_log(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = path_param(id)?;
    if !state.db.delete_log(user.user_id, id).await? {
        return Err(ApiError::NotFound("Log"));
    }
    Ok(Json(MessageResponse {
        message: "Log deleted",
    }))
}

// === Progress Handlers ===

async fn visible_exercise(
    state: &AppState,
    user: AuthUser,
    exercise_id: i64,
) -> Result<Exercise, ApiError> {
    state
        .db
        .get_exercise(user.user_id, exercise_id)
        .await?
        .ok_or(ApiError::NotFound("Exercise"))
}

/// GET /api/progress/:exercise_id - Raw history, oldest first.
async fn get_progress_history(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    exercise_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    let exercise_id = path_param(exercise_id)?;
    visible_exercise(&state, user, exercise_id).await?;
    Ok(Json(
        state.db.exercise_history(user.user_id, exercise_id).await?,
    ))
}

/// GET /api/progress/:exercise_id/chart?days=N - Chart payload and rank.
async fn get_progress_chart(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    exercise_id: Result<Path<i64>, PathRejection>,
    query: Result<Query<ChartQuery>, QueryRejection>,
) -> Result<Json<ChartData>, ApiError> {
    let exercise_id = path_param(exercise_id)?;
    let Query(query) = query.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let window = match query.days {
        Some(days) => Window::try_from(days).map_err(|e| ApiError::bad_request(e.to_string()))?,
        None => Window::default(),
    };

    let exercise = visible_exercise(&state, user, exercise_id).await?;
    let history = state.db.exercise_history(user.user_id, exercise_id).await?;
    let today = Local::now().date_naive();

    let standards = state.standards.read().await;
    let chart = build_chart(&exercise.name, &history, window, today, &standards);

    Ok(Json(chart))
}

// === Standards Handlers ===

/// GET /api/standards - The whole standards table.
async fn get_standards(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Json<StandardsTable> {
    Json(state.standards.read().await.clone())
}

/// GET /api/standards/:name - One exercise's tiers, Apex first.
async fn get_exercise_standards(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    name: Result<Path<String>, PathRejection>,
) -> Result<Json<DistributionResponse>, ApiError> {
    let name = path_param(name)?;
    let standards = state.standards.read().await;
    let tiers = standards
        .distribution(&name)
        .ok_or(ApiError::NotFound("Standards"))?;

    Ok(Json(DistributionResponse {
        exercise: name,
        tiers,
    }))
}

/// GET /api/catalog - Built-in exercises grouped by category.
async fn get_catalog(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Json<BTreeMap<String, Vec<String>>> {
    Json(state.standards.read().await.catalog.clone())
}

// === Coach Handlers ===

/// POST /api/coach - Ask the coach a question.
async fn ask_coach(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    payload: Result<Json<CoachRequest>, JsonRejection>,
) -> Result<Json<CoachResponse>, ApiError> {
    let body = json_body(payload)?;
    let message = required(body.message).ok_or_else(|| ApiError::bad_request("Message is required"))?;

    let upstream = |source| ApiError::Upstream {
        message: "Failed to get advice",
        source,
    };
    let coach = CoachClient::new(state.http.clone(), &state.llm).map_err(upstream)?;
    let reply = coach.ask(&message).await.map_err(upstream)?;

    Ok(Json(CoachResponse { reply }))
}

/// POST /api/generate-plan - Generate a weekly split from onboarding answers.
async fn generate_plan(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Result<Json<GeneratedPlan>, ApiError> {
    let request = json_body(payload)?;
    if request.days == 0 || request.days as usize > MAX_PLAN_WORKOUTS {
        return Err(ApiError::bad_request(format!(
            "Days must be between 1 and {}",
            MAX_PLAN_WORKOUTS
        )));
    }

    let upstream = |source| ApiError::Upstream {
        message: "AI failed to generate plan",
        source,
    };
    let coach = CoachClient::new(state.http.clone(), &state.llm).map_err(upstream)?;
    let plan = coach.generate_plan(&request).await.map_err(upstream)?;

    Ok(Json(plan))
}

/// POST /api/plans/apply - One workout per day starting today at noon.
async fn apply_plan(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: Result<Json<ApplyPlanRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<Workout>>), ApiError> {
    let body = json_body(payload)?;
    let names: Vec<String> = body
        .workouts
        .into_iter()
        .filter_map(|w| required(Some(w)))
        .collect();

    if names.is_empty() || names.len() > MAX_PLAN_WORKOUTS {
        return Err(ApiError::bad_request(format!(
            "A plan needs between 1 and {} workouts",
            MAX_PLAN_WORKOUTS
        )));
    }

    let today = Local::now().date_naive();
    let mut scheduled = Vec::with_capacity(names.len());
    for (offset, name) in names.into_iter().enumerate() {
        let day = today + Duration::days(offset as i64);
        let date = local_noon(day)
            .ok_or_else(|| ApiError::Internal(format!("no local noon on {}", day)))?;
        scheduled.push((name, date));
    }

    let created = state.db.create_workouts(user.user_id, &scheduled).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
