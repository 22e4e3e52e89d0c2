mod auth;
mod coach;
mod database;
mod domain;
mod error;
mod formulas;
mod progress;
mod server;
mod standards;
mod watcher;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::RwLock;

use crate::auth::AuthConfig;
use crate::coach::{DEFAULT_BASE_URL, DEFAULT_MODEL, LlmConfig};
use crate::database::Database;
use crate::server::AppState;
use crate::standards::StandardsTable;
use crate::watcher::{WatcherConfig, watch_file};

/// Workout logging with strength scores, ranks and an AI coach.
#[derive(Parser, Debug)]
#[command(name = "strengthlog")]
#[command(about = "Workout tracker with progress charts, strength ranks and an AI coach")]
#[command(version)]
struct Args {
    /// SQLite database URL.
    #[arg(
        long,
        env = "STRENGTHLOG_DATABASE_URL",
        default_value = "sqlite://strengthlog.db?mode=rwc"
    )]
    database_url: String,

    /// Port number for the web server.
    #[arg(long, env = "STRENGTHLOG_PORT", default_value = "5000")]
    port: u16,

    /// JSON file with strength standards, reloaded when it changes.
    /// The built-in table is used when omitted.
    #[arg(long, value_name = "FILE", env = "STRENGTHLOG_STANDARDS")]
    standards: Option<PathBuf>,

    /// Secret used to sign access tokens.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,

    /// Lifetime of access tokens in minutes.
    #[arg(long, env = "STRENGTHLOG_TOKEN_TTL", default_value = "60")]
    token_ttl_minutes: i64,

    /// API key for the language model. The coach is disabled without it.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    openai_base_url: String,

    /// Chat model used by the coach.
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    openai_model: String,

    /// Directory with frontend files. Defaults to ./static if present.
    #[arg(long, value_name = "DIR", env = "STRENGTHLOG_STATIC")]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    if args.jwt_secret.trim().is_empty() {
        anyhow::bail!("JWT_SECRET must not be empty");
    }
    if args.token_ttl_minutes <= 0 {
        anyhow::bail!("Token lifetime must be positive, got {}", args.token_ttl_minutes);
    }

    let standards_path = args
        .standards
        .as_ref()
        .map(|p| {
            p.canonicalize()
                .with_context(|| format!("Failed to resolve path: {}", p.display()))
        })
        .transpose()?;

    let standards = load_standards(standards_path.as_deref())?;

    let db = Database::connect(&args.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", args.database_url))?;
    let seeded = db
        .seed_exercises(&standards.catalog)
        .await
        .context("Failed to seed exercise catalog")?;

    let llm = LlmConfig {
        api_key: args.openai_api_key.filter(|k| !k.trim().is_empty()),
        base_url: args.openai_base_url,
        model: args.openai_model,
        ..LlmConfig::default()
    };
    let http = llm.http_client().context("Failed to build HTTP client")?;

    println!();
    println!("=== StrengthLog ===");
    println!();
    println!("Database: {}", args.database_url);
    if seeded > 0 {
        println!("Seeded {} catalog exercises", seeded);
    }
    match &llm.api_key {
        Some(_) => println!("AI coach: {} via {}", llm.model, llm.base_url),
        None => println!("AI coach: disabled (no OPENAI_API_KEY)"),
    }

    let state = Arc::new(AppState {
        db,
        standards: RwLock::new(standards),
        auth: AuthConfig::new(
            args.jwt_secret,
            chrono::Duration::minutes(args.token_ttl_minutes),
        ),
        llm,
        http,
    });

    let static_dir = args.static_dir.or_else(find_static_dir);
    if let Some(dir) = &static_dir {
        println!("Static files: {}", dir.display());
    }

    if let Some(path) = standards_path {
        let watcher_state = state.clone();
        tokio::spawn(async move {
            let config = WatcherConfig::default();
            let retry_config = config.clone();
            let reload_path = path.clone();

            if let Err(e) = watch_file(&path, config, move || {
                let state = watcher_state.clone();
                let config = retry_config.clone();
                let path = reload_path.clone();
                tokio::spawn(async move {
                    reload_with_retry(&state, &path, &config).await;
                });
            })
            .await
            {
                log::error!("Standards watcher error: {}", e);
            }
        });

        println!("Live reload enabled - watching standards for changes");
    }

    println!();
    server::run_server(state, args.port, static_dir).await?;

    Ok(())
}

/// Loads the standards table from a file, or the built-in one.
fn load_standards(path: Option<&Path>) -> Result<StandardsTable> {
    let table = match path {
        Some(path) => {
            println!("Loading strength standards from: {}", path.display());
            StandardsTable::load(path)
                .with_context(|| format!("Failed to load standards from {}", path.display()))?
        }
        None => StandardsTable::builtin().context("Built-in standards are invalid")?,
    };

    println!(
        "Strength standards: {} exercises in {} categories",
        table.len(),
        table.catalog.len()
    );

    Ok(table)
}

/// Reloads the standards file, retrying on transient failures.
///
/// Editors may leave the file briefly empty or half-written, so a failed
/// parse is retried before keeping the previous table.
async fn reload_with_retry(state: &AppState, path: &Path, config: &WatcherConfig) {
    let mut last_error = None;

    for attempt in 0..config.retry_attempts {
        match StandardsTable::load(path) {
            Ok(table) => {
                let count = table.len();
                *state.standards.write().await = table;
                log::info!("Strength standards reloaded ({} exercises)", count);
                return;
            }
            Err(e) => {
                log::warn!("Reload attempt {} failed: {}", attempt + 1, e);
                last_error = Some(e);
                tokio::time::sleep(config.retry_delay).await;
            }
        }
    }

    if let Some(e) = last_error {
        log::error!(
            "Failed to reload standards after {} attempts, keeping previous table: {}",
            config.retry_attempts,
            e
        );
    }
}

/// Finds the static directory for serving frontend files.
fn find_static_dir() -> Option<PathBuf> {
    let cwd_static = PathBuf::from("static");
    if cwd_static.is_dir() {
        return Some(cwd_static);
    }

    if let Ok(exe_path) = std::env::current_exe()
        && let Some(exe_dir) = exe_path.parent()
    {
        let exe_static = exe_dir.join("static");
        if exe_static.is_dir() {
            return Some(exe_static);
        }
    }

    None
}
