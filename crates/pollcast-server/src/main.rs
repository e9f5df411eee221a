use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod import;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pollcast=info,tower_http=debug"));
    if std::env::var("POLLCAST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let args = cli::Args::parse();
    let config = config::Config::load(&args.config)?;

    ensure_data_dir(&config.database.url);
    let db = pollcast_db::create_pool(&config.database.url, config.database.max_connections).await?;
    pollcast_db::run_migrations(&db).await?;

    match args.command {
        Some(cli::Command::ImportChatList { path }) => {
            let summary = import::import_chat_list_file(&db, &path).await?;
            println!(
                "Imported {} of {} chats ({} already known, {} skipped)",
                summary.imported, summary.found, summary.already_known, summary.skipped
            );
            Ok(())
        }
        Some(cli::Command::Serve) | None => serve(config, db).await,
    }
}

async fn serve(config: config::Config, db: pollcast_db::DbPool) -> Result<()> {
    let bot = pollcast_telegram::TelegramClient::with_api_base(
        config.telegram.bot_token.trim(),
        &config.telegram.api_base_url,
    )?;
    if !bot.has_token() {
        tracing::warn!("No bot token configured, sends and webhook setup are disabled");
    }

    let app_config = config.app_config();
    if app_config.webhook_secret.is_none() {
        tracing::warn!("No webhook secret configured, /api/webhook accepts unauthenticated calls");
    }
    if app_config.admin_token.is_none() {
        tracing::warn!("No admin token configured, admin routes are open");
    }

    let state = pollcast_core::AppState {
        db,
        bot,
        config: app_config,
    };
    let app = pollcast_api::build_router().with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(
        bind = %config.server.bind_address,
        database = %config.database.url,
        "pollcast server listening"
    );

    let shutdown_signal = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutting down...");
    };

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    Ok(())
}

/// Creates the directory holding a file-backed SQLite database.
fn ensure_data_dir(database_url: &str) {
    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return;
    }
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("Failed to create data directory {:?}: {}", parent, e);
        }
    }
}
