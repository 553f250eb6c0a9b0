use std::sync::Arc;

use serenity::http::Http;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tradbridge_core::Config;
use tradbridge_gateway::cron::{parse_schedule, start_cron_runner};
use tradbridge_gateway::discord::{
    DiscordChannel, DiscordForum, DiscordThreads, start_discord_bot, start_reminder_bot,
};
use tradbridge_gateway::server;
use tradbridge_gateway::state::AppState;
use tradbridge_gateway::version_check::{CheckerClient, VersionChecker};
use tradbridge_gateway::{MessageChannel, ThreadSource};

/// Seconds between two evaluations of the version check schedule.
const CRON_CHECK_SECONDS: u64 = 60;

fn spawn_client(mut client: serenity::Client, name: &'static str) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = client.start().await {
            error!("{name} client error: {e}");
        }
    })
}

/// Schedule the version checker on the announcer bot's HTTP client.
fn start_version_check(
    config: &Config,
    http: Arc<Http>,
    db: tradbridge_db::BridgeDbPool,
) -> Result<Option<JoinHandle<()>>, Box<dyn std::error::Error>> {
    let settings = &config.settings.version_check;
    if !settings.enabled {
        info!("Version check disabled");
        return Ok(None);
    }
    let Some(forum_id) = config.settings.discord.forum_id else {
        warn!("Version check enabled but no discord.forum_id configured, skipping");
        return Ok(None);
    };

    let schedule = parse_schedule(&settings.schedule)?;
    let notifications = settings.notification_channel_id.map(|id| {
        Arc::new(DiscordChannel::new(http.clone(), id)) as Arc<dyn MessageChannel>
    });
    let threads: Arc<dyn ThreadSource> = Arc::new(DiscordThreads::new(http.clone()));
    let checker = Arc::new(VersionChecker::new(
        Arc::new(DiscordForum::new(http)),
        threads,
        notifications,
        db,
        CheckerClient::new(&settings.checker_url, settings.chunk_size)?,
        forum_id,
        settings.notified_retention_days,
    ));

    info!(schedule = %settings.schedule, "Version check scheduled (UTC)");
    let handle = start_cron_runner(
        "version_check",
        schedule,
        CRON_CHECK_SECONDS,
        move || {
            let checker = Arc::clone(&checker);
            async move {
                match checker.run_once().await {
                    Ok(report) => info!(
                        threads = report.threads,
                        tracked = report.tracked,
                        alerts = report.alerts.len(),
                        "Version check completed"
                    ),
                    Err(e) => error!("Version check failed: {e}"),
                }
            }
        },
    );
    Ok(Some(handle))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tradbridge_core::load_dotenv();

    // Load configuration
    let config = Config::load()?;

    // Initialize tracing
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.settings.logging.level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tradbridge_gateway::log_bridge::GatewayLogBridge)
        .init();
    info!("Configuration loaded");

    // Initialize database
    let db = tradbridge_db::BridgeDbPool::new().await?;
    info!("tradbridge database initialized");

    let state = Arc::new(AppState::new(config.settings.clone(), db.clone()));
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    // Announcer bot, publisher API access and version checker share one token
    if config.discord_enabled() {
        let token = config.discord_bot_token().map(str::to_string);
        if let Some(client) = start_discord_bot(token, Arc::clone(&state)).await? {
            let http = client.http.clone();
            tasks.push(spawn_client(client, "Announcer"));
            info!("Announcer bot started");

            if let Some(handle) = start_version_check(&config, http, db.clone())? {
                tasks.push(handle);
            }
        }
    } else {
        info!("Announcer bot not configured (set DISCORD_BOT_TOKEN and enable in config to enable)");
    }

    if config.reminder_enabled() {
        let token = config.reminder_bot_token().map(str::to_string);
        if let Some(client) = start_reminder_bot(token, config.settings.reminder.clone()).await? {
            tasks.push(spawn_client(client, "Reminder"));
            info!("Reminder bot started");
        }
    } else {
        info!("Reminder bot not configured (set REMINDER_DISCORD_TOKEN and enable in config to enable)");
    }

    if config.settings.gateway.host != "127.0.0.1" && config.settings.gateway.host != "localhost" {
        warn!(
            "Gateway binding to non-localhost address: {}. This may expose the API to remote access.",
            config.settings.gateway.host
        );
    }

    // Run server (this blocks)
    let bind_addr = config.bind_addr();
    info!("Starting tradbridge server on {}", bind_addr);
    let server_result = server::run(state, &bind_addr).await;

    // If we get here, the server stopped
    for task in tasks {
        task.abort();
    }
    db.close().await;

    server_result
}
