// Framework bootstrap: runtime init, dependency wiring, router assembly.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::get};

use crate::frameworks::config::{self, Config};
use crate::frameworks::db;
use crate::interface_adapters::clients::blocklist::BlockList;
use crate::interface_adapters::clients::discord::DiscordClient;
use crate::interface_adapters::clients::levels::FileLevelCatalog;
use crate::interface_adapters::net::{leaderboard_handler, status_handler, ws_handler};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::profanity::WordListProfanityFilter;
use crate::use_cases::match_engine::MatchSettings;
use crate::use_cases::matchmaker::{MatchRegistry, MatchmakerSettings};

fn init_runtime() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener, cfg: Config) -> std::io::Result<()> {
    let address = listener.local_addr()?;
    let state = build_state(&cfg)
        .await
        .map_err(|e| std::io::Error::other(format!("failed to initialize state: {e}")))?;

    tokio::spawn(state.matches.clone().run_reaper());
    tokio::spawn(maintenance_loop(state.clone()));

    let app = Router::new()
        .route("/royale/ws", get(ws_handler))
        .route(&cfg.status_path, get(status_handler))
        .route(&cfg.leader_board_path, get(leaderboard_handler))
        .with_state(state)
        .into_make_service_with_connect_info::<SocketAddr>();

    tracing::info!(%address, "listening");

    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> std::io::Result<()> {
    init_runtime();

    let cfg = Config::load();
    let address = SocketAddr::from(([0, 0, 0, 0], cfg.listen_port));

    let listener = tokio::net::TcpListener::bind(address).await.inspect_err(|e| {
        tracing::error!(%address, error = %e, "failed to bind");
    })?;

    run(listener, cfg).await
}

const BANNED_WORDS: &[&str] = &["admin", "moderator", "fuck", "shit", "nigger", "cunt"];

async fn build_state(cfg: &Config) -> Result<Arc<AppState>, Box<dyn std::error::Error>> {
    let pool = db::connect_pool(&cfg.database_url).await?;
    db::run_migrations(&pool).await?;
    let accounts: Arc<dyn crate::domain::ports::AccountStore> = Arc::new(db::PgAccountStore::new(pool));

    let profanity: Arc<dyn crate::domain::ports::ProfanityFilter> =
        Arc::new(WordListProfanityFilter::new(BANNED_WORDS.iter().map(|w| w.to_string())));

    let level_catalog: Arc<dyn crate::domain::ports::LevelCatalog> = Arc::new(FileLevelCatalog::new(&cfg.levels_dir));

    let discord = Arc::new(DiscordClient::new(cfg.discord_webhook_url.clone(), Duration::from_secs(5))?);

    let blocklist = Arc::new(BlockList::load(&cfg.blocked_json_path));

    let matches = Arc::new(MatchRegistry::new(
        MatchmakerSettings {
            player_min: cfg.player_min,
            player_cap: cfg.player_cap,
            allow_late_enter: cfg.allow_late_enter,
            engine: MatchSettings {
                auto_start_time: cfg.auto_start_time,
                start_timer_seconds: cfg.start_timer.as_secs() as u32,
                enable_auto_start_in_multi_private: cfg.enable_auto_start_in_multi_private,
                enable_level_select_in_multi_private: cfg.enable_level_select_in_multi_private,
                enable_vote_start: cfg.enable_vote_start,
                vote_rate_to_start: cfg.vote_rate_to_start,
                coin_reward_flagpole: cfg.coin_reward_flagpole,
                coin_reward_podium: cfg.coin_reward_podium,
                default_name: cfg.default_name.clone(),
                default_team: cfg.default_team.clone(),
            },
        },
        level_catalog.clone(),
        accounts.clone(),
        discord.clone(),
    ));

    Ok(Arc::new(AppState {
        matches,
        accounts,
        profanity,
        level_catalog,
        discord,
        max_simul_ip: cfg.max_simul_ip,
        default_name: cfg.default_name.clone(),
        default_team: cfg.default_team.clone(),
        connections_by_ip: Default::default(),
        authenticated_usernames: Default::default(),
        blocklist,
        login_attempts: Default::default(),
        login_blocked_until: Default::default(),
    }))
}

/// Watches for a `shutdown` sentinel file in the working directory and
/// drains the server: one hurry-up broadcast, then polling until every
/// match is empty or `SHUTDOWN_DEADLINE_AFTER` elapses, then exits the
/// process.
async fn maintenance_loop(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(config::MAINTENANCE_INTERVAL);
    let mut draining = false;
    let mut drain_deadline = None;

    loop {
        interval.tick().await;

        if !draining {
            if Path::new("shutdown").exists() {
                tracing::warn!("shutdown sentinel detected, draining");
                draining = true;
                drain_deadline = Some(tokio::time::Instant::now() + config::SHUTDOWN_DEADLINE_AFTER);
                state
                    .matches
                    .broadcast_hurry_up(config::SHUTDOWN_HURRY_UP_AFTER.as_secs())
                    .await;
            }
            continue;
        }

        let players_left = state.matches.total_players().await;
        let past_deadline = drain_deadline.is_some_and(|d| tokio::time::Instant::now() >= d);
        if players_left == 0 || past_deadline {
            tracing::warn!(players_left, past_deadline, "shutdown drain complete, exiting");
            std::process::exit(0);
        }
    }
}
