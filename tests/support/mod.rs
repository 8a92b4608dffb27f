// Shared primitives for one-time server bootstrapping across integration tests.
// The server is wired from in-memory test doubles (no Postgres dependency)
// so these tests run standalone.
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::Router;
use axum::routing::get;

use royale_server::domain::level::LevelData;
use royale_server::interface_adapters::clients::blocklist::BlockList;
use royale_server::interface_adapters::clients::discord::DiscordClient;
use royale_server::interface_adapters::net::{leaderboard_handler, status_handler, ws_handler};
use royale_server::interface_adapters::state::AppState;
use royale_server::use_cases::match_engine::MatchSettings;
use royale_server::use_cases::matchmaker::{MatchRegistry, MatchmakerSettings};
use royale_server::use_cases::test_support::{
    FixedLevelCatalog, NoopDiscordNotifier, PermissiveProfanityFilter, RecordingAccountStore,
};

static SERVER_URL: OnceLock<String> = OnceLock::new();
static SERVER_READY: OnceLock<()> = OnceLock::new();

pub fn ensure_server() -> &'static str {
    SERVER_READY.get_or_init(|| {
        let published_url = Arc::new(OnceLock::<String>::new());
        let published_url_thread = Arc::clone(&published_url);
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_url_thread.set(format!("http://{addr}"));

                let state = build_test_state();
                let app = Router::new()
                    .route("/royale/ws", get(ws_handler))
                    .route("/status", get(status_handler))
                    .route("/leaderboard", get(leaderboard_handler))
                    .with_state(state)
                    .into_make_service_with_connect_info::<std::net::SocketAddr>();

                axum::serve(listener, app).await.expect("server failed");
            });
        });
        wait_for_server_url_and_readiness(published_url);
    });

    SERVER_URL.get().expect("server url should be initialized").as_str()
}

fn empty_level() -> LevelData {
    LevelData::from_raw_json("custom", &serde_json::json!({ "worlds": [] })).unwrap_or_default()
}

fn build_test_state() -> Arc<AppState> {
    let accounts = Arc::new(RecordingAccountStore::new());
    let level_catalog = Arc::new(FixedLevelCatalog { level: empty_level() });
    let discord = Arc::new(NoopDiscordNotifier);

    let matches = Arc::new(MatchRegistry::new(
        MatchmakerSettings {
            player_min: 2,
            player_cap: 20,
            allow_late_enter: true,
            engine: MatchSettings {
                auto_start_time: Duration::from_secs(10),
                start_timer_seconds: 5,
                enable_auto_start_in_multi_private: false,
                enable_level_select_in_multi_private: true,
                enable_vote_start: true,
                vote_rate_to_start: 0.5,
                coin_reward_flagpole: 5,
                coin_reward_podium: (50, 30, 10),
                default_name: "PLAYER".to_string(),
                default_team: String::new(),
            },
        },
        level_catalog.clone(),
        accounts.clone(),
        discord.clone(),
    ));

    Arc::new(AppState {
        matches,
        accounts,
        profanity: Arc::new(PermissiveProfanityFilter),
        level_catalog,
        discord: Arc::new(DiscordClient::new(None, Duration::from_secs(5)).expect("discord client")),
        max_simul_ip: 3,
        default_name: "PLAYER".to_string(),
        default_team: String::new(),
        connections_by_ip: Default::default(),
        authenticated_usernames: Default::default(),
        blocklist: Arc::new(BlockList::load("/tmp/royale_test_blocked.json")),
        login_attempts: Default::default(),
        login_blocked_until: Default::default(),
    })
}

fn wait_for_server_url_and_readiness(published_url: Arc<OnceLock<String>>) {
    let base_url = loop {
        if let Some(url) = published_url.get() {
            break url.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    let _ = SERVER_URL.set(base_url.clone());

    let addr = base_url.strip_prefix("http://").expect("base url should use http://");

    for _ in 0..100 {
        if std::net::TcpStream::connect(addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    panic!("server did not become ready in time");
}
