// Runtime/match configuration. A `server.toml` file (`[server]`/`[match]`
// tables, mirroring the distilled INI's section split) is loaded once at
// startup, then any key may be overridden by an environment variable
// following the established `env::var(...).ok().and_then(...).unwrap_or(default)`
// shape. `Config::load` is the only entry point; everything downstream
// takes a `&Config` rather than re-reading the environment.

use std::{env, fs, time::Duration};

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
struct RawFile {
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    r#match: RawMatch,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawServer {
    listen_port: Option<u16>,
    m_code: Option<String>,
    status_path: Option<String>,
    leader_board_path: Option<String>,
    assets_metadata_path: Option<String>,
    levels_dir: Option<String>,
    blocked_json_path: Option<String>,
    default_name: Option<String>,
    default_team: Option<String>,
    max_simul_ip: Option<usize>,
    skin_count: Option<i32>,
    database_url: Option<String>,
    restrict_public_skins: Option<bool>,
    discord_webhook_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawMatch {
    player_min: Option<usize>,
    player_cap: Option<usize>,
    auto_start_time: Option<u64>,
    start_timer: Option<u64>,
    enable_auto_start_in_multi_private: Option<bool>,
    enable_level_select_in_multi_private: Option<bool>,
    enable_vote_start: Option<bool>,
    vote_rate_to_start: Option<f64>,
    allow_late_enter: Option<bool>,
    coin_reward_flagpole: Option<i32>,
    coin_reward_podium_1: Option<i32>,
    coin_reward_podium_2: Option<i32>,
    coin_reward_podium_3: Option<i32>,
}

fn env_or<T: std::str::FromStr>(key: &str, file_value: Option<T>, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).or(file_value).unwrap_or(default)
}

fn env_or_string(key: &str, file_value: Option<String>, default: &str) -> String {
    env::var(key).ok().or(file_value).unwrap_or_else(|| default.to_string())
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_port: u16,
    pub m_code: String,
    pub status_path: String,
    pub leader_board_path: String,
    pub assets_metadata_path: String,
    pub levels_dir: String,
    pub blocked_json_path: String,
    pub default_name: String,
    pub default_team: String,
    pub max_simul_ip: usize,
    pub skin_count: i32,
    pub database_url: String,
    pub restrict_public_skins: bool,
    pub player_min: usize,
    pub player_cap: usize,
    pub auto_start_time: Duration,
    pub start_timer: Duration,
    pub enable_auto_start_in_multi_private: bool,
    pub enable_level_select_in_multi_private: bool,
    pub enable_vote_start: bool,
    pub vote_rate_to_start: f64,
    pub allow_late_enter: bool,
    pub coin_reward_flagpole: i32,
    pub coin_reward_podium: (i32, i32, i32),
    pub discord_webhook_url: Option<String>,
}

impl Config {
    /// Reads `server.toml` relative to the process's working directory if
    /// present (a missing file is not an error -- every key has a default),
    /// then applies environment variable overrides on top.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();

        let raw: RawFile = fs::read_to_string("server.toml")
            .ok()
            .and_then(|text| toml::from_str(&text).ok())
            .unwrap_or_default();
        let server = raw.server;
        let r#match = raw.r#match;

        Config {
            listen_port: env_or("LISTEN_PORT", server.listen_port, 3001),
            m_code: env_or_string("M_CODE", server.m_code, ""),
            status_path: env_or_string("STATUS_PATH", server.status_path, "/status"),
            leader_board_path: env_or_string("LEADER_BOARD_PATH", server.leader_board_path, "/leaderboard"),
            assets_metadata_path: env_or_string(
                "ASSETS_METADATA_PATH",
                server.assets_metadata_path,
                "assets/metadata.json",
            ),
            levels_dir: env_or_string("LEVELS_DIR", server.levels_dir, "levels"),
            blocked_json_path: env_or_string("BLOCKED_JSON_PATH", server.blocked_json_path, "blocked.json"),
            default_name: env_or_string("DEFAULT_NAME", server.default_name, "PLAYER"),
            default_team: env_or_string("DEFAULT_TEAM", server.default_team, ""),
            max_simul_ip: env_or("MAX_SIMUL_IP", server.max_simul_ip, 3),
            skin_count: env_or("SKIN_COUNT", server.skin_count, 10),
            database_url: env_or_string(
                "DATABASE_URL",
                server.database_url,
                "postgres://localhost/royale",
            ),
            restrict_public_skins: env_or("RESTRICT_PUBLIC_SKINS", server.restrict_public_skins, false),
            player_min: env_or("PLAYER_MIN", r#match.player_min, 2),
            player_cap: env_or("PLAYER_CAP", r#match.player_cap, 20),
            auto_start_time: Duration::from_secs(env_or("AUTO_START_TIME", r#match.auto_start_time, 10)),
            start_timer: Duration::from_secs(env_or("START_TIMER", r#match.start_timer, 5)),
            enable_auto_start_in_multi_private: env_or(
                "ENABLE_AUTO_START_IN_MULTI_PRIVATE",
                r#match.enable_auto_start_in_multi_private,
                false,
            ),
            enable_level_select_in_multi_private: env_or(
                "ENABLE_LEVEL_SELECT_IN_MULTI_PRIVATE",
                r#match.enable_level_select_in_multi_private,
                true,
            ),
            enable_vote_start: env_or("ENABLE_VOTE_START", r#match.enable_vote_start, true),
            vote_rate_to_start: env_or("VOTE_RATE_TO_START", r#match.vote_rate_to_start, 0.5),
            allow_late_enter: env_or("ALLOW_LATE_ENTER", r#match.allow_late_enter, true),
            coin_reward_flagpole: env_or("COIN_REWARD_FLAGPOLE", r#match.coin_reward_flagpole, 5),
            coin_reward_podium: (
                env_or("COIN_REWARD_PODIUM_1", r#match.coin_reward_podium_1, 50),
                env_or("COIN_REWARD_PODIUM_2", r#match.coin_reward_podium_2, 30),
                env_or("COIN_REWARD_PODIUM_3", r#match.coin_reward_podium_3, 10),
            ),
            discord_webhook_url: env::var("DISCORD_WEBHOOK_URL").ok().or(server.discord_webhook_url),
        }
    }
}

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const WORLD_BROADCAST_CAPACITY: usize = 128;
pub const TICK_INTERVAL: Duration = Duration::from_millis(1000 / 60);

/// How often the maintenance loop sweeps for the `shutdown` sentinel file
/// and empty matches.
pub const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(5);
pub const LEADER_BOARD_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
pub const SHUTDOWN_HURRY_UP_AFTER: Duration = Duration::from_secs(180);
pub const SHUTDOWN_DEADLINE_AFTER: Duration = Duration::from_secs(240);
