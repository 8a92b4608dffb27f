use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::domain::match_state::GameMode;
use crate::domain::ports::{AccountStore, LevelCatalog, ProfanityFilter};
use crate::interface_adapters::clients::blocklist::BlockList;
use crate::interface_adapters::clients::discord::DiscordClient;
use crate::use_cases::matchmaker::MatchRegistry;

/// Failed logins allowed per address within the 60s window before the
/// address is throttled (§5 item 5, §7 "Abuse").
pub const MAX_LOGIN_TRIES: u32 = 4;
pub const LOGIN_BLOCK_SECONDS: u64 = 60;

#[derive(Clone)]
pub struct AppState {
    // Server-wide registry of active matches.
    pub matches: Arc<MatchRegistry>,
    // Account/session persistence.
    pub accounts: Arc<dyn AccountStore>,
    // Nickname/username profanity filter shared by registration and profile updates.
    pub profanity: Arc<dyn ProfanityFilter>,
    // Built-in and custom level loader, also used to advertise the level list.
    pub level_catalog: Arc<dyn LevelCatalog>,
    // Fire-and-forget podium-winner webhook client.
    pub discord: Arc<DiscordClient>,
    pub max_simul_ip: usize,
    pub default_name: String,
    pub default_team: String,
    // Per-address open connection counts, for the `max_simul_ip` cap.
    pub connections_by_ip: Arc<RwLock<HashMap<IpAddr, usize>>>,
    // Usernames with a currently-live session, enforcing one session per account.
    pub authenticated_usernames: Arc<RwLock<HashSet<String>>>,
    // Persistent `blocked.json` address list, checked at `l00`.
    pub blocklist: Arc<BlockList>,
    // Per-address failed-login counters, reset once an address is throttled.
    pub login_attempts: Arc<RwLock<HashMap<IpAddr, u32>>>,
    // Addresses currently throttled, and when the throttle expires.
    pub login_blocked_until: Arc<RwLock<HashMap<IpAddr, Instant>>>,
}

pub fn parse_game_mode(gm: &str) -> GameMode {
    match gm {
        "pvp" => GameMode::Pvp,
        "hell" => GameMode::Hell,
        _ => GameMode::Royale,
    }
}
