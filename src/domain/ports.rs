// Ports the use-case layer drives external collaborators through. Account
// persistence is implemented in this crate (frameworks::db); the level
// loader, profanity filter, captcha generator and Discord webhook remain
// true external collaborators and are given minimal real implementations
// here so the call sites are exercised, without claiming to reproduce the
// product's actual word list, captcha art, or webhook format.

use async_trait::async_trait;

use crate::domain::account::{Account, AccountPrivSummary, AccountSummary, StatDelta};
use crate::domain::errors::AccountError;
use crate::domain::level::LevelData;

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(AccountSummary, AccountPrivSummary, String), AccountError>;

    async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(AccountSummary, AccountPrivSummary, String), AccountError>;

    async fn resume_session(
        &self,
        token: &str,
    ) -> Result<(AccountSummary, AccountPrivSummary), AccountError>;

    async fn logout(&self, token: &str);

    async fn update_account(
        &self,
        username: &str,
        nickname: Option<String>,
        squad: Option<String>,
        skin: Option<i32>,
    ) -> Result<(), AccountError>;

    async fn change_password(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AccountError>;

    async fn update_stats(&self, account_id: i64, delta: StatDelta) -> Result<(), AccountError>;

    async fn get_leader_board(&self) -> Result<LeaderBoard, AccountError>;

    async fn account_by_username(&self, username: &str) -> Option<Account>;
}

// Lets use-case structs stay generic over `S: AccountStore` while the
// connection layer only ever holds a type-erased `Arc<dyn AccountStore>`.
#[async_trait]
impl AccountStore for std::sync::Arc<dyn AccountStore> {
    async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(AccountSummary, AccountPrivSummary, String), AccountError> {
        (**self).register(username, password).await
    }

    async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(AccountSummary, AccountPrivSummary, String), AccountError> {
        (**self).login(username, password).await
    }

    async fn resume_session(&self, token: &str) -> Result<(AccountSummary, AccountPrivSummary), AccountError> {
        (**self).resume_session(token).await
    }

    async fn logout(&self, token: &str) {
        (**self).logout(token).await
    }

    async fn update_account(
        &self,
        username: &str,
        nickname: Option<String>,
        squad: Option<String>,
        skin: Option<i32>,
    ) -> Result<(), AccountError> {
        (**self).update_account(username, nickname, squad, skin).await
    }

    async fn change_password(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AccountError> {
        (**self).change_password(username, old_password, new_password).await
    }

    async fn update_stats(&self, account_id: i64, delta: StatDelta) -> Result<(), AccountError> {
        (**self).update_stats(account_id, delta).await
    }

    async fn get_leader_board(&self) -> Result<LeaderBoard, AccountError> {
        (**self).get_leader_board().await
    }

    async fn account_by_username(&self, username: &str) -> Option<Account> {
        (**self).account_by_username(username).await
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct LeaderBoardEntry {
    pub pos: u32,
    pub nickname: String,
    pub value: i64,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct LeaderBoard {
    #[serde(rename = "coinLeaderBoard")]
    pub coin_leader_board: Vec<LeaderBoardEntry>,
    #[serde(rename = "winsLeaderBoard")]
    pub wins_leader_board: Vec<LeaderBoardEntry>,
    #[serde(rename = "killsLeaderBoard")]
    pub kills_leader_board: Vec<LeaderBoardEntry>,
}

/// Loads built-in and custom levels; hot-reload-by-mtime and the JSON
/// schema the source validates custom levels against are both out of
/// scope (external collaborator), this port only names the call sites.
pub trait LevelCatalog: Send + Sync {
    fn get_level(&self, id: &str) -> Option<LevelData>;
    fn get_random_level(&self, kind: &str, level_mode: crate::domain::match_state::GameMode) -> Option<LevelData>;
    fn validate_custom_level(&self, raw: &serde_json::Value) -> Result<LevelData, String>;
}

/// Username/nickname profanity filter. The real word list and leet-speak
/// normalization table are external; this is a permissive stand-in that
/// still exercises the real call sites (`allowed_nickname`).
pub trait ProfanityFilter: Send + Sync {
    fn contains_banned_word(&self, name: &str) -> bool;
}

impl ProfanityFilter for std::sync::Arc<dyn ProfanityFilter> {
    fn contains_banned_word(&self, name: &str) -> bool {
        (**self).contains_banned_word(name)
    }
}

#[async_trait]
pub trait DiscordNotifier: Send + Sync {
    /// Fire-and-forget; callers never await a meaningful result. Failures
    /// are swallowed at the call site, matching the source's behavior.
    async fn notify_winner(&self, nickname: &str, match_room: &str);
}
