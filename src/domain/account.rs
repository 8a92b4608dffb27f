// Persisted account entity. Mirrors the `accounts` table; see
// migrations/0001_accounts.sql for the schema this is read/written against.

use serde::Serialize;

#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub salt: String,
    pub pwdhash: String,
    pub nickname: String,
    pub skin: i32,
    pub squad: String,
    pub is_dev: bool,
    pub wins: i32,
    pub deaths: i32,
    pub kills: i32,
    pub coins: i32,
    pub is_banned: bool,
}

/// Public-facing view of an account, sent back to the owning client.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub username: String,
    pub nickname: String,
    pub skin: i32,
    pub squad: String,
    #[serde(rename = "isDev")]
    pub is_dev: bool,
    pub wins: i32,
    pub deaths: i32,
    pub kills: i32,
    pub coins: i32,
}

/// Fields an admin/ops caller may see but the owner's own client does not.
#[derive(Debug, Clone)]
pub struct AccountPrivSummary {
    pub id: i64,
    pub is_banned: bool,
}

impl Account {
    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            username: self.username.clone(),
            nickname: self.nickname.clone(),
            skin: self.skin,
            squad: self.squad.clone(),
            is_dev: self.is_dev,
            wins: self.wins,
            deaths: self.deaths,
            kills: self.kills,
            coins: self.coins,
        }
    }

    pub fn priv_summary(&self) -> AccountPrivSummary {
        AccountPrivSummary {
            id: self.id,
            is_banned: self.is_banned,
        }
    }
}

/// Additive stat deltas flushed to storage when a connection cleans up.
/// Counters are added; `coins` is clamped to >= 0 by the store.
#[derive(Debug, Clone, Default)]
pub struct StatDelta {
    pub wins: i32,
    pub deaths: i32,
    pub kills: i32,
    pub coins: i32,
    pub is_banned: Option<bool>,
    pub nickname: Option<String>,
    pub squad: Option<String>,
}

impl StatDelta {
    pub fn is_empty(&self) -> bool {
        self.wins == 0
            && self.deaths == 0
            && self.kills == 0
            && self.coins == 0
            && self.is_banned.is_none()
            && self.nickname.is_none()
            && self.squad.is_none()
    }
}
