// In-memory test doubles, grounded on
// `auth_server::use_cases::test_support::RecordingStore`'s
// Arc<Mutex<HashMap<..>>>-backed fake-with-failure-injection shape.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::account::{Account, AccountPrivSummary, AccountSummary, StatDelta};
use crate::domain::errors::AccountError;
use crate::domain::level::LevelData;
use crate::domain::match_state::GameMode;
use crate::domain::ports::{AccountStore, DiscordNotifier, LeaderBoard, LevelCatalog, ProfanityFilter};

#[derive(Clone, Copy, Default)]
pub struct FailureFlags {
    pub register: bool,
    pub login: bool,
}

#[derive(Clone)]
pub struct RecordingAccountStore {
    accounts: Arc<Mutex<HashMap<String, Account>>>,
    sessions: Arc<Mutex<HashMap<String, i64>>>,
    next_id: Arc<Mutex<i64>>,
    failures: FailureFlags,
}

impl RecordingAccountStore {
    pub fn new() -> Self {
        RecordingAccountStore {
            accounts: Arc::new(Mutex::new(HashMap::new())),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
            failures: FailureFlags::default(),
        }
    }

    pub fn with_failures(mut self, failures: FailureFlags) -> Self {
        self.failures = failures;
        self
    }

    pub fn seed(&self, account: Account) {
        let mut guard = self.accounts.lock().expect("accounts mutex poisoned");
        guard.insert(account.username.clone(), account);
    }
}

#[async_trait]
impl AccountStore for RecordingAccountStore {
    async fn register(
        &self,
        username: &str,
        _password: &str,
    ) -> Result<(AccountSummary, AccountPrivSummary, String), AccountError> {
        if self.failures.register {
            return Err(AccountError::Storage);
        }
        let mut accounts = self.accounts.lock().expect("accounts mutex poisoned");
        if accounts.contains_key(username) {
            return Err(AccountError::AlreadyRegistered);
        }
        let mut next_id = self.next_id.lock().expect("next_id mutex poisoned");
        let id = *next_id;
        *next_id += 1;
        let account = Account {
            id,
            username: username.to_string(),
            salt: "test-salt".to_string(),
            pwdhash: "test-hash".to_string(),
            nickname: username.to_string(),
            skin: 0,
            squad: String::new(),
            is_dev: false,
            wins: 0,
            deaths: 0,
            kills: 0,
            coins: 0,
            is_banned: false,
        };
        let summary = account.summary();
        let priv_summary = account.priv_summary();
        accounts.insert(username.to_string(), account);
        let token = format!("test-token-{id}");
        self.sessions.lock().expect("sessions mutex poisoned").insert(token.clone(), id);
        Ok((summary, priv_summary, token))
    }

    async fn login(
        &self,
        username: &str,
        _password: &str,
    ) -> Result<(AccountSummary, AccountPrivSummary, String), AccountError> {
        if self.failures.login {
            return Err(AccountError::Storage);
        }
        let accounts = self.accounts.lock().expect("accounts mutex poisoned");
        let account = accounts.get(username).ok_or(AccountError::InvalidCredentials)?;
        if account.is_banned {
            return Err(AccountError::InvalidCredentials);
        }
        let token = format!("test-token-{}", account.id);
        self.sessions
            .lock()
            .expect("sessions mutex poisoned")
            .insert(token.clone(), account.id);
        Ok((account.summary(), account.priv_summary(), token))
    }

    async fn resume_session(&self, token: &str) -> Result<(AccountSummary, AccountPrivSummary), AccountError> {
        let id = *self
            .sessions
            .lock()
            .expect("sessions mutex poisoned")
            .get(token)
            .ok_or(AccountError::SessionExpired)?;
        let accounts = self.accounts.lock().expect("accounts mutex poisoned");
        let account = accounts.values().find(|a| a.id == id).ok_or(AccountError::SessionExpired)?;
        Ok((account.summary(), account.priv_summary()))
    }

    async fn logout(&self, token: &str) {
        self.sessions.lock().expect("sessions mutex poisoned").remove(token);
    }

    async fn update_account(
        &self,
        username: &str,
        nickname: Option<String>,
        squad: Option<String>,
        skin: Option<i32>,
    ) -> Result<(), AccountError> {
        let mut accounts = self.accounts.lock().expect("accounts mutex poisoned");
        let account = accounts.get_mut(username).ok_or(AccountError::InvalidCredentials)?;
        if let Some(nickname) = nickname {
            account.nickname = nickname;
        }
        if let Some(squad) = squad {
            account.squad = squad;
        }
        if let Some(skin) = skin {
            account.skin = skin;
        }
        Ok(())
    }

    async fn change_password(
        &self,
        username: &str,
        _old_password: &str,
        _new_password: &str,
    ) -> Result<(), AccountError> {
        let accounts = self.accounts.lock().expect("accounts mutex poisoned");
        accounts.get(username).map(|_| ()).ok_or(AccountError::InvalidCredentials)
    }

    async fn update_stats(&self, account_id: i64, delta: StatDelta) -> Result<(), AccountError> {
        let mut accounts = self.accounts.lock().expect("accounts mutex poisoned");
        let account = accounts.values_mut().find(|a| a.id == account_id).ok_or(AccountError::Storage)?;
        account.wins += delta.wins;
        account.deaths += delta.deaths;
        account.kills += delta.kills;
        account.coins = (account.coins + delta.coins).max(0);
        if let Some(is_banned) = delta.is_banned {
            account.is_banned = is_banned;
        }
        if let Some(nickname) = delta.nickname {
            account.nickname = nickname;
        }
        if let Some(squad) = delta.squad {
            account.squad = squad;
        }
        Ok(())
    }

    async fn get_leader_board(&self) -> Result<LeaderBoard, AccountError> {
        Ok(LeaderBoard::default())
    }

    async fn account_by_username(&self, username: &str) -> Option<Account> {
        self.accounts.lock().expect("accounts mutex poisoned").get(username).cloned()
    }
}

pub struct FixedLevelCatalog {
    pub level: LevelData,
}

impl LevelCatalog for FixedLevelCatalog {
    fn get_level(&self, _id: &str) -> Option<LevelData> {
        Some(self.level.clone())
    }

    fn get_random_level(&self, _kind: &str, _level_mode: GameMode) -> Option<LevelData> {
        Some(self.level.clone())
    }

    fn validate_custom_level(&self, raw: &serde_json::Value) -> Result<LevelData, String> {
        LevelData::from_raw_json("custom", raw).ok_or_else(|| "malformed level".to_string())
    }
}

pub struct PermissiveProfanityFilter;

impl ProfanityFilter for PermissiveProfanityFilter {
    fn contains_banned_word(&self, _name: &str) -> bool {
        false
    }
}

pub struct NoopDiscordNotifier;

#[async_trait]
impl DiscordNotifier for NoopDiscordNotifier {
    async fn notify_winner(&self, _nickname: &str, _match_room: &str) {}
}
