// Postgres-backed account persistence. `connect_pool`/`run_migrations`
// mirror `auth_server::frameworks::db`'s shape; `PgAccountStore` is the
// concrete `AccountStore` adapter behind the in-memory `RecordingAccountStore`
// test fake.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgPoolOptions};

use crate::domain::account::{Account, AccountPrivSummary, AccountSummary, StatDelta};
use crate::domain::errors::AccountError;
use crate::domain::ports::{AccountStore, LeaderBoard, LeaderBoardEntry};
use crate::interface_adapters::utils::rng::{generate_salt, generate_session_token};

pub async fn connect_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new().max_connections(10).connect(database_url).await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
    MIGRATOR.run(pool).await
}

#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        PgAccountStore { pool }
    }

    fn hash_password(password: &str, salt: &str) -> Result<String, AccountError> {
        let salted = format!("{password}{salt}");
        let salt_string = SaltString::encode_b64(salt.as_bytes()[..16.min(salt.len())].as_ref())
            .map_err(|_| AccountError::Storage)?;
        Argon2::default()
            .hash_password(salted.as_bytes(), &salt_string)
            .map(|h| h.to_string())
            .map_err(|_| AccountError::Storage)
    }

    fn verify_password(password: &str, salt: &str, hash: &str) -> bool {
        let salted = format!("{password}{salt}");
        let Ok(parsed) = PasswordHash::new(hash) else { return false };
        Argon2::default().verify_password(salted.as_bytes(), &parsed).is_ok()
    }

    fn row_to_account(row: &sqlx::postgres::PgRow) -> Account {
        Account {
            id: row.get("id"),
            username: row.get("username"),
            salt: row.get("salt"),
            pwdhash: row.get("pwdhash"),
            nickname: row.get("nickname"),
            skin: row.get("skin"),
            squad: row.get("squad"),
            is_dev: row.get("is_dev"),
            wins: row.get("wins"),
            deaths: row.get("deaths"),
            kills: row.get("kills"),
            coins: row.get("coins"),
            is_banned: row.get("is_banned"),
        }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(AccountSummary, AccountPrivSummary, String), AccountError> {
        let existing = sqlx::query("SELECT 1 FROM accounts WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|_| AccountError::Storage)?;
        if existing.is_some() {
            return Err(AccountError::AlreadyRegistered);
        }

        let salt = generate_salt();
        let pwdhash = Self::hash_password(password, &salt)?;
        let row = sqlx::query(
            "INSERT INTO accounts (username, salt, pwdhash, nickname) VALUES ($1, $2, $3, $1)
             RETURNING id, username, salt, pwdhash, nickname, skin, squad, is_dev, wins, deaths, kills, coins, is_banned",
        )
        .bind(username)
        .bind(&salt)
        .bind(&pwdhash)
        .fetch_one(&self.pool)
        .await
        .map_err(|_| AccountError::Storage)?;

        let account = Self::row_to_account(&row);
        let token = generate_session_token();
        sqlx::query("INSERT INTO sessions (token, account_id) VALUES ($1, $2)")
            .bind(&token)
            .bind(account.id)
            .execute(&self.pool)
            .await
            .map_err(|_| AccountError::Storage)?;

        Ok((account.summary(), account.priv_summary(), token))
    }

    async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(AccountSummary, AccountPrivSummary, String), AccountError> {
        let row = sqlx::query(
            "SELECT id, username, salt, pwdhash, nickname, skin, squad, is_dev, wins, deaths, kills, coins, is_banned
             FROM accounts WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|_| AccountError::Storage)?
        .ok_or(AccountError::InvalidCredentials)?;

        let account = Self::row_to_account(&row);
        if !Self::verify_password(password, &account.salt, &account.pwdhash) {
            return Err(AccountError::InvalidCredentials);
        }
        if account.is_banned {
            return Err(AccountError::InvalidCredentials);
        }

        let token = generate_session_token();
        sqlx::query("INSERT INTO sessions (token, account_id) VALUES ($1, $2)")
            .bind(&token)
            .bind(account.id)
            .execute(&self.pool)
            .await
            .map_err(|_| AccountError::Storage)?;

        Ok((account.summary(), account.priv_summary(), token))
    }

    async fn resume_session(&self, token: &str) -> Result<(AccountSummary, AccountPrivSummary), AccountError> {
        let row = sqlx::query(
            "SELECT a.id, a.username, a.salt, a.pwdhash, a.nickname, a.skin, a.squad, a.is_dev,
                    a.wins, a.deaths, a.kills, a.coins, a.is_banned
             FROM sessions s JOIN accounts a ON a.id = s.account_id
             WHERE s.token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|_| AccountError::Storage)?
        .ok_or(AccountError::SessionExpired)?;

        let account = Self::row_to_account(&row);
        Ok((account.summary(), account.priv_summary()))
    }

    async fn logout(&self, token: &str) {
        let _ = sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await;
    }

    async fn update_account(
        &self,
        username: &str,
        nickname: Option<String>,
        squad: Option<String>,
        skin: Option<i32>,
    ) -> Result<(), AccountError> {
        if let Some(nickname) = &nickname {
            let taken = sqlx::query("SELECT 1 FROM accounts WHERE nickname = $1 AND username <> $2")
                .bind(nickname)
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .map_err(|_| AccountError::Storage)?;
            if taken.is_some() {
                return Err(AccountError::NicknameInUse);
            }
        }

        sqlx::query(
            "UPDATE accounts SET
                nickname = COALESCE($1, nickname),
                squad = COALESCE($2, squad),
                skin = COALESCE($3, skin)
             WHERE username = $4",
        )
        .bind(nickname)
        .bind(squad)
        .bind(skin)
        .bind(username)
        .execute(&self.pool)
        .await
        .map_err(|_| AccountError::Storage)?;

        Ok(())
    }

    async fn change_password(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AccountError> {
        let row = sqlx::query("SELECT salt, pwdhash FROM accounts WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|_| AccountError::Storage)?
            .ok_or(AccountError::InvalidCredentials)?;

        let salt: String = row.get("salt");
        let pwdhash: String = row.get("pwdhash");
        if !Self::verify_password(old_password, &salt, &pwdhash) {
            return Err(AccountError::InvalidCredentials);
        }

        let new_salt = generate_salt();
        let new_hash = Self::hash_password(new_password, &new_salt)?;
        sqlx::query("UPDATE accounts SET salt = $1, pwdhash = $2 WHERE username = $3")
            .bind(&new_salt)
            .bind(&new_hash)
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(|_| AccountError::Storage)?;

        Ok(())
    }

    async fn update_stats(&self, account_id: i64, delta: StatDelta) -> Result<(), AccountError> {
        sqlx::query(
            "UPDATE accounts SET
                wins = wins + $1,
                deaths = deaths + $2,
                kills = kills + $3,
                coins = GREATEST(coins + $4, 0),
                is_banned = COALESCE($5, is_banned),
                nickname = COALESCE($6, nickname),
                squad = COALESCE($7, squad)
             WHERE id = $8",
        )
        .bind(delta.wins)
        .bind(delta.deaths)
        .bind(delta.kills)
        .bind(delta.coins)
        .bind(delta.is_banned)
        .bind(delta.nickname)
        .bind(delta.squad)
        .bind(account_id)
        .execute(&self.pool)
        .await
        .map_err(|_| AccountError::Storage)?;

        Ok(())
    }

    async fn get_leader_board(&self) -> Result<LeaderBoard, AccountError> {
        async fn top(pool: &PgPool, column: &str) -> Result<Vec<LeaderBoardEntry>, AccountError> {
            let query = format!("SELECT nickname, {column} AS value FROM accounts ORDER BY {column} DESC LIMIT 10");
            let rows = sqlx::query(&query)
                .fetch_all(pool)
                .await
                .map_err(|_| AccountError::Storage)?;
            Ok(rows
                .into_iter()
                .enumerate()
                .map(|(i, row)| LeaderBoardEntry {
                    pos: i as u32 + 1,
                    nickname: row.get("nickname"),
                    value: row.get::<i32, _>("value") as i64,
                })
                .collect())
        }

        Ok(LeaderBoard {
            coin_leader_board: top(&self.pool, "coins").await?,
            wins_leader_board: top(&self.pool, "wins").await?,
            kills_leader_board: top(&self.pool, "kills").await?,
        })
    }

    async fn account_by_username(&self, username: &str) -> Option<Account> {
        let row = sqlx::query(
            "SELECT id, username, salt, pwdhash, nickname, skin, squad, is_dev, wins, deaths, kills, coins, is_banned
             FROM accounts WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .ok()??;
        Some(Self::row_to_account(&row))
    }
}
