// Account use cases: thin validation in front of the `AccountStore` port,
// grounded on `auth_server::use_cases::guest_login`'s
// validate-then-delegate-to-store shape. Password hashing, salt
// generation, and session token issuance stay inside the store
// implementation (`frameworks::db`), since those are persistence-layer
// concerns, not business rules.

use crate::domain::account::{AccountPrivSummary, AccountSummary};
use crate::domain::errors::AccountError;
use crate::domain::ports::{AccountStore, LeaderBoard, ProfanityFilter};

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 20;
const PASSWORD_MIN: usize = 6;
const PASSWORD_MAX: usize = 128;

fn validate_username(username: &str) -> Result<(), AccountError> {
    let len = username.chars().count();
    if len < USERNAME_MIN {
        return Err(AccountError::UsernameTooShort);
    }
    if len > USERNAME_MAX {
        return Err(AccountError::UsernameTooLong);
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AccountError::IllegalUsernameChar);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AccountError> {
    let len = password.chars().count();
    if len < PASSWORD_MIN {
        return Err(AccountError::PasswordTooShort);
    }
    if len > PASSWORD_MAX {
        return Err(AccountError::PasswordTooLong);
    }
    Ok(())
}

pub struct RegisterUseCase<S> {
    pub store: S,
}

impl<S: AccountStore> RegisterUseCase<S> {
    pub async fn execute(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(AccountSummary, AccountPrivSummary, String), AccountError> {
        validate_username(username)?;
        validate_password(password)?;
        self.store.register(username, password).await
    }
}

pub struct LoginUseCase<S> {
    pub store: S,
}

impl<S: AccountStore> LoginUseCase<S> {
    pub async fn execute(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(AccountSummary, AccountPrivSummary, String), AccountError> {
        self.store.login(username, password).await
    }
}

pub struct ResumeSessionUseCase<S> {
    pub store: S,
}

impl<S: AccountStore> ResumeSessionUseCase<S> {
    pub async fn execute(&self, token: &str) -> Result<(AccountSummary, AccountPrivSummary), AccountError> {
        self.store.resume_session(token).await
    }
}

pub struct LogoutUseCase<S> {
    pub store: S,
}

impl<S: AccountStore> LogoutUseCase<S> {
    pub async fn execute(&self, token: &str) {
        self.store.logout(token).await;
    }
}

pub struct UpdateAccountUseCase<S, F> {
    pub store: S,
    pub profanity_filter: F,
}

impl<S: AccountStore, F: ProfanityFilter> UpdateAccountUseCase<S, F> {
    pub async fn execute(
        &self,
        username: &str,
        nickname: Option<String>,
        squad: Option<String>,
        skin: Option<i32>,
    ) -> Result<(), AccountError> {
        if let Some(nickname) = &nickname {
            if nickname.trim().is_empty() || self.profanity_filter.contains_banned_word(nickname) {
                return Err(AccountError::NicknameNotAllowed);
            }
        }
        self.store.update_account(username, nickname, squad, skin).await
    }
}

pub struct ChangePasswordUseCase<S> {
    pub store: S,
}

impl<S: AccountStore> ChangePasswordUseCase<S> {
    pub async fn execute(&self, username: &str, old_password: &str, new_password: &str) -> Result<(), AccountError> {
        validate_password(new_password)?;
        self.store.change_password(username, old_password, new_password).await
    }
}

pub struct LeaderBoardUseCase<S> {
    pub store: S,
}

impl<S: AccountStore> LeaderBoardUseCase<S> {
    pub async fn execute(&self) -> Result<LeaderBoard, AccountError> {
        self.store.get_leader_board().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::RecordingAccountStore;

    #[tokio::test]
    async fn register_rejects_short_username() {
        let use_case = RegisterUseCase { store: RecordingAccountStore::new() };
        let err = use_case.execute("ab", "longenough").await.unwrap_err();
        assert!(matches!(err, AccountError::UsernameTooShort));
    }

    #[tokio::test]
    async fn register_rejects_short_password() {
        let use_case = RegisterUseCase { store: RecordingAccountStore::new() };
        let err = use_case.execute("abcdef", "short").await.unwrap_err();
        assert!(matches!(err, AccountError::PasswordTooShort));
    }

    #[tokio::test]
    async fn register_delegates_to_store_when_valid() {
        let use_case = RegisterUseCase { store: RecordingAccountStore::new() };
        let result = use_case.execute("validname", "validpassword").await;
        assert!(result.is_ok());
    }
}
