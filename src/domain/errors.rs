// Core error taxonomy shared by the protocol, match, and account layers.
//
// Every handler that touches a connection or a match returns one of these
// so the caller can decide the single correct outcome (close, surface, or
// silently block) without re-deriving it at each call site.

use std::fmt;

#[derive(Debug)]
pub enum CoreError {
    /// Unknown opcode, short frame, wrong-state message, JSON parse error.
    /// Always force-closes the connection; the receive buffer is cleared.
    Protocol(String),
    /// Bad input the caller can correct: lengths, charset, profanity,
    /// nickname collision, bad captcha, invalid custom level. Surfaced as
    /// `{status:false, msg}`; never closes the connection.
    Validation(String),
    /// Per-IP cap, login throttle, trust-ping overflow, blocklist hit,
    /// banned account. Silent block, no message sent back.
    Abuse(String),
    /// A persistence operation failed; the caller should roll back and
    /// surface a generic failure message rather than leak storage detail.
    Storage(String),
    /// Anything else. Logged with a backtrace; force-closes the socket,
    /// the owning match keeps running.
    Unexpected(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Protocol(msg) => write!(f, "protocol violation: {msg}"),
            CoreError::Validation(msg) => write!(f, "validation error: {msg}"),
            CoreError::Abuse(msg) => write!(f, "abuse: {msg}"),
            CoreError::Storage(msg) => write!(f, "storage error: {msg}"),
            CoreError::Unexpected(msg) => write!(f, "unexpected error: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl CoreError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        CoreError::Protocol(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }

    pub fn abuse(msg: impl Into<String>) -> Self {
        CoreError::Abuse(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        CoreError::Storage(msg.into())
    }

    /// True when the connection must be force-closed as a result.
    pub fn closes_connection(&self) -> bool {
        matches!(self, CoreError::Protocol(_) | CoreError::Unexpected(_))
    }
}

#[derive(Debug)]
pub enum AccountError {
    AccountSystemDisabled,
    UsernameTooShort,
    UsernameTooLong,
    IllegalUsernameChar,
    PasswordTooShort,
    PasswordTooLong,
    AlreadyRegistered,
    NicknameNotAllowed,
    NicknameInUse,
    InvalidCredentials,
    SessionExpired,
    Storage,
}

impl fmt::Display for AccountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            AccountError::AccountSystemDisabled => "account system disabled",
            AccountError::UsernameTooShort => "username too short",
            AccountError::UsernameTooLong => "username too long",
            AccountError::IllegalUsernameChar => "illegal character in username",
            AccountError::PasswordTooShort => "password too short",
            AccountError::PasswordTooLong => "password too long",
            AccountError::AlreadyRegistered => "account already registered",
            AccountError::NicknameNotAllowed => "nickname not allowed",
            AccountError::NicknameInUse => "nickname already in use",
            AccountError::InvalidCredentials => "invalid user name or password",
            AccountError::SessionExpired => "session expired, please log in",
            AccountError::Storage => "failed to save account",
        };
        write!(f, "{msg}")
    }
}

impl std::error::Error for AccountError {}
