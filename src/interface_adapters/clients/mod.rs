pub mod blocklist;
pub mod discord;
pub mod levels;
