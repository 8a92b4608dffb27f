// Network adapter modules split by external client sockets vs internal HTTP routes.

pub mod client;
pub mod internal;

pub use client::ws_handler;
pub use internal::{leaderboard_handler, status_handler};
