// Use-case level inputs/outputs exchanged between a connection task and the
// match engine task that owns a given Match.

use crate::domain::match_state::{GameMode, Player};
use tokio::sync::{mpsc, oneshot};

/// A frame the connection task should write to its socket. Built by the
/// match engine (or the connection's own handshake code) and delivered
/// over each player's dedicated outbound channel -- not a broadcast
/// channel, since most fan-out here is filtered per recipient (loaded-only,
/// zone-scoped, optional "ignore sender").
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    Text(String),
    Binary(Vec<u8>),
    Close { reason: &'static str },
}

pub type OutboundSender = mpsc::UnboundedSender<OutboundFrame>;
pub type OutboundReceiver = mpsc::UnboundedReceiver<OutboundFrame>;

/// Events the connection layer submits into a match's owning task. The
/// task is the single mutator of `Match` state (see SPEC_FULL.md §5).
#[derive(Debug)]
pub enum MatchEvent {
    Join {
        player: Player,
        outbound: OutboundSender,
        reply: oneshot::Sender<i16>,
    },
    Leave {
        player_id: i16,
        /// Returns the removed player's accrued stat delta so the
        /// connection layer can flush it exactly once, after removal.
        reply: oneshot::Sender<crate::domain::account::StatDelta>,
    },
    VoteStart {
        player_id: i16,
    },
    /// `g51`: a private-room host forcing the match to start regardless of
    /// the player/vote threshold. No-op for non-private matches.
    ForceStart {
        player_id: i16,
    },
    PlayerReady {
        player_id: i16,
    },
    ObjectEvent {
        player_id: i16,
        level: u8,
        zone: u8,
        oid: i64,
        ty: u8,
    },
    TileEvent {
        player_id: i16,
        level: u8,
        zone: u8,
        x: u16,
        y_raw: u16,
        ty: u8,
    },
    Movement {
        player_id: i16,
        level: u8,
        zone: u8,
        x: f32,
        y: f32,
        sprite: i8,
        reverse: bool,
        raw_pkt: Vec<u8>,
    },
    /// Binary opcode `0x11`: the client reports its own death.
    SelfDeath {
        player_id: i16,
    },
    KillClaim {
        player_id: i16,
        reported_killer_id: i16,
    },
    TrustPing {
        player_id: i16,
    },
    Finish {
        player_id: i16,
    },
    SelectLevel {
        player_id: i16,
        level_id: String,
    },
    SelectCustomLevel {
        player_id: i16,
        raw: serde_json::Value,
    },
    AdminBan {
        requester_id: i16,
        target_id: i16,
        reason: String,
    },
    AdminRename {
        requester_id: i16,
        target_id: i16,
        name: String,
    },
    AdminSquad {
        requester_id: i16,
        target_id: i16,
        squad: String,
    },
    /// Server-wide drain notice (shutdown sentinel file detected).
    HurryUp {
        seconds_remaining: u64,
    },
    /// Re-evaluate `start(forced=false)`; used after a config reload
    /// lowers `player_cap` below a match's current player count.
    ReconsiderStart,
}

/// High-level lifecycle state, mirrored to a `watch` channel so the
/// matchmaker and the server's maintenance loop can observe it without
/// going through the event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchLifecycle {
    Lobby,
    Playing,
    Closed,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchKey {
    pub game_mode: GameModeKey,
    pub private: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameModeKey {
    Royale,
    Pvp,
    Hell,
}

impl From<GameMode> for GameModeKey {
    fn from(mode: GameMode) -> Self {
        match mode {
            GameMode::Royale => GameModeKey::Royale,
            GameMode::Pvp => GameModeKey::Pvp,
            GameMode::Hell => GameModeKey::Hell,
        }
    }
}
