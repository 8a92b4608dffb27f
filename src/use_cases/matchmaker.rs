// Matchmaker: assigns connections to matches by (mode, privacy, room name,
// capacity) and owns the server-wide match list. Grounded on
// `LobbyRegistry`'s registry-of-handles-plus-spawned-task shape, adapted so
// lookup scans preserve insertion order the way `getMatch` does in the
// source system rather than hashing by an opaque lobby id.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::{Notify, RwLock, mpsc, watch};
use tracing::{debug, info, warn};

use crate::domain::match_state::GameMode;
use crate::domain::ports::{AccountStore, DiscordNotifier, LevelCatalog};
use crate::use_cases::match_engine::{self, MatchSettings};
use crate::use_cases::types::{MatchEvent, MatchLifecycle};

#[derive(Debug, Clone)]
pub struct MatchmakerSettings {
    pub player_min: usize,
    pub player_cap: usize,
    pub allow_late_enter: bool,
    pub engine: MatchSettings,
}

#[derive(Clone)]
pub struct MatchHandle {
    pub match_id: u64,
    pub room_name: Arc<str>,
    pub private: bool,
    pub game_mode: GameMode,
    pub input_tx: mpsc::Sender<MatchEvent>,
    pub lifecycle_rx: watch::Receiver<MatchLifecycle>,
    pub player_count: Arc<AtomicUsize>,
    pub playing: Arc<AtomicBool>,
    pub closed: Arc<AtomicBool>,
    pub shutdown: Arc<Notify>,
    /// Never registered in the server-wide list; `remove_match` is a
    /// no-op for these.
    pub unregistered: bool,
}

impl MatchHandle {
    fn matches_request(&self, room_name: &str, private: bool, game_mode: GameMode, cap: usize, allow_late_enter: bool) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        if self.player_count.load(Ordering::SeqCst) >= cap {
            return false;
        }
        if self.game_mode != game_mode || self.private != private {
            return false;
        }
        if private && self.room_name.as_ref() != room_name {
            return false;
        }
        if !allow_late_enter && self.playing.load(Ordering::SeqCst) {
            return false;
        }
        true
    }
}

struct Registered {
    handle: MatchHandle,
    engine_task: tokio::task::JoinHandle<()>,
}

pub struct MatchRegistry {
    settings: MatchmakerSettings,
    matches: RwLock<Vec<Registered>>,
    next_match_id: AtomicUsize,
    level_catalog: Arc<dyn LevelCatalog>,
    account_store: Arc<dyn AccountStore>,
    discord: Arc<dyn DiscordNotifier>,
    empty_tx: mpsc::UnboundedSender<u64>,
    empty_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<u64>>,
}

impl MatchRegistry {
    pub fn new(
        settings: MatchmakerSettings,
        level_catalog: Arc<dyn LevelCatalog>,
        account_store: Arc<dyn AccountStore>,
        discord: Arc<dyn DiscordNotifier>,
    ) -> Self {
        let (empty_tx, empty_rx) = mpsc::unbounded_channel();
        MatchRegistry {
            settings,
            matches: RwLock::new(Vec::new()),
            next_match_id: AtomicUsize::new(1),
            level_catalog,
            account_store,
            discord,
            empty_tx,
            empty_rx: tokio::sync::Mutex::new(empty_rx),
        }
    }

    /// Drains matches reported empty by their own engine task and drops
    /// them from the registry. `frameworks::server` spawns this once
    /// alongside the registry.
    pub async fn run_reaper(self: Arc<Self>) {
        loop {
            let id = {
                let mut rx = self.empty_rx.lock().await;
                match rx.recv().await {
                    Some(id) => id,
                    None => return,
                }
            };
            self.remove_match(id).await;
        }
    }

    /// §4.2 `getMatch`.
    pub async fn get_match(&self, room_name: &str, private: bool, game_mode: GameMode) -> MatchHandle {
        if private && room_name.is_empty() {
            info!("creating solo-private match");
            return self.spawn_match(room_name.to_string(), private, game_mode, false).await;
        }

        {
            let matches = self.matches.read().await;
            for entry in matches.iter() {
                if entry.handle.matches_request(
                    room_name,
                    private,
                    game_mode,
                    self.settings.player_cap,
                    self.settings.allow_late_enter,
                ) {
                    return entry.handle.clone();
                }
            }
        }

        self.spawn_match(room_name.to_string(), private, game_mode, true).await
    }

    async fn spawn_match(&self, room_name: String, private: bool, game_mode: GameMode, register: bool) -> MatchHandle {
        let match_id = self.next_match_id.fetch_add(1, Ordering::SeqCst) as u64;
        let (input_tx, input_rx) = mpsc::channel::<MatchEvent>(256);
        let (lifecycle_tx, lifecycle_rx) = watch::channel(MatchLifecycle::Lobby);
        let player_count = Arc::new(AtomicUsize::new(0));
        let playing = Arc::new(AtomicBool::new(false));
        let closed = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(Notify::new());

        let handle = MatchHandle {
            match_id,
            room_name: Arc::from(room_name.as_str()),
            private,
            game_mode,
            input_tx,
            lifecycle_rx,
            player_count: player_count.clone(),
            playing: playing.clone(),
            closed: closed.clone(),
            shutdown: shutdown.clone(),
            unregistered: !register,
        };

        let engine_task = tokio::spawn(match_engine::run(match_engine::MatchEngineHandle {
            match_id,
            room_name: room_name.clone(),
            private,
            game_mode,
            input_rx,
            lifecycle_tx,
            player_count,
            playing,
            closed,
            shutdown: shutdown.clone(),
            settings: self.settings.engine.clone(),
            player_min: self.settings.player_min,
            player_cap: self.settings.player_cap,
            level_catalog: self.level_catalog.clone(),
            account_store: self.account_store.clone(),
            discord: self.discord.clone(),
            on_empty: self.empty_tx.clone(),
        }));

        info!(match_id, %private, ?game_mode, register, "match created");

        if register {
            let mut matches = self.matches.write().await;
            matches.push(Registered {
                handle: handle.clone(),
                engine_task,
            });
        } else {
            // Solo-private matches still need their task tracked so it is
            // not detached silently; drop the handle, the task cleans
            // itself up via its own shutdown notify when the sole player
            // disconnects.
            drop(engine_task);
        }

        handle
    }

    /// Runs when a match empties; a no-op for unregistered (solo-private)
    /// matches, matching the source's `server.matches` append discipline.
    pub async fn remove_match(&self, match_id: u64) {
        let mut matches = self.matches.write().await;
        if let Some(pos) = matches.iter().position(|e| e.handle.match_id == match_id) {
            let entry = matches.remove(pos);
            entry.handle.shutdown.notify_waiters();
            debug!(match_id, "match removed from registry");
        } else {
            warn!(match_id, "remove_match called for unknown or unregistered match");
        }
    }

    /// Snapshot of every registered match's handle, for status reporting.
    pub async fn active_matches(&self) -> Vec<MatchHandle> {
        self.matches.read().await.iter().map(|e| e.handle.clone()).collect()
    }

    /// Sum of `player_count` across every registered match; used by the
    /// shutdown drain loop to decide when the process may exit early.
    pub async fn total_players(&self) -> usize {
        let matches = self.matches.read().await;
        matches.iter().map(|e| e.handle.player_count.load(Ordering::SeqCst)).sum()
    }

    /// Broadcasts a drain hurry-up to every match's players.
    pub async fn broadcast_hurry_up(&self, seconds_remaining: u64) {
        let matches = self.matches.read().await;
        for entry in matches.iter() {
            let _ = entry.handle.input_tx.try_send(MatchEvent::HurryUp { seconds_remaining });
        }
    }

    /// Retroactively re-evaluates `start(forced=false)` on every joinable
    /// match after a config reload decreases `player_cap` below some
    /// matches' current player count threshold (§5.3).
    pub async fn reconsider_cap_decrease(&self, new_cap: usize) {
        let matches = self.matches.read().await;
        for entry in matches.iter() {
            if !entry.handle.playing.load(Ordering::SeqCst)
                && entry.handle.player_count.load(Ordering::SeqCst) >= new_cap
            {
                let _ = entry.handle.input_tx.try_send(MatchEvent::ReconsiderStart);
            }
        }
    }
}
