// The match engine: one tokio task per Match, the sole mutator of that
// Match's state (SPEC_FULL.md §5). Grounded on `use_cases::game::world_task`'s
// shape (owns all mutable state, drives everything from one select! loop,
// I/O only happens at channel/socket boundaries) generalized from a fixed
// ship-physics tick to the lobby/countdown/playing state machine this
// spec describes.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use rand::Rng;
use tokio::sync::{Notify, mpsc, watch};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::domain::errors::CoreError;
use crate::domain::level::add_gold_flower;
use crate::domain::match_state::{GameMode, Match, ObjectEventOutcome, TileEventOutcome};
use crate::domain::ports::{AccountStore, DiscordNotifier, LevelCatalog};
use crate::use_cases::protocol as wire;
use crate::use_cases::types::{MatchEvent, MatchLifecycle, OutboundFrame, OutboundSender};

#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub auto_start_time: Duration,
    pub start_timer_seconds: u32,
    pub enable_auto_start_in_multi_private: bool,
    pub enable_level_select_in_multi_private: bool,
    pub enable_vote_start: bool,
    pub vote_rate_to_start: f64,
    pub coin_reward_flagpole: i32,
    pub coin_reward_podium: (i32, i32, i32),
    pub default_name: String,
    pub default_team: String,
}

pub struct MatchEngineHandle {
    pub match_id: u64,
    pub room_name: String,
    pub private: bool,
    pub game_mode: GameMode,
    pub input_rx: mpsc::Receiver<MatchEvent>,
    pub lifecycle_tx: watch::Sender<MatchLifecycle>,
    pub player_count: Arc<AtomicUsize>,
    pub playing: Arc<AtomicBool>,
    pub closed: Arc<AtomicBool>,
    pub shutdown: Arc<Notify>,
    pub settings: MatchSettings,
    pub player_min: usize,
    pub player_cap: usize,
    pub level_catalog: Arc<dyn LevelCatalog>,
    pub account_store: Arc<dyn AccountStore>,
    pub discord: Arc<dyn DiscordNotifier>,
    /// Notified with this match's id once its player list empties, so
    /// `frameworks::server` can tell the registry to drop it. The registry
    /// can't be handed to the engine directly: it's what spawns the engine.
    pub on_empty: mpsc::UnboundedSender<u64>,
}

struct Engine {
    m: Match,
    outbounds: HashMap<i16, OutboundSender>,
    auto_start_at: Option<Instant>,
    tick_at: Option<Instant>,
    countdown: Option<(u32, Instant)>,
    /// Seconds left until auto-start, counting down; reset to
    /// `auto_start_time` every time `on_player_ready` (re-)arms it.
    auto_start_ticks: u64,
}

pub async fn run(mut h: MatchEngineHandle) {
    let mut engine = Engine {
        m: Match::new(h.room_name.clone(), h.private, h.game_mode),
        outbounds: HashMap::new(),
        auto_start_at: None,
        tick_at: Some(Instant::now() + Duration::from_secs(1)),
        countdown: None,
        auto_start_ticks: 0,
    };

    loop {
        let next_deadline = [engine.auto_start_at, engine.tick_at, engine.countdown.map(|(_, at)| at)]
            .into_iter()
            .flatten()
            .min();

        let sleep = match next_deadline {
            Some(at) => tokio::time::sleep_until(at),
            None => tokio::time::sleep(Duration::from_secs(3600)),
        };
        tokio::pin!(sleep);

        tokio::select! {
            _ = h.shutdown.notified() => {
                info!(match_id = h.match_id, "match engine shutting down");
                break;
            }
            maybe_ev = h.input_rx.recv() => {
                match maybe_ev {
                    Some(ev) => handle_event(&mut engine, &h, ev).await,
                    None => break,
                }
            }
            _ = &mut sleep => {
                fire_timers(&mut engine, &h).await;
            }
        }

        h.player_count.store(engine.m.players.len(), Ordering::SeqCst);
        h.playing.store(engine.m.playing, Ordering::SeqCst);
        h.closed.store(engine.m.closed, Ordering::SeqCst);
    }
}

async fn fire_timers(engine: &mut Engine, h: &MatchEngineHandle) {
    let now = Instant::now();

    if engine.auto_start_at.is_some_and(|at| now >= at) {
        engine.auto_start_at = None;
        try_start(engine, h, true).await;
    }

    if engine.tick_at.is_some_and(|at| now >= at) {
        if engine.m.playing {
            engine.tick_at = None;
        } else {
            if engine.auto_start_at.is_some() {
                engine.auto_start_ticks = engine.auto_start_ticks.saturating_sub(1);
            } else {
                engine.auto_start_ticks = 0;
            }
            let msg = wire::tick(
                engine.auto_start_ticks,
                engine.m.votes,
                h.player_min,
                h.player_cap,
                h.settings.vote_rate_to_start,
            );
            broadcast_json(engine, &msg, None);
            engine.tick_at = Some(now + Duration::from_secs(1));
        }
    }

    if let Some((n, at)) = engine.countdown {
        if now >= at {
            if n == 0 {
                engine.m.closed = true;
                engine.countdown = None;
                let _ = h.lifecycle_tx.send(MatchLifecycle::Closed);
                info!(match_id = h.match_id, "match closed");
            } else {
                broadcast_json(engine, &wire::start_timer(n * 30), None);
                engine.countdown = Some((n - 1, now + Duration::from_secs(1)));
            }
        }
    }
}

async fn handle_event(engine: &mut Engine, h: &MatchEngineHandle, ev: MatchEvent) {
    match ev {
        MatchEvent::Join { mut player, outbound, reply } => {
            if engine.m.closed {
                let _ = outbound.send(OutboundFrame::Close { reason: "match closed" });
                let _ = reply.send(-1);
                return;
            }
            player.lobbier = engine.m.is_lobby;
            let id = engine.m.add_player(player);
            engine.outbounds.insert(id, outbound);
            let _ = reply.send(id);
            rebroadcast_player_list(engine);
        }
        MatchEvent::Leave { player_id, reply } => {
            engine.outbounds.remove(&player_id);
            let dead_or_won = engine.m.player(player_id).map(|p| p.dead || p.win).unwrap_or(true);
            let existed = engine.m.player(player_id).is_some();
            let outcome = engine.m.remove_player(player_id, h.settings.vote_rate_to_start);
            let _ = reply.send(outcome.stat_delta.clone());
            if existed {
                if !dead_or_won {
                    if let Some(id) = outcome.broadcast_kill_for {
                        broadcast_binary(engine, &wire::kill_player_object(id), None);
                    }
                }
                if outcome.rebroadcast_player_list {
                    rebroadcast_player_list(engine);
                }
                if outcome.should_start {
                    try_start(engine, h, false).await;
                }
                if outcome.match_now_empty {
                    engine.auto_start_at = None;
                    let _ = h.lifecycle_tx.send(MatchLifecycle::Ended);
                    let _ = h.on_empty.send(h.match_id);
                }
            }
        }
        MatchEvent::VoteStart { player_id } => {
            if engine.m.vote_start(player_id, h.settings.vote_rate_to_start) {
                try_start(engine, h, false).await;
            }
        }
        MatchEvent::PlayerReady { player_id } => {
            on_player_ready(engine, h, player_id).await;
        }
        MatchEvent::ForceStart { player_id } => {
            if engine.m.private && engine.m.player(player_id).is_some() {
                try_start(engine, h, true).await;
            }
        }
        MatchEvent::ObjectEvent { player_id, level, zone, oid, ty } => {
            let outcome = engine.m.object_event(player_id, level, zone, oid, ty);
            match outcome {
                ObjectEventOutcome::CoinCollected { awarded_to } => {
                    if let Some(p) = engine.m.player_mut(awarded_to) {
                        p.stat_delta.coins += 1;
                    }
                    send_binary(engine, awarded_to, &wire::coin_pickup_ack());
                }
                ObjectEventOutcome::PowerupConsumed { leaderboard_delta, awarded_to } => {
                    if leaderboard_delta != 0 {
                        if let Some(p) = engine.m.player_mut(awarded_to) {
                            p.stat_delta.coins += leaderboard_delta;
                        }
                        send_binary(engine, awarded_to, &wire::leaderboard_coins_delta(leaderboard_delta));
                    }
                }
                ObjectEventOutcome::GoldFlowerLatched | ObjectEventOutcome::NoOp => {}
            }
            broadcast_binary(
                engine,
                &wire::with_sender_prefix(wire::OP_OBJECT_EVENT, player_id, &wire::object_event(level, zone, oid, ty)[1..]),
                None,
            );
        }
        MatchEvent::TileEvent { player_id, level, zone, x, y_raw, ty } => {
            let outcome = engine.m.tile_event(player_id, level, zone, x, y_raw);
            if let TileEventOutcome::CoinAwarded { awarded_to } = outcome {
                if let Some(p) = engine.m.player_mut(awarded_to) {
                    p.stat_delta.coins += 1;
                }
                send_binary(engine, awarded_to, &wire::coin_pickup_ack());
            }
            broadcast_binary(
                engine,
                &wire::with_sender_prefix(wire::OP_TILE_EVENT, player_id, &wire::tile_event(level, zone, x, y_raw, ty)[1..]),
                None,
            );
        }
        MatchEvent::Movement { player_id, level, zone, x: _, y: _, sprite, reverse: _, raw_pkt } => {
            if let Some(outcome) = engine.m.movement(player_id, level, zone, sprite, raw_pkt.clone(), h.settings.coin_reward_flagpole) {
                if outcome.blocked_lobby_sprite {
                    if let Some(p) = engine.m.player_mut(player_id) {
                        p.blocked = true;
                    }
                    return;
                }
                if let Some(bonus) = outcome.flag_bonus {
                    if let Some(p) = engine.m.player_mut(player_id) {
                        p.stat_delta.coins += bonus;
                    }
                    send_binary(engine, player_id, &wire::leaderboard_coins_delta(bonus));
                }
                if outcome.warped {
                    // Peers in the old zone see the raw frame; peers in the
                    // new zone get a synthetic frame carrying the new
                    // (level, zone) triple.
                    broadcast_binary_zone(engine, outcome.old_zone, &raw_pkt, Some(player_id));
                    broadcast_binary_zone(engine, outcome.new_zone, &raw_pkt, Some(player_id));
                } else {
                    broadcast_binary_zone(engine, outcome.new_zone, &raw_pkt, Some(player_id));
                }
            }
        }
        MatchEvent::SelfDeath { player_id } => {
            let lobbier = engine.m.player(player_id).map(|p| p.lobbier).unwrap_or(true);
            if engine.m.die(player_id) {
                broadcast_binary(engine, &wire::kill_player_object(player_id), None);
                if !lobbier {
                    send_binary(engine, player_id, &wire::leaderboard_coins_delta(-10));
                }
            }
        }
        MatchEvent::KillClaim { player_id, reported_killer_id } => {
            engine.m.die(player_id);
            broadcast_binary(engine, &wire::kill_player_object(player_id), None);
            if let Some(credited) = engine.m.kill_claim(player_id, reported_killer_id) {
                if let Some(p) = engine.m.player_mut(credited) {
                    p.stat_delta.kills += 1;
                    p.stat_delta.coins += 10;
                }
                send_binary(engine, credited, &wire::leaderboard_coins_delta(10));
            }
        }
        MatchEvent::TrustPing { player_id } => {
            if engine.m.trust_ping(player_id) {
                warn!(match_id = h.match_id, player_id, "trust ping abuse threshold exceeded");
                send_close(engine, player_id, "trust abuse");
            }
        }
        MatchEvent::Finish { player_id } => {
            if let Some(rank) = engine.m.finish(player_id) {
                let reward = crate::domain::match_state::podium_coin_reward(rank, h.settings.coin_reward_podium);
                if let Some(p) = engine.m.player_mut(player_id) {
                    p.stat_delta.coins += reward;
                    if rank == 1 {
                        p.stat_delta.wins += 1;
                    }
                }
                send_binary(engine, player_id, &wire::result(rank.min(255) as u8));
                if reward != 0 {
                    send_binary(engine, player_id, &wire::leaderboard_coins_delta(reward));
                }
                if rank == 1 && !engine.m.private {
                    if let Some(p) = engine.m.player(player_id) {
                        let discord = h.discord.clone();
                        let nickname = p.name.clone();
                        let room = engine.m.room_name.clone();
                        tokio::spawn(async move {
                            discord.notify_winner(&nickname, &room).await;
                        });
                    }
                }
            }
        }
        MatchEvent::SelectLevel { player_id: _, level_id } => {
            if engine.m.private && !h.settings.enable_level_select_in_multi_private {
                return;
            }
            match h.level_catalog.get_level(&level_id) {
                Some(_) => {
                    engine.m.force_level = Some(level_id.clone());
                    broadcast_json(engine, &wire::level_select(&level_id, true, ""), None);
                }
                None => {
                    // Silent no-op on unknown catalog id, matching the
                    // source's `selectLevel` behavior.
                }
            }
        }
        MatchEvent::SelectCustomLevel { player_id, raw } => {
            if engine.m.private && !h.settings.enable_level_select_in_multi_private {
                return;
            }
            match h.level_catalog.validate_custom_level(&raw) {
                Ok(_) => {
                    engine.m.force_level = Some("custom".to_string());
                    broadcast_json(engine, &wire::level_select("custom", true, ""), None);
                }
                Err(msg) => {
                    send_json(engine, player_id, &wire::level_select("custom", false, &msg));
                }
            }
        }
        MatchEvent::AdminBan { requester_id, target_id, reason } => {
            if !is_dev(engine, requester_id) {
                send_close(engine, requester_id, "not authorized");
                return;
            }
            if let Some(p) = engine.m.player_mut(target_id) {
                p.stat_delta.is_banned = Some(true);
            }
            info!(match_id = h.match_id, target_id, reason, "admin ban");
            send_close(engine, target_id, "banned");
        }
        MatchEvent::AdminRename { requester_id, target_id, name } => {
            if !is_dev(engine, requester_id) {
                send_close(engine, requester_id, "not authorized");
                return;
            }
            let Some(p) = engine.m.player_mut(target_id) else { return };
            if p.is_dev {
                return;
            }
            p.name = name.clone();
            p.force_renamed = true;
            p.stat_delta.nickname = Some(name.clone());
            broadcast_json(engine, &wire::rename_broadcast(target_id, &name), None);
        }
        MatchEvent::AdminSquad { requester_id, target_id, squad } => {
            if !is_dev(engine, requester_id) {
                send_close(engine, requester_id, "not authorized");
                return;
            }
            let squad = squad.chars().take(3).collect::<String>();
            if let Some(p) = engine.m.player_mut(target_id) {
                p.team = squad.clone();
                p.stat_delta.squad = Some(squad);
                rebroadcast_player_list(engine);
            }
        }
        MatchEvent::HurryUp { seconds_remaining } => {
            broadcast_json(engine, &wire::hurry_up(seconds_remaining), None);
        }
        MatchEvent::ReconsiderStart => {
            try_start(engine, h, false).await;
        }
    }
}

fn is_dev(engine: &Engine, id: i16) -> bool {
    engine.m.player(id).map(|p| p.is_dev).unwrap_or(false)
}

async fn on_player_ready(engine: &mut Engine, h: &MatchEngineHandle, player_id: i16) {
    let Some(player) = engine.m.player_mut(player_id) else { return };
    player.loaded = true;
    let lobbier = player.lobbier;
    let closed = engine.m.closed;
    let is_lobby = engine.m.is_lobby;

    let auto_start_enabled =
        !engine.m.private || (!engine.m.room_name.is_empty() && h.settings.enable_auto_start_in_multi_private);
    if auto_start_enabled {
        engine.auto_start_at = Some(Instant::now() + h.settings.auto_start_time);
        engine.auto_start_ticks = h.settings.auto_start_time.as_secs();
    }
    if engine.tick_at.is_none() && !engine.m.playing {
        engine.tick_at = Some(Instant::now() + Duration::from_secs(1));
    }

    if is_lobby || !lobbier || closed {
        let peers: Vec<_> = engine
            .m
            .loaded_players()
            .filter(|p| p.id != player_id)
            .map(|p| (p.id, p.level, p.zone, p.x, p.y, p.skin, p.is_dev))
            .collect();
        for (id, level, zone, x, y, skin, is_dev) in peers {
            send_binary(
                engine,
                player_id,
                &wire::create_player_object(level, zone, x as u16, y as u16, skin as i16, is_dev),
            );
        }
    }
    if let Some((n, _)) = engine.countdown {
        send_json(engine, player_id, &wire::start_timer(n * 30));
    }

    rebroadcast_player_list(engine);

    if !engine.m.playing {
        if engine.m.players.len() >= h.player_cap {
            try_start(engine, h, true).await;
        } else if h.settings.enable_vote_start
            && (engine.m.votes as f64) >= (engine.m.players.len() as f64) * h.settings.vote_rate_to_start
        {
            try_start(engine, h, false).await;
        }
    }
}

async fn try_start(engine: &mut Engine, h: &MatchEngineHandle, forced: bool) {
    if engine.m.playing {
        return;
    }
    let min_players = if engine.m.private && engine.m.room_name.is_empty() {
        1
    } else {
        h.player_min
    };
    if !forced && engine.m.players.len() < min_players {
        return;
    }

    engine.m.playing = true;
    engine.m.is_lobby = false;
    engine.auto_start_at = None;
    engine.tick_at = None;
    let _ = h.lifecycle_tx.send(MatchLifecycle::Playing);

    let level = match &engine.m.force_level {
        Some(id) => h.level_catalog.get_level(id),
        None => h.level_catalog.get_random_level("game", engine.m.level_mode()),
    };
    let Some(mut level) = level else {
        warn!(match_id = h.match_id, "no level available, aborting start");
        engine.m.playing = false;
        engine.m.is_lobby = true;
        return;
    };

    if !engine.m.private && matches!(engine.m.game_mode, GameMode::Royale) {
        let mut rng = rand::thread_rng();
        add_gold_flower(&mut level, |n| rng.gen_range(0..n));
    }

    engine.m.world = level.id.clone();
    engine.m.world_state = crate::domain::level::WorldState::from_level(&level);
    engine.m.level = level;

    broadcast_json(engine, &wire::world_load(&engine.m.world, None), None);

    engine.countdown = Some((h.settings.start_timer_seconds, Instant::now() + Duration::from_secs(1)));
    info!(match_id = h.match_id, world = %engine.m.world, "match starting");
}

fn rebroadcast_player_list(engine: &mut Engine) {
    if engine.m.closed {
        return;
    }
    let entries: Vec<_> = engine
        .m
        .loaded_players()
        .map(|p| (p.id, p.name.clone(), p.team.clone(), p.skin, p.is_dev, p.dead, p.win))
        .collect();
    let msg = wire::player_list(entries);
    broadcast_json(engine, &msg, None);
}

fn broadcast_json(engine: &Engine, msg: &serde_json::Value, ignore: Option<i16>) {
    let text = wire::to_text(msg);
    for (id, tx) in engine.outbounds.iter() {
        if Some(*id) == ignore {
            continue;
        }
        if !engine.m.player(*id).map(|p| p.loaded).unwrap_or(false) {
            continue;
        }
        let _ = tx.send(OutboundFrame::Text(text.clone()));
    }
}

fn send_json(engine: &Engine, to: i16, msg: &serde_json::Value) {
    if let Some(tx) = engine.outbounds.get(&to) {
        let _ = tx.send(OutboundFrame::Text(wire::to_text(msg)));
    }
}

fn broadcast_binary(engine: &Engine, bytes: &[u8], ignore: Option<i16>) {
    for (id, tx) in engine.outbounds.iter() {
        if Some(*id) == ignore {
            continue;
        }
        if !engine.m.player(*id).map(|p| p.loaded).unwrap_or(false) {
            continue;
        }
        let _ = tx.send(OutboundFrame::Binary(bytes.to_vec()));
    }
}

/// `broad_player_update`-style zone-scoped fan-out: winners always see it,
/// everyone else only if they share the target `(level, zone)`.
fn broadcast_binary_zone(engine: &Engine, zone: (u8, u8), bytes: &[u8], ignore: Option<i16>) {
    for (id, tx) in engine.outbounds.iter() {
        if Some(*id) == ignore {
            continue;
        }
        let Some(p) = engine.m.player(*id) else { continue };
        if !p.loaded {
            continue;
        }
        if p.win || p.position() == zone {
            let _ = tx.send(OutboundFrame::Binary(bytes.to_vec()));
        }
    }
}

fn send_binary(engine: &Engine, to: i16, bytes: &[u8]) {
    if let Some(tx) = engine.outbounds.get(&to) {
        let _ = tx.send(OutboundFrame::Binary(bytes.to_vec()));
    }
}

fn send_close(engine: &Engine, to: i16, reason: &'static str) {
    if let Some(tx) = engine.outbounds.get(&to) {
        let _ = tx.send(OutboundFrame::Close { reason });
    }
}

/// Flushes a leaving player's accumulated stat delta. Called by the
/// connection layer after it receives confirmation the player has been
/// removed from the match (cancellation semantics, §5).
pub async fn flush_stats(
    account_store: &dyn AccountStore,
    account_id: Option<i64>,
    private: bool,
    delta: crate::domain::account::StatDelta,
) -> Result<(), CoreError> {
    let Some(account_id) = account_id else {
        return Ok(());
    };
    let mut delta = delta;
    if private {
        // Counters never persist for private matches; isBanned/nickname/
        // squad always do if set.
        delta.wins = 0;
        delta.deaths = 0;
        delta.kills = 0;
        delta.coins = 0;
    }
    if delta.is_empty() {
        return Ok(());
    }
    account_store
        .update_stats(account_id, delta)
        .await
        .map_err(|e| CoreError::storage(e.to_string()))
}
