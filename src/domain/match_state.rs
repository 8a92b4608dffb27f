// Match and Player entities plus the pure gameplay rules that mutate them.
// All I/O (broadcasting the outcome, persisting stats, timers) is the
// match engine use-case's job; this module never awaits anything.

use crate::domain::account::StatDelta;
use crate::domain::level::{
    LevelData, TileCode, WorldState, GOLD_FLOWER_OID, OBJECT_TYPE_COIN, TILE_CLEARED,
    TILE_COIN_BLOCK, TILE_FLAGPOLE, TILE_HIDDEN_COIN_BLOCK, TILE_ITEM_BLOCK, TILE_MULTI_COIN_BLOCK,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    Royale,
    Pvp,
    Hell,
}

impl GameMode {
    /// The level pool a match of this mode draws from. `Pvp` draws from
    /// the royale pool; `Royale`/`Hell` draw from their own.
    pub fn level_mode(self) -> GameMode {
        match self {
            GameMode::Pvp => GameMode::Royale,
            other => other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: i16,
    pub name: String,
    pub team: String,
    pub skin: i32,
    pub game_mode: GameMode,
    pub is_dev: bool,
    pub dead: bool,
    pub win: bool,
    pub voted: bool,
    pub loaded: bool,
    /// Captured from `match.is_lobby` at load time; suppresses stat accrual
    /// for players who only ever sat in a lobby-mode match.
    pub lobbier: bool,
    pub blocked: bool,
    pub level: u8,
    pub zone: u8,
    pub x: f32,
    pub y: f32,
    pub last_update_pkt: Option<Vec<u8>>,
    pub trust_count: u32,
    pub flag_touched: bool,
    pub force_renamed: bool,
    pub account_id: Option<i64>,
    /// Accumulated since join; flushed to the account store only when the
    /// connection closes, and only for wins/deaths/kills/coins if the
    /// match is non-private.
    pub stat_delta: StatDelta,
}

impl Player {
    pub fn new(id: i16, name: String, team: String, skin: i32, game_mode: GameMode, is_dev: bool) -> Self {
        Player {
            id,
            name,
            team,
            skin,
            game_mode,
            is_dev,
            dead: false,
            win: false,
            voted: false,
            loaded: false,
            lobbier: false,
            blocked: false,
            level: 0,
            zone: 0,
            x: 0.0,
            y: 0.0,
            last_update_pkt: None,
            trust_count: 0,
            flag_touched: false,
            force_renamed: false,
            account_id: None,
            stat_delta: StatDelta::default(),
        }
    }

    pub fn position(&self) -> (u8, u8) {
        (self.level, self.zone)
    }
}

/// What `remove_player` needs the engine to act on; the two bottom branches
/// are mutually exclusive, not sequential.
#[derive(Debug, Default)]
pub struct RemoveOutcome {
    pub match_now_empty: bool,
    pub broadcast_kill_for: Option<i16>,
    pub rebroadcast_player_list: bool,
    pub vote_decremented: bool,
    pub should_start: bool,
    /// The removed player's accrued stat delta, for the caller to flush.
    pub stat_delta: StatDelta,
    pub account_id: Option<i64>,
}

#[derive(Debug)]
pub enum ObjectEventOutcome {
    /// Nothing changed server-side (unknown oid, or a double-collect).
    NoOp,
    GoldFlowerLatched,
    CoinCollected { awarded_to: i16 },
    PowerupConsumed { leaderboard_delta: i32, awarded_to: i16 },
}

#[derive(Debug)]
pub enum TileEventOutcome {
    NoOp,
    CoinAwarded { awarded_to: i16 },
    ItemBlockTriggered { powerup_oid: i64, powerup_type: i32 },
}

#[derive(Debug)]
pub struct WarpOutcome {
    pub old_zone: (u8, u8),
    pub new_zone: (u8, u8),
    pub warped: bool,
    pub flag_bonus: Option<i32>,
    pub blocked_lobby_sprite: bool,
}

pub struct Match {
    pub room_name: String,
    pub private: bool,
    pub game_mode: GameMode,
    pub is_lobby: bool,
    pub playing: bool,
    pub closed: bool,
    pub players: Vec<Player>,
    pub last_id: i16,
    pub votes: u32,
    pub winners: u32,
    pub world: String,
    pub world_state: WorldState,
    pub level: LevelData,
    pub gold_flower_taken: bool,
    pub force_level: Option<String>,
}

impl Match {
    pub fn new(room_name: String, private: bool, game_mode: GameMode) -> Self {
        Match {
            room_name,
            private,
            game_mode,
            is_lobby: true,
            playing: false,
            closed: false,
            players: Vec::new(),
            last_id: 0,
            votes: 0,
            winners: 0,
            world: String::new(),
            world_state: WorldState::default(),
            level: LevelData::default(),
            gold_flower_taken: false,
            force_level: None,
        }
    }

    pub fn level_mode(&self) -> GameMode {
        self.game_mode.level_mode()
    }

    /// Contextual minimum player count to allow an unforced `start()`.
    pub fn start_min_players(&self) -> usize {
        if self.private && self.room_name.is_empty() {
            1
        } else {
            usize::MAX // caller substitutes the configured player_min
        }
    }

    pub fn add_player(&mut self, mut player: Player) -> i16 {
        self.last_id += 1;
        player.id = self.last_id;
        let id = player.id;
        self.players.push(player);
        id
    }

    pub fn player_mut(&mut self, id: i16) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn player(&self, id: i16) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn remove_player(&mut self, id: i16, vote_rate_to_start: f64) -> RemoveOutcome {
        let mut outcome = RemoveOutcome::default();
        let Some(idx) = self.players.iter().position(|p| p.id == id) else {
            return outcome;
        };
        let player = self.players.remove(idx);
        outcome.stat_delta = player.stat_delta.clone();
        outcome.account_id = player.account_id;

        if self.players.is_empty() {
            outcome.match_now_empty = true;
            return outcome;
        }

        if !player.dead && !player.win {
            outcome.broadcast_kill_for = Some(id);
        }

        if !self.closed {
            outcome.rebroadcast_player_list = true;
        }

        if player.voted {
            self.votes = self.votes.saturating_sub(1);
            outcome.vote_decremented = true;
        } else if self.vote_threshold_met(vote_rate_to_start) {
            outcome.should_start = true;
        }

        outcome
    }

    fn vote_threshold_met(&self, vote_rate_to_start: f64) -> bool {
        !self.players.is_empty() && (self.votes as f64) >= (self.players.len() as f64) * vote_rate_to_start
    }

    /// Returns `true` if the vote threshold is now met (caller should
    /// then attempt `start()`).
    pub fn vote_start(&mut self, id: i16, vote_rate_to_start: f64) -> bool {
        let Some(player) = self.player_mut(id) else {
            return false;
        };
        if player.voted {
            return false;
        }
        player.voted = true;
        self.votes += 1;
        self.vote_threshold_met(vote_rate_to_start)
    }

    pub fn loaded_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.loaded)
    }

    /// §4.4 object event. `sender_id` is the triggering player.
    pub fn object_event(&mut self, sender_id: i16, level: u8, zone: u8, oid: i64, ty: u8) -> ObjectEventOutcome {
        if self.is_lobby && oid == GOLD_FLOWER_OID {
            self.gold_flower_taken = true;
            return ObjectEventOutcome::GoldFlowerLatched;
        }

        let (w, z) = (level as usize, zone as usize);
        if let Some(coins) = self.world_state.coins.get_mut(w).and_then(|zs| zs.get_mut(z)) {
            if coins.remove(&oid) {
                return ObjectEventOutcome::CoinCollected { awarded_to: sender_id };
            }
        }
        let is_known_coin = self
            .world_state
            .allcoins
            .get(w)
            .and_then(|zs| zs.get(z))
            .map(|set| set.contains(&oid))
            .unwrap_or(false);
        if is_known_coin {
            // Already collected; idempotent no-op.
            return ObjectEventOutcome::NoOp;
        }

        if let Some(powerup_type) = self.world_state.powerups.remove(&oid) {
            let leaderboard_delta = if powerup_type == 100 { 50_000 } else { 0 };
            let _ = ty;
            return ObjectEventOutcome::PowerupConsumed {
                leaderboard_delta,
                awarded_to: sender_id,
            };
        }

        ObjectEventOutcome::NoOp
    }

    /// §4.4 tile event / §3 tile-id rules.
    pub fn tile_event(&mut self, sender_id: i16, level: u8, zone: u8, x: u16, y_raw: u16) -> TileEventOutcome {
        let (w, z) = (level as usize, zone as usize);
        let Some(code) = self.world_state.get_tile(w, z, x as usize, y_raw as usize) else {
            return TileEventOutcome::NoOp;
        };

        match code.id() {
            TILE_ITEM_BLOCK => {
                let powerup_oid = WorldState::powerup_oid(x as i32, y_raw as i32);
                let powerup_type = code.extra_data();
                self.world_state.powerups.insert(powerup_oid, powerup_type);
                self.world_state
                    .set_tile(w, z, x as usize, y_raw as usize, TileCode(TILE_CLEARED));
                TileEventOutcome::ItemBlockTriggered {
                    powerup_oid,
                    powerup_type,
                }
            }
            TILE_COIN_BLOCK | TILE_HIDDEN_COIN_BLOCK => {
                self.world_state
                    .set_tile(w, z, x as usize, y_raw as usize, TileCode(TILE_CLEARED));
                TileEventOutcome::CoinAwarded { awarded_to: sender_id }
            }
            TILE_MULTI_COIN_BLOCK => {
                let remaining = code.extra_data();
                if remaining > 1 {
                    self.world_state.set_tile(
                        w,
                        z,
                        x as usize,
                        y_raw as usize,
                        code.with_extra_data(remaining - 1),
                    );
                    TileEventOutcome::CoinAwarded { awarded_to: sender_id }
                } else if remaining == 1 {
                    self.world_state
                        .set_tile(w, z, x as usize, y_raw as usize, TileCode(TILE_CLEARED));
                    TileEventOutcome::CoinAwarded { awarded_to: sender_id }
                } else {
                    // Already emptied (extraData == 0): clear with no reward.
                    self.world_state
                        .set_tile(w, z, x as usize, y_raw as usize, TileCode(TILE_CLEARED));
                    TileEventOutcome::NoOp
                }
            }
            _ => TileEventOutcome::NoOp,
        }
    }

    /// §4.4 movement: dedup, warp detection, flagpole bonus, lobby-sprite
    /// abuse check. `raw_pkt` is unconditionally stored before any rejection
    /// check runs, mirroring the source's ordering.
    pub fn movement(
        &mut self,
        sender_id: i16,
        new_level: u8,
        new_zone: u8,
        sprite: i8,
        raw_pkt: Vec<u8>,
        flag_reward: i32,
    ) -> Option<WarpOutcome> {
        let (old_zone, px, py, player_level, flag_touched) = {
            let Some(player) = self.player_mut(sender_id) else {
                return None;
            };

            let is_repeat = player.last_update_pkt.as_deref() == Some(raw_pkt.as_slice());
            player.last_update_pkt = Some(raw_pkt);
            if is_repeat {
                return None;
            }

            (
                player.position(),
                player.x,
                player.y,
                player.level,
                player.flag_touched,
            )
        };

        let blocked_lobby_sprite = new_zone == 0 && sprite > 5 && self.is_lobby;

        let flagpole_tile = self
            .world_state
            .get_tile(new_level as usize, new_zone as usize, px as usize, py as usize);
        let crossed_flag = !flag_touched
            && flagpole_tile
                .map(|t| t.id() == TILE_FLAGPOLE && t.extra_data() == 1)
                .unwrap_or(false);

        let Some(player) = self.player_mut(sender_id) else {
            return None;
        };

        if new_level > player_level {
            player.flag_touched = false;
        }
        if crossed_flag {
            player.flag_touched = true;
        }

        let warped = (new_level, new_zone) != old_zone;
        player.level = new_level;
        player.zone = new_zone;

        Some(WarpOutcome {
            old_zone,
            new_zone: (new_level, new_zone),
            warped,
            flag_bonus: crossed_flag.then_some(flag_reward),
            blocked_lobby_sprite,
        })
    }

    /// Client-reported self-death (opcode `0x11`). Applies the self-death
    /// coin penalty and marks the player dead; idempotent. Returns `true`
    /// the first time a given player dies.
    pub fn die(&mut self, player_id: i16) -> bool {
        let Some(player) = self.player_mut(player_id) else {
            return false;
        };
        if player.dead {
            return false;
        }
        player.dead = true;
        if !player.lobbier {
            player.stat_delta.deaths += 1;
            player.stat_delta.coins -= 10;
        }
        true
    }

    /// §4.4 kill claim. The *sender* is the player who died and is
    /// reporting who killed them; the credited player is the one they
    /// named, matching the source system's direction (not the distilled
    /// spec's "attacker reports victim" prose -- see DESIGN.md).
    pub fn kill_claim(&mut self, sender_id: i16, reported_killer_id: i16) -> Option<i16> {
        if sender_id == reported_killer_id {
            return None;
        }
        self.player(reported_killer_id)?;
        Some(reported_killer_id)
    }

    pub fn trust_ping(&mut self, sender_id: i16) -> bool {
        let Some(player) = self.player_mut(sender_id) else {
            return false;
        };
        player.trust_count += 1;
        if player.trust_count > 8 {
            player.blocked = true;
            true
        } else {
            false
        }
    }

    /// §4.3 finish/podium. Returns the 1-based rank on success.
    pub fn finish(&mut self, sender_id: i16) -> Option<u32> {
        let player = self.player_mut(sender_id)?;
        if player.dead || player.win {
            return None;
        }
        player.win = true;
        self.winners += 1;
        Some(self.winners)
    }
}

pub fn podium_coin_reward(rank: u32, rewards: (i32, i32, i32)) -> i32 {
    match rank {
        1 => rewards.0,
        2 => rewards.1,
        3 => rewards.2,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_player(id: i16) -> Player {
        Player::new(id, "P".into(), "".into(), 0, GameMode::Royale, false)
    }

    #[test]
    fn add_player_assigns_increasing_ids() {
        let mut m = Match::new("".into(), false, GameMode::Royale);
        let a = m.add_player(new_player(0));
        let b = m.add_player(new_player(0));
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn remove_last_player_reports_empty() {
        let mut m = Match::new("".into(), false, GameMode::Royale);
        let id = m.add_player(new_player(0));
        let outcome = m.remove_player(id, 0.5);
        assert!(outcome.match_now_empty);
    }

    #[test]
    fn remove_player_decrements_vote_or_starts_not_both() {
        let mut m = Match::new("".into(), false, GameMode::Royale);
        let a = m.add_player(new_player(0));
        let b = m.add_player(new_player(0));
        m.vote_start(a, 0.5);
        let outcome = m.remove_player(a, 0.5);
        assert!(outcome.vote_decremented);
        assert!(!outcome.should_start);
        let _ = b;
    }

    #[test]
    fn double_collect_is_idempotent() {
        let level = LevelData {
            id: "t".into(),
            worlds: vec![crate::domain::level::WorldLevel {
                zones: vec![crate::domain::level::ZoneLevel {
                    layers: vec![],
                    objects: [(5i64, OBJECT_TYPE_COIN)].into_iter().collect(),
                }],
            }],
        };
        let mut m = Match::new("".into(), false, GameMode::Royale);
        m.world_state = WorldState::from_level(&level);
        let p = m.add_player(new_player(0));
        let first = m.object_event(p, 0, 0, 5, 0);
        let second = m.object_event(p, 0, 0, 5, 0);
        assert!(matches!(first, ObjectEventOutcome::CoinCollected { .. }));
        assert!(matches!(second, ObjectEventOutcome::NoOp));
    }

    #[test]
    fn multi_coin_block_exhausts_after_three_hits() {
        let mut m = Match::new("".into(), false, GameMode::Royale);
        m.world_state.zone_height = vec![vec![1]];
        m.world_state.tiles = vec![vec![vec![vec![TileCode::encode(0, TILE_MULTI_COIN_BLOCK, 3)]]]];
        let p = m.add_player(new_player(0));
        for _ in 0..3 {
            let outcome = m.tile_event(p, 0, 0, 0, 0);
            assert!(matches!(outcome, TileEventOutcome::CoinAwarded { .. }));
        }
        let tile = m.world_state.get_tile(0, 0, 0, 0).unwrap();
        assert_eq!(tile.0, TILE_CLEARED);
        let fourth = m.tile_event(p, 0, 0, 0, 0);
        assert!(matches!(fourth, TileEventOutcome::NoOp));
    }

    #[test]
    fn kill_claim_credits_the_reported_player_not_the_sender() {
        let mut m = Match::new("".into(), false, GameMode::Royale);
        let victim_reporter = m.add_player(new_player(0));
        let killer = m.add_player(new_player(0));
        let credited = m.kill_claim(victim_reporter, killer);
        assert_eq!(credited, Some(killer));
    }

    #[test]
    fn self_kill_claim_is_ignored() {
        let mut m = Match::new("".into(), false, GameMode::Royale);
        let p = m.add_player(new_player(0));
        assert_eq!(m.kill_claim(p, p), None);
    }

    #[test]
    fn trust_ping_blocks_after_eight() {
        let mut m = Match::new("".into(), false, GameMode::Royale);
        let p = m.add_player(new_player(0));
        for _ in 0..8 {
            assert!(!m.trust_ping(p));
        }
        assert!(m.trust_ping(p));
    }
}
