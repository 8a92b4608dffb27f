// Outbound wire messages the match engine decides to send. JSON messages
// are built here (not in interface_adapters) because they are a direct
// product of business-logic decisions, not of adapting transport bytes;
// `interface_adapters::protocol` owns the inbound (client -> server)
// parsing side of the same wire contract.

use serde::Serialize;
use serde_json::{Value, json};

/// Wraps more than one JSON message for a single send, matching the
/// source's `{type:"s01", packets:[...]}` envelope.
pub fn envelope(packets: Vec<Value>) -> Value {
    if packets.len() == 1 {
        packets.into_iter().next().unwrap()
    } else {
        json!({ "type": "s01", "packets": packets })
    }
}

pub fn to_text(value: &Value) -> String {
    // Messages are built from known-serializable values; a failure here
    // indicates a bug in message construction, not a runtime condition.
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

#[derive(Serialize)]
struct PlayerListEntry {
    id: i16,
    name: String,
    team: String,
    skin: i32,
    #[serde(rename = "isDev")]
    is_dev: bool,
    dead: bool,
    win: bool,
}

pub fn player_list(entries: Vec<(i16, String, String, i32, bool, bool, bool)>) -> Value {
    let entries: Vec<PlayerListEntry> = entries
        .into_iter()
        .map(|(id, name, team, skin, is_dev, dead, win)| PlayerListEntry {
            id,
            name,
            team,
            skin,
            is_dev,
            dead,
            win,
        })
        .collect();
    json!({ "type": "g12", "players": entries })
}

pub fn start_timer(ticks: u32) -> Value {
    json!({ "type": "g13", "startTimer": ticks })
}

pub fn tick(ticks: u64, votes: u32, min_players: usize, max_players: usize, vote_rate_to_start: f64) -> Value {
    json!({
        "type": "gtk",
        "ticks": ticks,
        "votes": votes,
        "minPlayers": min_players,
        "maxPlayers": max_players,
        "voteRateToStart": vote_rate_to_start,
    })
}

pub fn hurry_up(seconds_remaining: u64) -> Value {
    json!({ "type": "ghu", "secondsRemaining": seconds_remaining })
}

pub fn level_select(name: &str, status: bool, message: &str) -> Value {
    json!({ "type": "gsl", "name": name, "status": status, "message": message })
}

pub fn level_list(levels: Vec<String>) -> Value {
    json!({ "type": "gll", "levels": levels })
}

pub fn rename_broadcast(player_id: i16, name: &str) -> Value {
    json!({ "type": "gnm", "id": player_id, "name": name })
}

pub fn world_load(world: &str, level_data: Option<&Value>) -> Value {
    let mut msg = json!({ "type": "g01", "game": world });
    if let Some(data) = level_data {
        msg["levelData"] = data.clone();
    }
    msg
}

pub fn exception(message: &str) -> Value {
    json!({ "type": "x00", "message": message })
}

pub fn login_result(kind: &str, status: bool, payload: Option<Value>, msg: Option<&str>) -> Value {
    let mut out = json!({ "type": kind, "status": status });
    if let Some(p) = payload {
        if let Value::Object(map) = p {
            if let Value::Object(out_map) = &mut out {
                out_map.extend(map);
            }
        }
    }
    if let Some(m) = msg {
        out["msg"] = json!(m);
    }
    out
}

// --- Binary opcodes (little-endian, opcode byte then fixed payload) ---

pub const OP_ASSIGN_PID: u8 = 0x02;
pub const OP_CREATE_PLAYER_OBJECT: u8 = 0x10;
pub const OP_KILL_PLAYER_OBJECT: u8 = 0x11;
pub const OP_UPDATE_PLAYER_OBJECT: u8 = 0x12;
pub const OP_PLAYER_OBJECT_EVENT: u8 = 0x13;
pub const OP_KILL_CLAIM: u8 = 0x17;
pub const OP_RESULT: u8 = 0x18;
pub const OP_TRUST_PING: u8 = 0x19;
pub const OP_OBJECT_EVENT: u8 = 0x20;
pub const OP_COIN_PICKUP_ACK: u8 = 0x21;
pub const OP_LEADERBOARD_COINS_DELTA: u8 = 0x22;
pub const OP_TILE_EVENT: u8 = 0x30;

pub fn assign_pid(pid: i16, skin: i16, is_dev: bool) -> Vec<u8> {
    let mut buf = vec![OP_ASSIGN_PID];
    buf.extend_from_slice(&pid.to_le_bytes());
    buf.extend_from_slice(&skin.to_le_bytes());
    buf.push(is_dev as u8);
    buf
}

pub fn create_player_object(level: u8, zone: u8, x: u16, y: u16, skin: i16, is_dev: bool) -> Vec<u8> {
    let mut buf = vec![OP_CREATE_PLAYER_OBJECT, level, zone];
    buf.extend_from_slice(&x.to_le_bytes());
    buf.extend_from_slice(&y.to_le_bytes());
    buf.extend_from_slice(&skin.to_le_bytes());
    buf.push(is_dev as u8);
    buf
}

pub fn kill_player_object(pid: i16) -> Vec<u8> {
    let mut buf = vec![OP_KILL_PLAYER_OBJECT];
    buf.extend_from_slice(&pid.to_le_bytes());
    buf
}

/// Prefixes the sender's player id, matching the source's fan-out of a
/// raw inbound frame with the originating id prepended.
pub fn with_sender_prefix(opcode: u8, sender_id: i16, rest: &[u8]) -> Vec<u8> {
    let mut buf = vec![opcode];
    buf.extend_from_slice(&sender_id.to_le_bytes());
    buf.extend_from_slice(rest);
    buf
}

pub fn object_event(level: u8, zone: u8, oid: i64, ty: u8) -> Vec<u8> {
    let mut buf = vec![OP_OBJECT_EVENT, level, zone];
    buf.extend_from_slice(&(oid as i32).to_le_bytes());
    buf.push(ty);
    buf
}

pub fn tile_event(level: u8, zone: u8, x: u16, y: u16, ty: u8) -> Vec<u8> {
    let mut buf = vec![OP_TILE_EVENT, level, zone];
    buf.extend_from_slice(&x.to_le_bytes());
    buf.extend_from_slice(&y.to_le_bytes());
    buf.push(ty);
    buf
}

pub fn result(pos: u8) -> Vec<u8> {
    vec![OP_RESULT, pos, 0]
}

pub fn coin_pickup_ack() -> Vec<u8> {
    vec![OP_COIN_PICKUP_ACK, 0]
}

pub fn leaderboard_coins_delta(coins: i32) -> Vec<u8> {
    let mut buf = vec![OP_LEADERBOARD_COINS_DELTA];
    buf.extend_from_slice(&coins.to_le_bytes());
    buf
}
