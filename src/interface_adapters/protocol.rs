// Inbound (client -> server) wire protocol: JSON control messages and the
// binary opcode framing table. Outbound message construction lives in
// `use_cases::protocol` (see that module's header for why).

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum LobbyMessage {
    #[serde(rename = "l00")]
    InputReady {
        name: String,
        team: String,
        private: bool,
        skin: i32,
        gm: String,
    },
    #[serde(rename = "llg")]
    Login { username: String, password: String },
    #[serde(rename = "llo")]
    Logout,
    #[serde(rename = "lrg")]
    Register { username: String, password: String },
    #[serde(rename = "lrc")]
    ResumeSession { token: String },
    #[serde(rename = "lrs")]
    ResetPassword { username: String },
    #[serde(rename = "lpr")]
    ProfileUpdate {
        nickname: Option<String>,
        squad: Option<String>,
        skin: Option<i32>,
    },
    #[serde(rename = "lpc")]
    ChangePassword { old_password: String, new_password: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum GameMessage {
    #[serde(rename = "g00")]
    IngameReady,
    #[serde(rename = "g03")]
    Loaded,
    #[serde(rename = "g50")]
    VoteStart,
    #[serde(rename = "g51")]
    ForceStart,
    #[serde(rename = "gsl")]
    SelectLevel {
        #[serde(default)]
        level_id: Option<String>,
        #[serde(default)]
        custom: Option<Value>,
    },
    #[serde(rename = "gbn")]
    AdminBan { target: i16, reason: String },
    #[serde(rename = "gnm")]
    AdminRename { target: i16, name: String },
    #[serde(rename = "gsq")]
    AdminSquad { target: i16, squad: String },
}

// --- Binary opcode framing ---

/// Fixed payload length (bytes after the opcode byte), per the source's
/// `pktLenDict`.
pub fn payload_len(opcode: u8) -> Option<usize> {
    match opcode {
        0x11 => Some(0),
        0x12 => Some(11),
        0x13 => Some(1),
        0x17 => Some(2),
        0x18 => Some(2),
        0x19 => Some(0),
        0x20 => Some(7),
        0x30 => Some(6),
        _ => None,
    }
}

#[derive(Debug)]
pub enum BinaryFrame {
    SelfDeath,
    Movement { level: u8, zone: u8, x: f32, y: f32, sprite: i8, reverse: bool },
    ObjectEvent { ty: u8 },
    KillClaim { reported_killer_id: i16 },
    Finish,
    TrustPing,
    WorldObjectEvent { level: u8, zone: u8, oid: i64, ty: u8 },
    TileEvent { level: u8, zone: u8, x: u16, y: u16, ty: u8 },
}

/// Parses one opcode-prefixed record. Returns `None` on an unrecognized
/// opcode or a too-short payload; the caller clears the whole receive
/// buffer in that case (§4.1).
pub fn parse_frame(opcode: u8, payload: &[u8]) -> Option<BinaryFrame> {
    match opcode {
        0x11 => Some(BinaryFrame::SelfDeath),
        0x12 if payload.len() >= 11 => Some(BinaryFrame::Movement {
            level: payload[0],
            zone: payload[1],
            x: f32::from_le_bytes(payload[2..6].try_into().ok()?),
            y: f32::from_le_bytes(payload[6..10].try_into().ok()?),
            sprite: payload[10] as i8,
            reverse: payload.get(11).map(|b| *b != 0).unwrap_or(false),
        }),
        0x13 if !payload.is_empty() => Some(BinaryFrame::ObjectEvent { ty: payload[0] }),
        0x17 if payload.len() >= 2 => Some(BinaryFrame::KillClaim {
            reported_killer_id: i16::from_le_bytes(payload[0..2].try_into().ok()?),
        }),
        0x18 => Some(BinaryFrame::Finish),
        0x19 => Some(BinaryFrame::TrustPing),
        0x20 if payload.len() >= 7 => Some(BinaryFrame::WorldObjectEvent {
            level: payload[0],
            zone: payload[1],
            oid: i32::from_le_bytes(payload[2..6].try_into().ok()?) as i64,
            ty: payload[6],
        }),
        0x30 if payload.len() >= 6 => Some(BinaryFrame::TileEvent {
            level: payload[0],
            zone: payload[1],
            x: u16::from_le_bytes(payload[2..4].try_into().ok()?),
            y: u16::from_le_bytes(payload[4..6].try_into().ok()?),
            ty: payload[5],
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_opcode_is_rejected() {
        assert!(parse_frame(0xff, &[]).is_none());
    }

    #[test]
    fn movement_frame_round_trips() {
        let mut payload = Vec::new();
        payload.push(3u8);
        payload.push(1u8);
        payload.extend_from_slice(&12.5f32.to_le_bytes());
        payload.extend_from_slice(&7.25f32.to_le_bytes());
        payload.push(2i8 as u8);
        payload.push(1u8);
        let frame = parse_frame(0x12, &payload).unwrap();
        assert!(matches!(
            frame,
            BinaryFrame::Movement { level: 3, zone: 1, sprite: 2, reverse: true, .. }
        ));
    }
}
