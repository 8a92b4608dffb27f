// Connection protocol state machine: one task per socket, advancing
// `Lobby -> InGame` and forwarding dispatched events into whichever
// match's `MatchEvent` channel this connection is currently attached to.
// Grounded on the teacher's `handle_socket`/`run_client_loop` split, with
// `LobbyHandle`'s single `broadcast::Sender<WorldUpdate>` replaced by a
// per-player `OutboundSender` the match engine already owns (see
// `use_cases::types` for why).

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use futures_util::SinkExt;
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{info, info_span, warn};

use crate::domain::errors::AccountError;
use crate::domain::match_state::Player;
use crate::interface_adapters::protocol::{BinaryFrame, GameMessage, LobbyMessage, parse_frame, payload_len};
use crate::interface_adapters::state::{AppState, LOGIN_BLOCK_SECONDS, MAX_LOGIN_TRIES, parse_game_mode};
use crate::interface_adapters::utils::name;
use crate::interface_adapters::utils::rng::rand_id;
use crate::use_cases::account::{
    ChangePasswordUseCase, LoginUseCase, LogoutUseCase, RegisterUseCase, ResumeSessionUseCase, UpdateAccountUseCase,
};
use crate::use_cases::match_engine::flush_stats;
use crate::use_cases::matchmaker::MatchHandle;
use crate::use_cases::protocol as wire;
use crate::use_cases::types::{MatchEvent, OutboundFrame, OutboundReceiver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
    Lobby,
    InGame,
}

/// What the server last advertised to the client; clears once the matching
/// state-advancing message (`l00` or `g00`) arrives. See SPEC_FULL.md §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingStat {
    AwaitingGameReady,
}

const JOIN_DC_SECONDS: u64 = 25;
const LOAD_DC_SECONDS: u64 = 15;
const DEATH_DC_SECONDS: u64 = 60;
const WIN_DC_SECONDS: u64 = 120;
const HURRY_UP_AFTER_DRAIN: Duration = Duration::from_secs(30);
const MAX_BUFFERED_RECORDS: usize = 64;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr.ip()))
}

struct ConnCtx {
    state: Arc<AppState>,
    ip: IpAddr,
    conn_state: ConnState,
    pending_stat: Option<PendingStat>,
    dc_deadline: Option<Instant>,
    hurryup_deadline: Option<Instant>,
    ip_counted: bool,
    // Set once an `llg/lrg/lrc` succeeds.
    account_username: Option<String>,
    account_id: Option<i64>,
    account_is_banned: bool,
    session_token: Option<String>,
    // Present once this connection has joined a match.
    player_id: Option<i16>,
    match_handle: Option<MatchHandle>,
    outbound_rx: Option<OutboundReceiver>,
    binary_buf: Vec<u8>,
    private: bool,
    closed_by_server: bool,
    // Address on the persistent blocklist, or account banned: connection is
    // kept open but silently produces no gameplay (§7 "Abuse").
    blocked: bool,
}

impl ConnCtx {
    fn new(state: Arc<AppState>, ip: IpAddr) -> Self {
        ConnCtx {
            state,
            ip,
            conn_state: ConnState::Lobby,
            pending_stat: None,
            dc_deadline: Some(Instant::now() + Duration::from_secs(JOIN_DC_SECONDS)),
            hurryup_deadline: None,
            ip_counted: false,
            account_username: None,
            account_id: None,
            account_is_banned: false,
            session_token: None,
            player_id: None,
            match_handle: None,
            outbound_rx: None,
            binary_buf: Vec::new(),
            private: false,
            closed_by_server: false,
            blocked: false,
        }
    }

    fn start_dc_timer(&mut self, seconds: u64) {
        self.dc_deadline = Some(Instant::now() + Duration::from_secs(seconds));
    }

    fn cancel_dc_timer(&mut self) {
        self.dc_deadline = None;
    }
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, ip: IpAddr) {
    let conn_id = rand_id();
    let span = info_span!("conn", conn_id, player_id = tracing::field::Empty);
    let _enter = span.enter();

    let mut ctx = ConnCtx::new(state.clone(), ip);
    run_client_loop(&mut socket, &mut ctx).await;
    cleanup(&mut ctx).await;
    info!("connection closed");
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) {
    loop {
        let deadline = match (ctx.dc_deadline, ctx.hurryup_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };
        let sleep_fut = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => tokio::time::sleep(Duration::from_secs(3600)).await,
            }
        };
        tokio::pin!(sleep_fut);

        let outbound_ready = ctx.outbound_rx.is_some();
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(msg)) => {
                        if handle_incoming(socket, ctx, msg).await.is_break() {
                            return;
                        }
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "websocket recv error");
                        return;
                    }
                    None => return,
                }
            }
            frame = recv_outbound(&mut ctx.outbound_rx), if outbound_ready => {
                match frame {
                    Some(OutboundFrame::Text(text)) => {
                        if socket.send(Message::Text(Utf8Bytes::from(text))).await.is_err() {
                            return;
                        }
                    }
                    Some(OutboundFrame::Binary(bytes)) => {
                        if socket.send(Message::Binary(bytes.into())).await.is_err() {
                            return;
                        }
                    }
                    Some(OutboundFrame::Close { reason }) => {
                        ctx.closed_by_server = true;
                        if reason == "trust abuse" {
                            let name = ctx.account_username.as_deref().unwrap_or("guest");
                            ctx.state.blocklist.block(ctx.ip, name, reason);
                        }
                        let _ = send_close(socket, reason).await;
                        return;
                    }
                    None => {
                        // Match engine dropped our outbound channel; the match is gone.
                        return;
                    }
                }
            }
            _ = &mut sleep_fut, if deadline.is_some() => {
                if ctx.dc_deadline.map(|d| Instant::now() >= d).unwrap_or(false) {
                    warn!("disconnect watchdog expired");
                    let _ = send_close(socket, "timed out").await;
                    return;
                }
                if ctx.hurryup_deadline.map(|d| Instant::now() >= d).unwrap_or(false) {
                    ctx.hurryup_deadline = None;
                    send_json(socket, &wire::hurry_up(0)).await;
                }
            }
        }
    }
}

async fn recv_outbound(rx: &mut Option<OutboundReceiver>) -> Option<OutboundFrame> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

enum Flow {
    Continue,
    Break,
}
impl Flow {
    fn is_break(&self) -> bool {
        matches!(self, Flow::Break)
    }
}

async fn handle_incoming(socket: &mut WebSocket, ctx: &mut ConnCtx, msg: Message) -> Flow {
    match msg {
        Message::Text(text) => handle_text(socket, ctx, text.as_str()).await,
        Message::Binary(bytes) => handle_binary(socket, ctx, bytes.as_ref()).await,
        Message::Ping(_) | Message::Pong(_) => Flow::Continue,
        Message::Close(_) => Flow::Break,
    }
}

async fn handle_text(socket: &mut WebSocket, ctx: &mut ConnCtx, text: &str) -> Flow {
    match ctx.conn_state {
        ConnState::Lobby => handle_lobby_message(socket, ctx, text).await,
        ConnState::InGame => handle_game_message(socket, ctx, text).await,
    }
}

async fn handle_lobby_message(socket: &mut WebSocket, ctx: &mut ConnCtx, text: &str) -> Flow {
    let msg: LobbyMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(err) => {
            warn!(error = %err, "invalid lobby message");
            let _ = send_close(socket, "protocol violation").await;
            return Flow::Break;
        }
    };

    match msg {
        LobbyMessage::InputReady { name: raw_name, team, private, skin, gm } => {
            if ctx.ip_counted_would_exceed_cap().await {
                let _ = send_close(socket, "too many connections from this address").await;
                return Flow::Break;
            }
            ctx.note_connection().await;
            ctx.cancel_dc_timer();

            if ctx.state.blocklist.contains(ctx.ip) || ctx.account_is_banned {
                // Silently drop into the in-game state without joining a
                // match -- matches the source's `setState("g"); return`.
                ctx.blocked = true;
                ctx.conn_state = ConnState::InGame;
                return Flow::Continue;
            }

            let display_name = {
                let sanitized = name::sanitize(&raw_name);
                if sanitized.is_empty() { ctx.state.default_name.clone() } else { sanitized }
            };
            let team = if team.trim().is_empty() { ctx.state.default_team.clone() } else { team };
            ctx.private = private;

            let game_mode = parse_game_mode(&gm);
            let handle = ctx.state.matches.get_match(&team_room(private, &team), private, game_mode).await;

            let mut player = Player::new(0, display_name, team, skin, game_mode, false);
            if let Some(id) = ctx.account_id {
                player.account_id = Some(id);
            }

            let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
            let (reply_tx, reply_rx) = oneshot::channel();
            if handle
                .input_tx
                .send(MatchEvent::Join { player, outbound: outbound_tx, reply: reply_tx })
                .await
                .is_err()
            {
                let _ = send_close(socket, "match unavailable").await;
                return Flow::Break;
            }
            let player_id = match reply_rx.await {
                Ok(id) if id >= 0 => id,
                _ => {
                    let _ = send_close(socket, "match is closed").await;
                    return Flow::Break;
                }
            };

            tracing::Span::current().record("player_id", player_id);
            ctx.player_id = Some(player_id);
            ctx.match_handle = Some(handle);
            ctx.outbound_rx = Some(outbound_rx);
            ctx.conn_state = ConnState::InGame;
            ctx.pending_stat = Some(PendingStat::AwaitingGameReady);

            send_binary(socket, &wire::assign_pid(player_id, skin as i16, false)).await;
            Flow::Continue
        }
        LobbyMessage::Register { username, password } => {
            let use_case = RegisterUseCase { store: ctx.state.accounts.clone() };
            match use_case.execute(&username, &password).await {
                Ok((summary, priv_summary, token)) => {
                    ctx.state.authenticated_usernames.write().await.insert(summary.username.clone());
                    ctx.account_username = Some(summary.username.clone());
                    ctx.account_id = Some(priv_summary.id);
                    ctx.account_is_banned = priv_summary.is_banned;
                    ctx.session_token = Some(token.clone());
                    send_json(socket, &wire::login_result("lrg", true, Some(serde_json::to_value(&summary).unwrap_or(Value::Null)), None)).await;
                    send_json(socket, &json!({ "type": "l01", "token": token })).await;
                }
                Err(err) => send_account_error(socket, "lrg", err).await,
            }
            Flow::Continue
        }
        LobbyMessage::Login { username, password } => {
            if let Some(blocked_until) = ctx.state.login_blocked_until.read().await.get(&ctx.ip).copied() {
                if Instant::now() < blocked_until {
                    send_json(
                        socket,
                        &wire::login_result("llg", false, None, Some("max login tries reached.\ntry again in one minute.")),
                    )
                    .await;
                    return Flow::Continue;
                }
            }
            ctx.state.login_blocked_until.write().await.remove(&ctx.ip);

            if !ctx.state.authenticated_usernames.write().await.insert(username.clone()) {
                send_json(socket, &wire::login_result("llg", false, None, Some("already logged in"))).await;
                return Flow::Continue;
            }
            let use_case = LoginUseCase { store: ctx.state.accounts.clone() };
            match use_case.execute(&username, &password).await {
                Ok((summary, priv_summary, token)) => {
                    ctx.state.login_attempts.write().await.remove(&ctx.ip);
                    ctx.account_username = Some(username);
                    ctx.account_id = Some(priv_summary.id);
                    ctx.account_is_banned = priv_summary.is_banned;
                    ctx.session_token = Some(token.clone());
                    send_json(socket, &wire::login_result("llg", true, Some(serde_json::to_value(&summary).unwrap_or(Value::Null)), None)).await;
                    send_json(socket, &json!({ "type": "l01", "token": token })).await;
                }
                Err(err) => {
                    ctx.state.authenticated_usernames.write().await.remove(&username);
                    record_failed_login(&ctx.state, ctx.ip).await;
                    send_account_error(socket, "llg", err).await;
                }
            }
            Flow::Continue
        }
        LobbyMessage::ResumeSession { token } => {
            let use_case = ResumeSessionUseCase { store: ctx.state.accounts.clone() };
            match use_case.execute(&token).await {
                Ok((summary, priv_summary)) => {
                    ctx.state.authenticated_usernames.write().await.insert(summary.username.clone());
                    ctx.account_username = Some(summary.username.clone());
                    ctx.account_id = Some(priv_summary.id);
                    ctx.account_is_banned = priv_summary.is_banned;
                    ctx.session_token = Some(token.clone());
                    send_json(socket, &wire::login_result("lrc", true, Some(serde_json::to_value(&summary).unwrap_or(Value::Null)), None)).await;
                }
                Err(err) => send_account_error(socket, "lrc", err).await,
            }
            Flow::Continue
        }
        LobbyMessage::Logout => {
            if let Some(username) = ctx.account_username.take() {
                ctx.state.authenticated_usernames.write().await.remove(&username);
            }
            ctx.account_id = None;
            ctx.account_is_banned = false;
            if let Some(token) = ctx.session_token.take() {
                LogoutUseCase { store: ctx.state.accounts.clone() }.execute(&token).await;
            }
            send_json(socket, &wire::login_result("llo", true, None, None)).await;
            Flow::Continue
        }
        LobbyMessage::ResetPassword { username: _ } => {
            // Password reset delivery (email/SMS) is an external collaborator
            // out of scope here; acknowledge without sending anything.
            send_json(socket, &wire::login_result("lrs", true, None, None)).await;
            Flow::Continue
        }
        LobbyMessage::ProfileUpdate { nickname, squad, skin } => {
            let Some(username) = ctx.account_username.clone() else {
                send_json(socket, &wire::login_result("lpr", false, None, Some("not logged in"))).await;
                return Flow::Continue;
            };
            let nickname = nickname.map(|n| name::sanitize(&n));
            let use_case = UpdateAccountUseCase { store: ctx.state.accounts.clone(), profanity_filter: ctx.state.profanity.clone() };
            match use_case.execute(&username, nickname, squad, skin).await {
                Ok(()) => send_json(socket, &wire::login_result("lpr", true, None, None)).await,
                Err(err) => send_account_error(socket, "lpr", err).await,
            }
            Flow::Continue
        }
        LobbyMessage::ChangePassword { old_password, new_password } => {
            let Some(username) = ctx.account_username.clone() else {
                send_json(socket, &wire::login_result("lpc", false, None, Some("not logged in"))).await;
                return Flow::Continue;
            };
            let use_case = ChangePasswordUseCase { store: ctx.state.accounts.clone() };
            match use_case.execute(&username, &old_password, &new_password).await {
                Ok(()) => send_json(socket, &wire::login_result("lpc", true, None, None)).await,
                Err(err) => send_account_error(socket, "lpc", err).await,
            }
            Flow::Continue
        }
    }
}

async fn handle_game_message(socket: &mut WebSocket, ctx: &mut ConnCtx, text: &str) -> Flow {
    if ctx.blocked {
        return Flow::Continue;
    }
    let Some(player_id) = ctx.player_id else {
        let _ = send_close(socket, "not joined").await;
        return Flow::Break;
    };
    let Some(handle) = ctx.match_handle.clone() else {
        let _ = send_close(socket, "not joined").await;
        return Flow::Break;
    };

    let msg: GameMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(err) => {
            warn!(error = %err, "invalid game message");
            let _ = send_close(socket, "protocol violation").await;
            return Flow::Break;
        }
    };

    // `g00` is the state-advancing message and consumes the latch itself;
    // every other message only checks that nothing is still pending.
    if !matches!(msg, GameMessage::IngameReady) && ctx.pending_stat.is_some() {
        let _ = send_close(socket, "unexpected message for current state").await;
        return Flow::Break;
    }

    let event = match msg {
        GameMessage::IngameReady => {
            ctx.pending_stat = None;
            ctx.start_dc_timer(LOAD_DC_SECONDS);
            None
        }
        GameMessage::Loaded => {
            ctx.cancel_dc_timer();
            Some(MatchEvent::PlayerReady { player_id })
        }
        GameMessage::VoteStart => Some(MatchEvent::VoteStart { player_id }),
        GameMessage::ForceStart => Some(MatchEvent::ForceStart { player_id }),
        GameMessage::SelectLevel { level_id, custom } => match (level_id, custom) {
            (Some(id), _) => Some(MatchEvent::SelectLevel { player_id, level_id: id }),
            (None, Some(raw)) => Some(MatchEvent::SelectCustomLevel { player_id, raw }),
            (None, None) => None,
        },
        GameMessage::AdminBan { target, reason } => {
            Some(MatchEvent::AdminBan { requester_id: player_id, target_id: target, reason })
        }
        GameMessage::AdminRename { target, name } => {
            Some(MatchEvent::AdminRename { requester_id: player_id, target_id: target, name })
        }
        GameMessage::AdminSquad { target, squad } => {
            Some(MatchEvent::AdminSquad { requester_id: player_id, target_id: target, squad })
        }
    };

    if let Some(event) = event {
        if handle.input_tx.send(event).await.is_err() {
            return Flow::Break;
        }
    }
    Flow::Continue
}

async fn handle_binary(socket: &mut WebSocket, ctx: &mut ConnCtx, bytes: &[u8]) -> Flow {
    if ctx.blocked {
        return Flow::Continue;
    }
    let Some(handle) = ctx.match_handle.clone() else {
        let _ = send_close(socket, "not joined").await;
        return Flow::Break;
    };
    let Some(player_id) = ctx.player_id else {
        let _ = send_close(socket, "not joined").await;
        return Flow::Break;
    };

    // Binary traffic is rejected only during the active countdown: after
    // `start()` and before `closed := true`. See SPEC_FULL.md §6.
    let playing = handle.playing.load(std::sync::atomic::Ordering::SeqCst);
    let closed = handle.closed.load(std::sync::atomic::Ordering::SeqCst);
    if playing && !closed {
        ctx.binary_buf.clear();
        return Flow::Continue;
    }

    ctx.binary_buf.extend_from_slice(bytes);
    let mut records = 0usize;
    loop {
        let Some(&opcode) = ctx.binary_buf.first() else { break };
        let Some(len) = payload_len(opcode) else {
            warn!(opcode, "unknown binary opcode; clearing receive buffer");
            ctx.binary_buf.clear();
            return Flow::Continue;
        };
        if ctx.binary_buf.len() < 1 + len {
            break;
        }
        let payload: Vec<u8> = ctx.binary_buf[1..1 + len].to_vec();
        let raw_record: Vec<u8> = ctx.binary_buf[0..1 + len].to_vec();
        ctx.binary_buf.drain(0..1 + len);

        let Some(frame) = parse_frame(opcode, &payload) else {
            warn!(opcode, "malformed binary payload; clearing receive buffer");
            ctx.binary_buf.clear();
            return Flow::Continue;
        };

        let event = match frame {
            BinaryFrame::SelfDeath => {
                ctx.start_dc_timer(DEATH_DC_SECONDS);
                Some(MatchEvent::SelfDeath { player_id })
            }
            BinaryFrame::Movement { level, zone, x, y, sprite, reverse } => Some(MatchEvent::Movement {
                player_id,
                level,
                zone,
                x,
                y,
                sprite,
                reverse,
                raw_pkt: raw_record,
            }),
            BinaryFrame::ObjectEvent { .. } => None,
            BinaryFrame::KillClaim { reported_killer_id } => {
                Some(MatchEvent::KillClaim { player_id, reported_killer_id })
            }
            BinaryFrame::Finish => {
                ctx.start_dc_timer(WIN_DC_SECONDS);
                Some(MatchEvent::Finish { player_id })
            }
            BinaryFrame::TrustPing => Some(MatchEvent::TrustPing { player_id }),
            BinaryFrame::WorldObjectEvent { level, zone, oid, ty } => {
                Some(MatchEvent::ObjectEvent { player_id, level, zone, oid, ty })
            }
            BinaryFrame::TileEvent { level, zone, x, y, ty } => {
                Some(MatchEvent::TileEvent { player_id, level, zone, x, y_raw: y, ty })
            }
        };

        if let Some(event) = event {
            if handle.input_tx.send(event).await.is_err() {
                return Flow::Break;
            }
        }

        records += 1;
        if records > MAX_BUFFERED_RECORDS {
            break;
        }
    }
    Flow::Continue
}

impl ConnCtx {
    async fn ip_counted_would_exceed_cap(&self) -> bool {
        if self.ip.is_loopback() {
            return false;
        }
        let counts = self.state.connections_by_ip.read().await;
        counts.get(&self.ip).copied().unwrap_or(0) >= self.state.max_simul_ip
    }

    async fn note_connection(&mut self) {
        if self.ip_counted || self.ip.is_loopback() {
            return;
        }
        let mut counts = self.state.connections_by_ip.write().await;
        *counts.entry(self.ip).or_insert(0) += 1;
        self.ip_counted = true;
    }
}

/// Counts a failed login for `ip`; on the `MAX_LOGIN_TRIES`th failure,
/// throttles the address for `LOGIN_BLOCK_SECONDS` and resets the counter
/// (matching the source's `maxLoginTries`/`loginBlocked` pair).
async fn record_failed_login(state: &Arc<AppState>, ip: IpAddr) {
    let mut attempts = state.login_attempts.write().await;
    let count = attempts.entry(ip).or_insert(0);
    *count += 1;
    if *count >= MAX_LOGIN_TRIES {
        attempts.remove(&ip);
        drop(attempts);
        state
            .login_blocked_until
            .write()
            .await
            .insert(ip, Instant::now() + Duration::from_secs(LOGIN_BLOCK_SECONDS));
    }
}

fn team_room(private: bool, team: &str) -> String {
    if private { team.to_string() } else { String::new() }
}

async fn send_json(socket: &mut WebSocket, value: &Value) {
    let text = wire::to_text(value);
    let _ = socket.send(Message::Text(Utf8Bytes::from(text))).await;
}

async fn send_binary(socket: &mut WebSocket, bytes: &[u8]) {
    let _ = socket.send(Message::Binary(bytes.to_vec().into())).await;
}

async fn send_close(socket: &mut WebSocket, reason: &'static str) -> Result<(), axum::Error> {
    socket
        .send(Message::Close(Some(CloseFrame { code: close_code::POLICY, reason: reason.into() })))
        .await?;
    socket.close().await
}

async fn send_account_error(socket: &mut WebSocket, kind: &str, err: AccountError) {
    send_json(socket, &wire::login_result(kind, false, None, Some(&err.to_string()))).await;
}

async fn cleanup(ctx: &mut ConnCtx) {
    if let (Some(player_id), Some(handle)) = (ctx.player_id, ctx.match_handle.clone()) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if handle.input_tx.send(MatchEvent::Leave { player_id, reply: reply_tx }).await.is_ok() {
            if let Ok(delta) = reply_rx.await {
                if let Err(err) = flush_stats(ctx.state.accounts.as_ref(), ctx.account_id, ctx.private, delta).await {
                    warn!(error = %err, "failed to flush account stats on disconnect");
                }
            }
        }
    }

    if ctx.ip_counted {
        let mut counts = ctx.state.connections_by_ip.write().await;
        if let Some(count) = counts.get_mut(&ctx.ip) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(&ctx.ip);
            }
        }
    }

    if let Some(username) = ctx.account_username.take() {
        ctx.state.authenticated_usernames.write().await.remove(&username);
    }
}
