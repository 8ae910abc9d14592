// author: kodeholic (powered by Claude)
// 시그널링 릴레이 — 메시지 단위 무상태 라우팅 레이어
//
// 연결당 수명주기:
//   접속    → ParticipantHub 등록 + ready{participant} 발급
//   수신    → ClientEvent 파싱 후 핸들러 dispatch (연결당 도착 순서 보장)
//   종료    → leave-channel과 동일한 정리 + 등록 해제
//
// signal 페이로드는 여기서 절대 열어보지 않는다 — target에게 그대로 전달.
// target 부재 시 조용히 드랍 (협상 타임아웃으로만 관측됨).

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, trace, warn};

use crate::config;
use crate::core::{ChannelRegistry, ParticipantHub};
use crate::error::CerebroError;
use crate::protocol::event::{ClientEvent, ServerEvent, SourceDescriptor};
use crate::utils::{current_timestamp, random_id};

// ----------------------------------------------------------------------------
// [공유 상태]
// ----------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub roster: Arc<ParticipantHub>,
    pub registry: Arc<ChannelRegistry>,
}

// ----------------------------------------------------------------------------
// [WS 진입점]
// ----------------------------------------------------------------------------

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

// ----------------------------------------------------------------------------
// [핵심] 개별 participant 연결의 생명주기
// ----------------------------------------------------------------------------

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (egress_tx, mut egress_rx) = mpsc::channel::<String>(config::EGRESS_QUEUE_SIZE);

    // id 발급 — 연결 수명과 함께하는 일회성 신원
    let (participant_id, participant) = state.roster.register(egress_tx.clone());
    trace!("connected: {}", participant_id);

    let ready = ServerEvent::Ready { participant: participant_id.clone() }.to_json();
    if ws_tx.send(Message::Text(ready.into())).await.is_err() {
        state.roster.unregister(&participant_id);
        return;
    }

    // [rx_loop] egress_rx → WS 송신
    let rx_loop = tokio::spawn(async move {
        while let Some(json) = egress_rx.recv().await {
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // [tx_loop] WS 수신 → 핸들러 dispatch
    while let Some(msg) = ws_rx.next().await {
        let text = match msg {
            Ok(frame) => {
                // 프레임 종류 불문 수신 자체가 생존 신호 — last_seen 갱신
                // (ping만 보내는 수신 전용 클라이언트도 reaper를 피해야 한다)
                participant.touch();
                match frame {
                    Message::Text(t) => t,
                    Message::Close(_) => break,
                    _ => continue,
                }
            }
            Err(e) => {
                warn!("WS 에러: {}", e);
                break;
            }
        };

        let event: ClientEvent = match serde_json::from_str(&text) {
            Ok(e) => e,
            Err(e) => {
                warn!("잘못된 이벤트 포맷 ({}): {}", participant_id, e);
                let err = if e.to_string().contains("unknown variant") {
                    CerebroError::UnknownEvent(e.to_string())
                } else {
                    CerebroError::InvalidPayload(e.to_string())
                };
                let _ = egress_tx.send(error_event(err)).await;
                continue;
            }
        };

        let result = match event {
            ClientEvent::JoinChannel { channel_key } => {
                handle_join(&egress_tx, &participant_id, &state, channel_key).await
            }
            ClientEvent::LeaveChannel => {
                broadcast_leave(&state.roster, &state.registry, &participant_id).await;
                Ok(())
            }
            ClientEvent::ScanChannels => handle_scan(&egress_tx, &state).await,
            ClientEvent::Signal { target, payload } => {
                handle_signal(&participant_id, &state, target, payload).await
            }
            ClientEvent::VoiceStatus { transmitting } => {
                handle_voice_status(&participant_id, &state, transmitting).await
            }
            ClientEvent::BroadcastSource { descriptor } => {
                handle_broadcast_source(&participant_id, &state, descriptor).await
            }
            ClientEvent::Message { text } => {
                handle_message(&egress_tx, &participant_id, &state, text).await
            }
        };

        if let Err(e) = result {
            error!("핸들러 에러 ({}): {}", participant_id, e);
        }
    }

    // 전송 레벨 종료 == leave-channel과 동일한 효과
    trace!("disconnected: {}", participant_id);
    broadcast_leave(&state.roster, &state.registry, &participant_id).await;
    state.roster.unregister(&participant_id);
    rx_loop.abort();
}

// ----------------------------------------------------------------------------
// [이벤트 핸들러들]
// ----------------------------------------------------------------------------

async fn handle_join(
    tx: &mpsc::Sender<String>,
    participant_id: &str,
    state: &AppState,
    channel_key: String,
) -> Result<(), CerebroError> {
    trace!("join-channel - {} -> {}", participant_id, channel_key);

    // 기존 소속이 있으면 Registry가 묵시적으로 처리 (프레즌스 에러는 표면화하지 않음)
    let info = state.registry.join(participant_id, &channel_key);
    let members = state.registry.members_of(&channel_key);

    // 1. 본인에게 joined
    send(tx, ServerEvent::Joined {
        channel_key: info.channel_key,
        member_count: info.member_count,
    })
    .await?;

    // 2. 기존 멤버들에게 participant-joined (본인 제외)
    let joined_json =
        ServerEvent::ParticipantJoined { participant: participant_id.to_string() }.to_json();
    state.roster.broadcast_to(&members, &joined_json, Some(participant_id)).await;

    // 3. 본인 포함 전원에게 channel-update
    let update_json = ServerEvent::ChannelUpdate { member_count: info.member_count }.to_json();
    state.roster.broadcast_to(&members, &update_json, None).await;

    Ok(())
}

async fn handle_scan(tx: &mpsc::Sender<String>, state: &AppState) -> Result<(), CerebroError> {
    trace!("scan-channels 요청");
    // 요청/응답 — 요청자에게만 내려간다
    send(tx, ServerEvent::ScanResults { channels: state.registry.list_active() }).await
}

async fn handle_signal(
    participant_id: &str,
    state: &AppState,
    target: String,
    payload: serde_json::Value,
) -> Result<(), CerebroError> {
    let forwarded = ServerEvent::Signal {
        sender: participant_id.to_string(),
        payload,
    }
    .to_json();

    // 대상 부재 시 조용히 드랍 — 발신자에게 에러를 돌려주지 않는다
    if !state.roster.send_to(&target, &forwarded).await {
        trace!("signal dropped: {} -> {} (target not connected)", participant_id, target);
    }
    Ok(())
}

async fn handle_voice_status(
    participant_id: &str,
    state: &AppState,
    transmitting: bool,
) -> Result<(), CerebroError> {
    let channel_key = match state.registry.channel_of(participant_id) {
        Some(key) => key,
        None => return Ok(()), // 채널 밖 voice-status는 무시
    };

    state.registry.touch(&channel_key);

    let members = state.registry.members_of(&channel_key);
    let status_json = ServerEvent::VoiceStatus {
        participant: participant_id.to_string(),
        transmitting,
    }
    .to_json();
    state.roster.broadcast_to(&members, &status_json, Some(participant_id)).await;
    Ok(())
}

async fn handle_broadcast_source(
    participant_id: &str,
    state: &AppState,
    descriptor: Option<SourceDescriptor>,
) -> Result<(), CerebroError> {
    let channel_key = match state.registry.channel_of(participant_id) {
        Some(key) => key,
        None => return Ok(()),
    };

    // best-effort 미러링 — Registry에는 저장하지 않는다 (늦게 합류한 쪽은 못 받음)
    let members = state.registry.members_of(&channel_key);
    let update_json = ServerEvent::SourceUpdate { descriptor }.to_json();
    state.roster.broadcast_to(&members, &update_json, Some(participant_id)).await;
    Ok(())
}

async fn handle_message(
    tx: &mpsc::Sender<String>,
    participant_id: &str,
    state: &AppState,
    text: String,
) -> Result<(), CerebroError> {
    if text.trim().is_empty() {
        return send_raw(tx, error_event(CerebroError::EmptyMessage)).await;
    }
    if text.len() > config::MAX_MESSAGE_LENGTH {
        return send_raw(tx, error_event(CerebroError::MessageTooLong(text.len()))).await;
    }

    let channel_key = match state.registry.channel_of(participant_id) {
        Some(key) => key,
        None => return send_raw(tx, error_event(CerebroError::NotInChannel)).await,
    };

    // id/timestamp는 릴레이가 생성 — 클라이언트 시계 편차/위조 차단
    let members = state.registry.members_of(&channel_key);
    let chat_json = ServerEvent::ChatMessage {
        id: random_id("msg", 10),
        sender: participant_id.to_string(),
        text,
        timestamp: current_timestamp(),
    }
    .to_json();

    // 발신자 포함 전원에게 브로드캐스트
    state.roster.broadcast_to(&members, &chat_json, None).await;
    Ok(())
}

// ----------------------------------------------------------------------------
// [공용 퇴장 처리] leave-channel / 연결 종료 / reaper 공용
// ----------------------------------------------------------------------------

pub(crate) async fn broadcast_leave(
    roster: &ParticipantHub,
    registry: &ChannelRegistry,
    participant_id: &str,
) {
    let channel_key = match registry.leave(participant_id) {
        Some(key) => key,
        None => return,
    };

    // 채널이 비어 삭제됐으면 알릴 대상도 없다
    let remaining = registry.members_of(&channel_key);
    if remaining.is_empty() {
        return;
    }

    let left_json =
        ServerEvent::ParticipantLeft { participant: participant_id.to_string() }.to_json();
    roster.broadcast_to(&remaining, &left_json, None).await;

    let update_json = ServerEvent::ChannelUpdate { member_count: remaining.len() }.to_json();
    roster.broadcast_to(&remaining, &update_json, None).await;
}

// ----------------------------------------------------------------------------
// [내부 유틸]
// ----------------------------------------------------------------------------

async fn send(tx: &mpsc::Sender<String>, event: ServerEvent) -> Result<(), CerebroError> {
    send_raw(tx, event.to_json()).await
}

async fn send_raw(tx: &mpsc::Sender<String>, json: String) -> Result<(), CerebroError> {
    tx.send(json).await.map_err(|e| CerebroError::InternalError(e.to_string()))
}

fn error_event(err: CerebroError) -> String {
    ServerEvent::Error { code: err.code(), reason: err.to_string() }.to_json()
}
