// author: kodeholic (powered by Claude)
// ChannelController — 로컬 participant 1명분의 최상위 오케스트레이션
//
// 역할:
//   - 캡처 확보 -> 채널 합류 순서 보장 (미디어 준비 전에 존재를 알리면
//     상대편 coordinator가 트랙 없는 peer와 협상을 시작하게 됨)
//   - participant-joined/left에 맞춰 PeerCoordinator 생성/폐기
//   - 수신 signal을 발신자별 coordinator로 분배
//   - PTT 게이트: 재협상 없이 오디오 트랙 enable 토글 + voice-status 송신
//   - 공유 소스 낙관적 미러 + ducking
//
// sans-io: 릴레이로 나갈 이벤트는 outbox 큐에 쌓고 호출측(ws 루프)이
// drain해서 전송한다. 협상 오류는 해당 coordinator만 FAILED로 보내고
// 나머지 peer에는 영향을 주지 않는다.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, trace, warn};

use super::coordinator::{PeerCoordinator, PeerState};
use super::media::{LocalCapture, MediaSource, TrackKind};
use super::source::SourcePlayer;
use super::transport::TransportFactory;
use crate::config;
use crate::core::ScanEntry;
use crate::dial;
use crate::error::{CerebroError, CerebroResult};
use crate::protocol::event::{ClientEvent, ServerEvent, SourceDescriptor};
use crate::protocol::signal::SignalPayload;

/// 표시 계층으로 올라가는 알림 (시스템 공지/채팅)
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleNotice {
    Joined        { channel_key: String, member_count: usize },
    PeerConnected { participant: String },
    LinkUnstable  { participant: String },
    CaptureDegraded,
    Chat          { sender: String, text: String, timestamp: u64 },
    ServerError   { code: u16, reason: String },
}

pub struct ChannelController {
    media_source:      Box<dyn MediaSource>,
    transport_factory: TransportFactory,
    local_id:          Option<String>,
    channel_key:       Option<String>,
    member_count:      usize,
    capture:           Option<LocalCapture>,
    peers:             HashMap<String, PeerCoordinator>,
    /// 현재 송신 중인 participant 집합 (로컬 PTT 포함) — ducking 판단 근거
    transmitting:      HashSet<String>,
    ptt:               bool,
    source:            SourcePlayer,
    last_scan:         Vec<ScanEntry>,
    outbox:            VecDeque<ClientEvent>,
    notices:           VecDeque<ConsoleNotice>,
}

impl ChannelController {
    pub fn new(media_source: Box<dyn MediaSource>, transport_factory: TransportFactory) -> Self {
        Self {
            media_source,
            transport_factory,
            local_id: None,
            channel_key: None,
            member_count: 0,
            capture: None,
            peers: HashMap::new(),
            transmitting: HashSet::new(),
            ptt: false,
            source: SourcePlayer::new(),
            last_scan: Vec::new(),
            outbox: VecDeque::new(),
            notices: VecDeque::new(),
        }
    }

    // ------------------------------------------------------------------
    // 조회
    // ------------------------------------------------------------------

    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    pub fn channel_key(&self) -> Option<&str> {
        self.channel_key.as_deref()
    }

    pub fn member_count(&self) -> usize {
        self.member_count
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn peer_state(&self, remote: &str) -> Option<PeerState> {
        self.peers.get(remote).map(|p| p.state())
    }

    pub fn is_transmitting(&self) -> bool {
        self.ptt
    }

    pub fn source(&self) -> &SourcePlayer {
        &self.source
    }

    pub fn last_scan(&self) -> &[ScanEntry] {
        &self.last_scan
    }

    /// 릴레이로 보낼 이벤트를 꺼낸다 (ws 송신 루프가 호출)
    pub fn drain_outbox(&mut self) -> Vec<ClientEvent> {
        self.outbox.drain(..).collect()
    }

    pub fn drain_notices(&mut self) -> Vec<ConsoleNotice> {
        self.notices.drain(..).collect()
    }

    // ------------------------------------------------------------------
    // [채널 합류] 캡처 먼저, 합류는 그 다음
    // ------------------------------------------------------------------

    pub async fn start(&mut self, channel_key: &str, want_video: bool) -> CerebroResult<()> {
        // 직통 다이얼 키는 mesh 경로가 아님 — 키 모양이 경로를 결정한다
        if dial::is_direct_dial(channel_key) {
            return Err(CerebroError::DirectDialKey(channel_key.to_string()));
        }

        match self.media_source.acquire(want_video).await {
            Ok(capture) => {
                debug!("capture ready: {:?}", capture.kinds());
                self.capture = Some(capture);
            }
            Err(e) => {
                // 수신 전용으로 강등하고 합류는 계속 진행
                warn!("capture failed, joining receive-only: {}", e);
                self.capture = None;
                self.notices.push_back(ConsoleNotice::CaptureDegraded);
            }
        }

        self.channel_key = Some(channel_key.to_string());
        self.outbox.push_back(ClientEvent::JoinChannel {
            channel_key: channel_key.to_string(),
        });
        info!("joining channel {}", channel_key);
        Ok(())
    }

    pub async fn leave(&mut self) {
        if let Some(key) = self.channel_key.take() {
            info!("leaving channel {}", key);
            self.outbox.push_back(ClientEvent::LeaveChannel);
        }
        self.teardown_peers().await;
        // 캡처도 함께 내려놓는다 — 이후 도착하는 이벤트가 offer를 만들 수 없게
        self.capture = None;
        self.source.stop();
        self.member_count = 0;
    }

    pub fn scan(&mut self) {
        self.outbox.push_back(ClientEvent::ScanChannels);
    }

    // ------------------------------------------------------------------
    // [서버 이벤트 분배]
    // ------------------------------------------------------------------

    pub async fn handle_server_event(&mut self, event: ServerEvent) -> CerebroResult<()> {
        match event {
            ServerEvent::Ready { participant } => {
                debug!("relay assigned id {}", participant);
                self.local_id = Some(participant);
            }
            ServerEvent::Joined { channel_key, member_count } => {
                self.member_count = member_count;
                self.notices.push_back(ConsoleNotice::Joined { channel_key, member_count });
            }
            ServerEvent::ParticipantJoined { participant } => {
                self.on_participant_joined(&participant).await;
            }
            ServerEvent::ParticipantLeft { participant } => {
                self.on_participant_left(&participant).await;
            }
            ServerEvent::ChannelUpdate { member_count } => {
                self.member_count = member_count;
            }
            ServerEvent::Signal { sender, payload } => {
                self.on_signal(&sender, payload).await;
            }
            ServerEvent::VoiceStatus { participant, transmitting } => {
                self.set_remote_transmitting(&participant, transmitting);
            }
            ServerEvent::SourceUpdate { descriptor } => match descriptor {
                Some(d) => self.source.tune(d),
                None => self.source.stop(),
            },
            ServerEvent::ChatMessage { sender, text, timestamp, .. } => {
                self.notices.push_back(ConsoleNotice::Chat { sender, text, timestamp });
            }
            ServerEvent::ScanResults { channels } => {
                self.last_scan = channels;
            }
            ServerEvent::Error { code, reason } => {
                warn!("relay error {}: {}", code, reason);
                self.notices.push_back(ConsoleNotice::ServerError { code, reason });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // [peer 수명] join -> coordinator 생성/initiate, left -> 폐기
    // ------------------------------------------------------------------

    async fn on_participant_joined(&mut self, remote: &str) {
        // 채널을 이미 떠났으면 늦게 도착한 합류 통지로 세션을 되살리지 않는다
        if self.channel_key.is_none() {
            trace!("stale participant-joined ignored: {}", remote);
            return;
        }
        debug!("participant joined: {}", remote);
        // 기존 멤버(우리)가 신규 멤버를 향해 initiate — 양방향 glare 방지
        let transport = (self.transport_factory)();
        let mut peer = PeerCoordinator::new(remote, transport);

        // 캡처가 죽어있으면(수신 전용) offer하지 않고 상대 offer를 기다린다
        if let Some(capture) = &self.capture {
            match peer.initiate(capture).await {
                Ok(payload) => self.push_signal(remote, &payload),
                Err(e) => {
                    warn!("initiate toward {} failed: {}", remote, e);
                    peer.fail().await;
                    self.notices.push_back(ConsoleNotice::LinkUnstable {
                        participant: remote.to_string(),
                    });
                }
            }
        }
        self.peers.insert(remote.to_string(), peer);
    }

    async fn on_participant_left(&mut self, remote: &str) {
        debug!("participant left: {}", remote);
        if let Some(mut peer) = self.peers.remove(remote) {
            peer.close().await;
        }
        self.set_remote_transmitting(remote, false);
    }

    async fn teardown_peers(&mut self) {
        for (_, peer) in self.peers.iter_mut() {
            peer.close().await;
        }
        self.peers.clear();
        self.transmitting.clear();
        self.source.set_ducked(false);
    }

    // ------------------------------------------------------------------
    // [signal 분배] 발신자별 coordinator — 모르는 발신자여도 생성
    // (candidate가 offer를 앞질러 도착할 수 있으므로 버릴 수 없다)
    // ------------------------------------------------------------------

    async fn on_signal(&mut self, sender: &str, payload: Value) {
        // leave 이후 늦게 도착한 signal은 전부 버린다
        if self.channel_key.is_none() {
            trace!("stale signal ignored: {}", sender);
            return;
        }
        let payload = match SignalPayload::from_value(payload) {
            Ok(p) => p,
            Err(e) => {
                warn!("malformed signal from {}: {}", sender, e);
                return;
            }
        };

        if !self.peers.contains_key(sender) {
            trace!("new coordinator for inbound signal from {}", sender);
            let transport = (self.transport_factory)();
            self.peers.insert(sender.to_string(), PeerCoordinator::new(sender, transport));
        }

        let capture = self.capture.clone().unwrap_or_else(|| LocalCapture { tracks: Vec::new() });
        let Some(peer) = self.peers.get_mut(sender) else { return };

        let result = match payload {
            SignalPayload::Offer { sdp } => {
                peer.on_remote_offer(&sdp, &capture).await.map(Some)
            }
            SignalPayload::Answer { sdp } => peer.on_remote_answer(&sdp).await.map(|_| None),
            SignalPayload::Candidate { candidate } => {
                peer.on_remote_candidate(&candidate).await.map(|_| None)
            }
        };

        match result {
            Ok(Some(answer)) => self.push_signal(sender, &answer),
            Ok(None) => {}
            // 협상 오류는 이 coordinator에만 국한 — 나머지 peer는 계속 진행
            Err(e) => {
                warn!("negotiation with {} failed: {}", sender, e);
                if let Some(peer) = self.peers.get_mut(sender) {
                    peer.fail().await;
                }
                self.notices.push_back(ConsoleNotice::LinkUnstable {
                    participant: sender.to_string(),
                });
            }
        }
    }

    fn push_signal(&mut self, target: &str, payload: &SignalPayload) {
        self.outbox.push_back(ClientEvent::Signal {
            target:  target.to_string(),
            payload: payload.to_value(),
        });
    }

    // ------------------------------------------------------------------
    // [전송 계층 통지]
    // ------------------------------------------------------------------

    pub fn on_transport_connected(&mut self, remote: &str) {
        if let Some(peer) = self.peers.get_mut(remote) {
            if peer.on_transport_connected() {
                self.notices.push_back(ConsoleNotice::PeerConnected {
                    participant: remote.to_string(),
                });
            }
        }
    }

    pub async fn on_transport_failed(&mut self, remote: &str) {
        if let Some(peer) = self.peers.get_mut(remote) {
            peer.fail().await;
            self.notices.push_back(ConsoleNotice::LinkUnstable {
                participant: remote.to_string(),
            });
        }
    }

    /// 시그널링 연결이 죽었다 살아난 경우 — 세션 재개 없음, 전부 재구축.
    /// 채널에 있었으면 다시 join하고 coordinator는 participant-joined로 재생성된다.
    pub async fn handle_relay_reset(&mut self) {
        warn!("relay connection reset, rebuilding session");
        self.teardown_peers().await;
        self.local_id = None;
        // 이전 연결의 peer id로 쌓인 미송신 이벤트는 새 연결에서 의미가 없다
        self.outbox.clear();
        if let Some(key) = self.channel_key.clone() {
            self.outbox.push_back(ClientEvent::JoinChannel { channel_key: key });
        }
    }

    // ------------------------------------------------------------------
    // [PTT 게이트] 트랙 enable 토글만 — 재협상 없음
    // ------------------------------------------------------------------

    pub fn set_ptt(&mut self, on: bool) {
        if self.ptt == on {
            return;
        }
        self.ptt = on;
        if let Some(capture) = &mut self.capture {
            capture.set_enabled(TrackKind::Audio, on);
        }
        if let Some(id) = self.local_id.clone() {
            self.set_remote_transmitting(&id, on);
        } else {
            self.recompute_duck();
        }
        self.outbox.push_back(ClientEvent::VoiceStatus { transmitting: on });
        trace!("ptt {}", if on { "down" } else { "up" });
    }

    fn set_remote_transmitting(&mut self, participant: &str, transmitting: bool) {
        if transmitting {
            self.transmitting.insert(participant.to_string());
        } else {
            self.transmitting.remove(participant);
        }
        self.recompute_duck();
    }

    fn recompute_duck(&mut self) {
        self.source.set_ducked(!self.transmitting.is_empty());
    }

    // ------------------------------------------------------------------
    // [미디어 변경] 새 종류 추가 -> 재협상, 같은 종류 교체 -> 제자리
    // ------------------------------------------------------------------

    pub async fn enable_video(&mut self) -> CerebroResult<()> {
        let capture = self.media_source.acquire(true).await?;
        self.apply_capture(capture).await
    }

    async fn apply_capture(&mut self, capture: LocalCapture) -> CerebroResult<()> {
        let mut offers = Vec::new();
        for (remote, peer) in self.peers.iter_mut() {
            if peer.state().is_terminal() {
                continue;
            }
            if peer.needs_renegotiation(&capture) {
                match peer.initiate(&capture).await {
                    Ok(payload) => offers.push((remote.clone(), payload)),
                    Err(e) => warn!("renegotiation toward {} skipped: {}", remote, e),
                }
            } else {
                // 종류는 같고 장치만 바뀐 경우 — 제자리 교체.
                // 한 peer의 실패가 나머지 교체를 막으면 안 된다
                for track in &capture.tracks {
                    if let Err(e) = peer.replace_track(track.kind, &track.device).await {
                        warn!("track replace toward {} failed: {}", remote, e);
                    }
                }
            }
        }
        // PTT 상태는 새 캡처에도 이어진다
        let mut capture = capture;
        capture.set_enabled(TrackKind::Audio, self.ptt);
        self.capture = Some(capture);
        for (remote, payload) in offers {
            self.push_signal(&remote, &payload);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // [공유 소스] 낙관적 미러 + 채널 전파
    // ------------------------------------------------------------------

    pub fn broadcast_source(&mut self, descriptor: Option<SourceDescriptor>) {
        // 자기 재생부터 즉시 반영, 전파는 그 다음 (last-write-wins)
        match &descriptor {
            Some(d) => self.source.tune(d.clone()),
            None => self.source.stop(),
        }
        self.outbox.push_back(ClientEvent::BroadcastSource { descriptor });
    }

    // ------------------------------------------------------------------
    // [채팅]
    // ------------------------------------------------------------------

    pub fn send_chat(&mut self, text: &str) -> CerebroResult<()> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CerebroError::EmptyMessage);
        }
        if trimmed.len() > config::MAX_MESSAGE_LENGTH {
            return Err(CerebroError::MessageTooLong(trimmed.len()));
        }
        self.outbox.push_back(ClientEvent::Message { text: trimmed.to_string() });
        Ok(())
    }
}

/// 시그널링 재접속 지수 백오프. 한도 초과 시 None (포기).
pub fn reconnect_backoff(attempt: u32) -> Option<Duration> {
    if attempt >= config::RECONNECT_MAX_ATTEMPTS {
        return None;
    }
    let delay = config::RECONNECT_BASE_DELAY_MS.saturating_mul(1 << attempt);
    Some(Duration::from_millis(delay))
}
