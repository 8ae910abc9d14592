// author: kodeholic (powered by Claude)
// PeerCoordinator — 원격 participant 1명당 협상 상태 기계
//
// 상태 전이:
//   발신측: New → HaveLocalOffer ───────────────┐
//   수신측: New → HaveRemoteOffer → HaveLocalAnswer ├→ Connected → (Failed | Closed)
//
// candidate는 offer/answer보다 먼저 도착하는 일이 흔하다 (발신자별 순서만
// 보장되고 메시지 종류 간 순서는 보장되지 않음). remote description이
// 적용되기 전에 도착한 candidate는 FIFO 버퍼에 쌓았다가, description 적용
// 직후 도착 순서 그대로 정확히 1회씩 재생한다.
//
// Failed/Closed는 종단 상태 — 버퍼를 비우고 이후 입력은 조용히 무시한다.

use std::collections::VecDeque;
use tracing::{debug, trace, warn};

use super::media::{LocalCapture, TrackKind};
use super::transport::MediaTransport;
use crate::config;
use crate::error::{CerebroError, CerebroResult};
use crate::protocol::signal::SignalPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    New,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveLocalAnswer,
    Connected,
    Failed,
    Closed,
}

impl PeerState {
    pub fn name(&self) -> &'static str {
        match self {
            PeerState::New => "NEW",
            PeerState::HaveLocalOffer => "HAVE_LOCAL_OFFER",
            PeerState::HaveRemoteOffer => "HAVE_REMOTE_OFFER",
            PeerState::HaveLocalAnswer => "HAVE_LOCAL_ANSWER",
            PeerState::Connected => "CONNECTED",
            PeerState::Failed => "FAILED",
            PeerState::Closed => "CLOSED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PeerState::Failed | PeerState::Closed)
    }
}

pub struct PeerCoordinator {
    remote_id: String,
    state: PeerState,
    transport: Box<dyn MediaTransport>,
    local_description: Option<String>,
    remote_description: Option<String>,
    pending_candidates: VecDeque<String>,
    candidates_applied: usize,
    /// 마지막 offer/answer에 실린 로컬 트랙 종류 — 재협상 필요 판단 기준
    offered_kinds: Vec<TrackKind>,
    transport_up: bool,
}

impl PeerCoordinator {
    pub fn new(remote_id: &str, transport: Box<dyn MediaTransport>) -> Self {
        trace!("PeerCoordinator::new remote={}", remote_id);
        Self {
            remote_id: remote_id.to_string(),
            state: PeerState::New,
            transport,
            local_description: None,
            remote_description: None,
            pending_candidates: VecDeque::new(),
            candidates_applied: 0,
            offered_kinds: Vec::new(),
            transport_up: false,
        }
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn remote_id(&self) -> &str {
        &self.remote_id
    }

    /// 적용된 candidate 누계 (관측/테스트용)
    pub fn candidates_applied(&self) -> usize {
        self.candidates_applied
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    /// 캡처에 아직 offer하지 않은 트랙 종류가 생겼는가 (→ Initiate 재실행 필요)
    pub fn needs_renegotiation(&self, capture: &LocalCapture) -> bool {
        capture.kinds().iter().any(|k| !self.offered_kinds.contains(k))
    }

    // ------------------------------------------------------------------
    // [Initiate] 신규 peer 등장 또는 미디어 구성 변경 시
    // ------------------------------------------------------------------

    pub async fn initiate(&mut self, capture: &LocalCapture) -> CerebroResult<SignalPayload> {
        // 최초 협상은 New, 미디어 변경 재협상은 Connected에서만
        if !matches!(self.state, PeerState::New | PeerState::Connected) {
            return Err(CerebroError::InvalidTransition {
                state: self.state.name(),
                event: "initiate",
            });
        }

        self.offered_kinds = capture.kinds();
        let sdp = self.transport.create_offer(&self.offered_kinds).await?;
        self.local_description = Some(sdp.clone());
        self.state = PeerState::HaveLocalOffer;
        debug!("initiate -> HAVE_LOCAL_OFFER (remote={})", self.remote_id);
        Ok(SignalPayload::Offer { sdp })
    }

    // ------------------------------------------------------------------
    // [수신 offer] 초기 협상(New) 또는 상대측 미디어 변경(Connected)
    // ------------------------------------------------------------------

    pub async fn on_remote_offer(
        &mut self,
        sdp: &str,
        capture: &LocalCapture,
    ) -> CerebroResult<SignalPayload> {
        let was_connected = self.state == PeerState::Connected;
        if !matches!(self.state, PeerState::New | PeerState::Connected) {
            return Err(CerebroError::InvalidTransition {
                state: self.state.name(),
                event: "offer",
            });
        }

        self.transport.apply_remote_description(sdp).await?;
        self.remote_description = Some(sdp.to_string());
        self.state = PeerState::HaveRemoteOffer;

        // remote description이 생겼으니 밀려있던 candidate를 도착 순서대로 재생
        self.flush_pending_candidates().await?;

        self.offered_kinds = capture.kinds();
        let answer = self.transport.create_answer(sdp, &self.offered_kinds).await?;
        self.local_description = Some(answer.clone());

        // 재협상이면 이미 살아있는 전송 위에서 진행 — 바로 Connected 복귀
        self.state = if was_connected { PeerState::Connected } else { PeerState::HaveLocalAnswer };
        debug!("offer applied -> {} (remote={})", self.state.name(), self.remote_id);
        Ok(SignalPayload::Answer { sdp: answer })
    }

    // ------------------------------------------------------------------
    // [수신 answer] HaveLocalOffer에서만 유효
    // ------------------------------------------------------------------

    pub async fn on_remote_answer(&mut self, sdp: &str) -> CerebroResult<()> {
        if self.state != PeerState::HaveLocalOffer {
            return Err(CerebroError::InvalidTransition {
                state: self.state.name(),
                event: "answer",
            });
        }

        self.transport.apply_remote_description(sdp).await?;
        self.remote_description = Some(sdp.to_string());

        // 발신측에서도 candidate가 answer를 앞지를 수 있다
        self.flush_pending_candidates().await?;

        // 전송이 이미 살아있으면(재협상) 즉시 Connected, 아니면 연결 확인 대기
        if self.transport_up {
            self.state = PeerState::Connected;
        }
        debug!("answer applied, state={} (remote={})", self.state.name(), self.remote_id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // [수신 candidate] description 앞지름 허용 — 버퍼링
    // ------------------------------------------------------------------

    pub async fn on_remote_candidate(&mut self, candidate: &str) -> CerebroResult<()> {
        if self.state.is_terminal() {
            trace!("candidate ignored in terminal state (remote={})", self.remote_id);
            return Ok(());
        }

        if self.remote_description.is_some() {
            self.transport.apply_candidate(candidate).await?;
            self.candidates_applied += 1;
            return Ok(());
        }

        if self.pending_candidates.len() >= config::MAX_PENDING_CANDIDATES {
            warn!("candidate buffer full, dropping (remote={})", self.remote_id);
            return Ok(());
        }
        trace!("buffering early candidate #{} (remote={})",
            self.pending_candidates.len() + 1, self.remote_id);
        self.pending_candidates.push_back(candidate.to_string());
        Ok(())
    }

    /// 버퍼 재생 — 도착 순서 유지, 각 candidate 정확히 1회
    async fn flush_pending_candidates(&mut self) -> CerebroResult<()> {
        if self.pending_candidates.is_empty() {
            return Ok(());
        }
        debug!("flushing {} buffered candidate(s) (remote={})",
            self.pending_candidates.len(), self.remote_id);
        while let Some(candidate) = self.pending_candidates.pop_front() {
            self.transport.apply_candidate(&candidate).await?;
            self.candidates_applied += 1;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // [연결성 전이] 전송 계층 통지
    // ------------------------------------------------------------------

    /// 전송 연결 확인. Connected로 새로 전이했으면 true.
    pub fn on_transport_connected(&mut self) -> bool {
        self.transport_up = true;
        // 양쪽 description이 다 적용된 뒤에만 Connected로 전이
        let ready = self.local_description.is_some()
            && self.remote_description.is_some()
            && matches!(self.state, PeerState::HaveLocalOffer | PeerState::HaveLocalAnswer);
        if ready {
            self.state = PeerState::Connected;
            debug!("-> CONNECTED (remote={})", self.remote_id);
        }
        ready
    }

    /// 종단 실패 — 버퍼 폐기, 이후 입력 무시
    pub async fn fail(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        warn!("-> FAILED (remote={})", self.remote_id);
        self.state = PeerState::Failed;
        self.transport_up = false;
        self.pending_candidates.clear();
        self.transport.close().await;
    }

    /// 정상 종료 (상대 퇴장 / 채널 이탈)
    pub async fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        trace!("-> CLOSED (remote={})", self.remote_id);
        self.state = PeerState::Closed;
        self.transport_up = false;
        self.pending_candidates.clear();
        self.transport.close().await;
    }

    // ------------------------------------------------------------------
    // [미디어 변경] 같은 종류 교체 — 재협상 없음
    // ------------------------------------------------------------------

    pub async fn replace_track(&mut self, kind: TrackKind, device: &str) -> CerebroResult<()> {
        if self.state.is_terminal() {
            return Ok(());
        }
        self.transport.replace_track(kind, device).await
    }
}
