// author: kodeholic (powered by Claude)
// MediaTransport — 협상 전송 계층 경계
//
// Coordinator는 description/candidate의 내용을 모른다. 생성과 적용은
// 전부 이 trait 뒤의 구현체(실제 환경에서는 브라우저/네이티브 RTC 스택)
// 소관이고, Coordinator는 순서/상태만 책임진다.

use async_trait::async_trait;
use tracing::trace;

use super::media::TrackKind;
use crate::error::{CerebroError, CerebroResult};
use crate::utils::{current_timestamp, random_id};

#[async_trait]
pub trait MediaTransport: Send {
    /// 로컬 offer description 생성 (suspension point — 논블로킹)
    async fn create_offer(&mut self, tracks: &[TrackKind]) -> CerebroResult<String>;

    /// remote offer에 대응하는 answer description 생성
    async fn create_answer(&mut self, remote_offer: &str, tracks: &[TrackKind])
        -> CerebroResult<String>;

    /// remote description 적용
    async fn apply_remote_description(&mut self, sdp: &str) -> CerebroResult<()>;

    /// remote candidate 적용 — remote description이 적용된 뒤에만 호출된다
    async fn apply_candidate(&mut self, candidate: &str) -> CerebroResult<()>;

    /// 같은 종류 트랙의 장치 교체 — 재협상 없음
    async fn replace_track(&mut self, kind: TrackKind, device: &str) -> CerebroResult<()>;

    /// 세션 종료. 이후 어떤 호출도 오지 않는다.
    async fn close(&mut self);
}

/// Box 생산 팩토리 — Controller가 peer마다 새 전송을 만든다
pub type TransportFactory = Box<dyn Fn() -> Box<dyn MediaTransport> + Send + Sync>;

// ----------------------------------------------------------------------------
// [SdpTransport] 기본 in-process 구현
//
// 실제 ICE/DTLS 없이 SDP 텍스트만 조립/검증한다. 외부 RTC 스택 없이
// 협상 상태 기계를 구동/검증하는 용도 (NAT 통과는 명시적 non-goal).
// ----------------------------------------------------------------------------

pub struct SdpTransport {
    ufrag: String,
    remote_description: Option<String>,
    candidates_applied: usize,
}

impl SdpTransport {
    pub fn new() -> Self {
        Self {
            ufrag: random_id("uf", 8),
            remote_description: None,
            candidates_applied: 0,
        }
    }

    pub fn boxed_factory() -> TransportFactory {
        Box::new(|| Box::new(SdpTransport::new()))
    }

    /// 트랙 종류 목록으로 최소 SDP 조립
    fn build_description(&self, kinds: &[TrackKind]) -> String {
        let session_id = current_timestamp();
        let mut sdp = String::new();
        sdp.push_str("v=0\r\n");
        sdp.push_str(&format!("o=cerebro {0} {0} IN IP4 0.0.0.0\r\n", session_id));
        sdp.push_str("s=-\r\n");
        sdp.push_str("t=0 0\r\n");
        for kind in kinds {
            sdp.push_str(&format!("m={} 9 UDP/TLS/RTP/SAVPF 0\r\n", kind));
            sdp.push_str(&format!("a=ice-ufrag:{}\r\n", self.ufrag));
            sdp.push_str("a=sendrecv\r\n");
        }
        sdp
    }
}

impl Default for SdpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaTransport for SdpTransport {
    async fn create_offer(&mut self, tracks: &[TrackKind]) -> CerebroResult<String> {
        trace!("create_offer: {} track kind(s)", tracks.len());
        Ok(self.build_description(tracks))
    }

    async fn create_answer(
        &mut self,
        remote_offer: &str,
        tracks: &[TrackKind],
    ) -> CerebroResult<String> {
        // answer는 offer의 미디어 구성을 넘어설 수 없다 — 교집합만 미러링
        let offered: Vec<TrackKind> = remote_offer
            .lines()
            .filter_map(|line| match line.trim() {
                l if l.starts_with("m=audio") => Some(TrackKind::Audio),
                l if l.starts_with("m=video") => Some(TrackKind::Video),
                _ => None,
            })
            .collect();
        let answered: Vec<TrackKind> =
            offered.into_iter().filter(|k| tracks.contains(k)).collect();
        Ok(self.build_description(&answered))
    }

    async fn apply_remote_description(&mut self, sdp: &str) -> CerebroResult<()> {
        if !sdp.starts_with("v=0") {
            return Err(CerebroError::TransportFailed("malformed description".to_string()));
        }
        self.remote_description = Some(sdp.to_string());
        Ok(())
    }

    async fn apply_candidate(&mut self, candidate: &str) -> CerebroResult<()> {
        if candidate.trim().is_empty() {
            return Err(CerebroError::TransportFailed("empty candidate".to_string()));
        }
        if self.remote_description.is_none() {
            // Coordinator가 버퍼링을 빼먹은 경우에만 도달 가능
            return Err(CerebroError::TransportFailed(
                "candidate before remote description".to_string(),
            ));
        }
        self.candidates_applied += 1;
        Ok(())
    }

    async fn replace_track(&mut self, kind: TrackKind, device: &str) -> CerebroResult<()> {
        trace!("replace_track: {} -> {}", kind, device);
        Ok(())
    }

    async fn close(&mut self) {
        trace!("transport closed (ufrag={}, {} candidate(s) applied)",
            self.ufrag, self.candidates_applied);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offer_lists_media_kinds() {
        let mut t = SdpTransport::new();
        let sdp = t.create_offer(&[TrackKind::Audio, TrackKind::Video]).await.unwrap();
        assert!(sdp.starts_with("v=0"));
        assert!(sdp.contains("m=audio"));
        assert!(sdp.contains("m=video"));
    }

    #[tokio::test]
    async fn answer_mirrors_only_shared_kinds() {
        let mut offerer = SdpTransport::new();
        let offer = offerer.create_offer(&[TrackKind::Audio, TrackKind::Video]).await.unwrap();

        let mut answerer = SdpTransport::new();
        let answer = answerer.create_answer(&offer, &[TrackKind::Audio]).await.unwrap();
        assert!(answer.contains("m=audio"));
        assert!(!answer.contains("m=video"));
    }

    #[tokio::test]
    async fn candidate_requires_remote_description() {
        let mut t = SdpTransport::new();
        assert!(t.apply_candidate("cand:1").await.is_err());
        t.apply_remote_description("v=0\r\n").await.unwrap();
        assert!(t.apply_candidate("cand:1").await.is_ok());
    }

    #[tokio::test]
    async fn rejects_malformed_description() {
        let mut t = SdpTransport::new();
        let err = t.apply_remote_description("garbage").await.unwrap_err();
        assert!(matches!(err, CerebroError::TransportFailed(_)));
    }
}
