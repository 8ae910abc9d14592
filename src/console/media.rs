// author: kodeholic (powered by Claude)
// 로컬 미디어 캡처 모델
//
// 캡처 핸들은 Controller가 단독 소유한다. Coordinator는 트랙 종류만
// 빌려 본다 (소유/변경 불가).

use async_trait::async_trait;
use tracing::trace;

use crate::error::{CerebroError, CerebroResult};

/// 트랙 종류. 같은 종류의 트랙 교체는 재협상 없이 가능하고,
/// 새로운 종류의 추가는 offer/answer 라운드를 다시 요구한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// 캡처된 로컬 트랙 1개
#[derive(Debug, Clone)]
pub struct LocalTrack {
    pub kind: TrackKind,
    pub device: String,
    /// PTT 게이트 — 꺼져 있으면 송신 무음 (재협상 없음)
    pub enabled: bool,
}

/// 로컬 캡처 핸들 — 트랙 묶음
#[derive(Debug, Clone, Default)]
pub struct LocalCapture {
    pub tracks: Vec<LocalTrack>,
}

impl LocalCapture {
    pub fn kinds(&self) -> Vec<TrackKind> {
        self.tracks.iter().map(|t| t.kind).collect()
    }

    pub fn has_kind(&self, kind: TrackKind) -> bool {
        self.tracks.iter().any(|t| t.kind == kind)
    }

    /// 해당 종류 트랙 전체의 게이트 토글 (PTT)
    pub fn set_enabled(&mut self, kind: TrackKind, enabled: bool) {
        for track in self.tracks.iter_mut().filter(|t| t.kind == kind) {
            track.enabled = enabled;
        }
    }

    pub fn is_enabled(&self, kind: TrackKind) -> bool {
        self.tracks.iter().any(|t| t.kind == kind && t.enabled)
    }
}

// ----------------------------------------------------------------------------
// [MediaSource] 캡처 획득 경계 — 실제 장치 접근은 프레젠테이션 레이어 소관
// ----------------------------------------------------------------------------

#[async_trait]
pub trait MediaSource: Send + Sync {
    /// 오디오(+요청 시 비디오) 캡처 획득. 실패하면 CaptureFailed.
    async fn acquire(&self, want_video: bool) -> CerebroResult<LocalCapture>;
}

/// 고정 장치 구현 — 서버 없는 환경/테스트 공용.
/// 오디오는 항상 획득되고, 비디오는 요청 시 붙는다.
pub struct FixedMediaSource {
    pub audio_device: String,
    pub video_device: String,
    /// true면 acquire가 항상 실패 — 캡처 장애 경로 검증용
    pub fail: bool,
}

impl FixedMediaSource {
    pub fn new(audio_device: &str, video_device: &str) -> Self {
        Self {
            audio_device: audio_device.to_string(),
            video_device: video_device.to_string(),
            fail: false,
        }
    }

    /// 항상 실패하는 소스 — 캡처 장애(수신 전용 강등) 경로 검증용
    pub fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }
}

impl Default for FixedMediaSource {
    fn default() -> Self {
        Self {
            audio_device: "default-mic".to_string(),
            video_device: "default-cam".to_string(),
            fail: false,
        }
    }
}

#[async_trait]
impl MediaSource for FixedMediaSource {
    async fn acquire(&self, want_video: bool) -> CerebroResult<LocalCapture> {
        if self.fail {
            return Err(CerebroError::CaptureFailed("device unavailable".to_string()));
        }

        // 오디오는 PTT 기본값대로 비활성으로 시작
        let mut tracks = vec![LocalTrack {
            kind: TrackKind::Audio,
            device: self.audio_device.clone(),
            enabled: false,
        }];
        if want_video {
            tracks.push(LocalTrack {
                kind: TrackKind::Video,
                device: self.video_device.clone(),
                enabled: true,
            });
        }
        trace!("capture acquired: {} track(s)", tracks.len());
        Ok(LocalCapture { tracks })
    }
}
