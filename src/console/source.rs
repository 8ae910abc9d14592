// author: kodeholic (powered by Claude)
// SourcePlayer — 채널 공유 배경 소스(스트림/노이즈) 로컬 재생 상태
//
// 동기화는 last-write-wins: 마지막으로 도착한 source-update가 이긴다.
// 누군가 송신 중(voice activity)이면 음량을 낮추고(duck), 모두 조용해지면 복원.

use tracing::{debug, trace};

use crate::config;
use crate::protocol::event::SourceDescriptor;

pub struct SourcePlayer {
    current: Option<SourceDescriptor>,
    ducked:  bool,
}

impl SourcePlayer {
    pub fn new() -> Self {
        Self { current: None, ducked: false }
    }

    /// 새 소스로 전환 (자기 자신의 선택이든 원격 source-update든 동일 경로)
    pub fn tune(&mut self, descriptor: SourceDescriptor) {
        debug!("source tune: {} ({:?})", descriptor.name, descriptor.kind);
        self.current = Some(descriptor);
    }

    /// 소스 해제 — 재생 중단
    pub fn stop(&mut self) {
        if self.current.is_some() {
            debug!("source stopped");
        }
        self.current = None;
    }

    pub fn current(&self) -> Option<&SourceDescriptor> {
        self.current.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.current.is_some()
    }

    /// 송신자 유무에 따른 ducking 게이트. 상태가 바뀌었으면 true.
    pub fn set_ducked(&mut self, ducked: bool) -> bool {
        if self.ducked == ducked {
            return false;
        }
        self.ducked = ducked;
        trace!("source {} (gain={})", if ducked { "ducked" } else { "restored" }, self.effective_gain());
        true
    }

    pub fn is_ducked(&self) -> bool {
        self.ducked
    }

    /// 현재 적용 음량. 소스가 없으면 0.
    pub fn effective_gain(&self) -> f32 {
        if self.current.is_none() {
            return 0.0;
        }
        if self.ducked {
            config::DUCK_GAIN
        } else {
            config::DEFAULT_SOURCE_GAIN
        }
    }
}

impl Default for SourcePlayer {
    fn default() -> Self {
        Self::new()
    }
}
