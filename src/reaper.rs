// author: kodeholic (powered by Claude)
// 좀비 세션 자동 종료 태스크
//
// 주기마다 수행:
//   1. 좀비 participant (inbound 프레임 없음) 탐지
//   2. 소속 채널에서 퇴장 처리 + 잔류 멤버에게 participant-left 통지
//   3. roster에서 제거 (egress 큐 drop → ws 송신 루프 종료)

use std::sync::Arc;
use tracing::info;

use crate::config;
use crate::core::{ChannelRegistry, ParticipantHub};
use crate::protocol::relay;

pub async fn run_zombie_reaper(roster: Arc<ParticipantHub>, registry: Arc<ChannelRegistry>) {
    let interval  = tokio::time::Duration::from_millis(config::REAPER_INTERVAL_MS);
    let mut timer = tokio::time::interval(interval);
    timer.tick().await; // 첫 틱 skip (startup 시 즉시 실행 방지)

    info!("[zombie-reaper] Started (interval={}ms, timeout={}ms)",
        config::REAPER_INTERVAL_MS, config::ZOMBIE_TIMEOUT_MS);

    loop {
        timer.tick().await;

        let dead = roster.find_zombies(config::ZOMBIE_TIMEOUT_MS);
        for pid in &dead {
            // 채널 퇴장 통지 먼저, roster 제거는 그 다음
            relay::broadcast_leave(&roster, &registry, pid).await;
            roster.unregister(pid);
            info!("[zombie-reaper] participant={} removed (no inbound frame)", pid);
        }

        if !dead.is_empty() {
            info!("[zombie-reaper] Cleaned {} participant(s)", dead.len());
        }
    }
}
