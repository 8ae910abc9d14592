// author: kodeholic (powered by Claude)
//
// HTTP REST API 핸들러 — 관측 전용 (상태 변경 없음)
//
// GET /status           → 서버 상태 (uptime, participant/channel 수)
// GET /channels         → 활성 채널 목록 (scan-results와 동일 정렬)
// GET /channels/{key}   → 채널 상세 + 멤버 목록

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::core::{ChannelRegistry, ParticipantHub};
use crate::utils::current_timestamp;

// ----------------------------------------------------------------------------
// [공유 상태] HTTP 핸들러용 — WS AppState와 별도로 분리
// ----------------------------------------------------------------------------

#[derive(Clone)]
pub struct HttpState {
    pub roster:        Arc<ParticipantHub>,
    pub registry:      Arc<ChannelRegistry>,
    /// 서버 프로세스 시작 시각 (Unix millis) — uptime 계산용
    pub start_time_ms: u64,
}

impl HttpState {
    pub fn new(roster: Arc<ParticipantHub>, registry: Arc<ChannelRegistry>) -> Self {
        Self { roster, registry, start_time_ms: current_timestamp() }
    }
}

// ----------------------------------------------------------------------------
// [응답 타입]
// ----------------------------------------------------------------------------

/// GET /status 응답
#[derive(Serialize)]
pub struct ServerStatus {
    pub uptime_secs:       u64,
    pub participant_count: usize,
    pub channel_count:     usize,
}

/// GET /channels/{key} 응답
#[derive(Serialize)]
pub struct ChannelDetail {
    pub channel_key:   String,
    pub member_count:  usize,
    pub last_activity: u64,
    pub members:       Vec<String>,
}

// ----------------------------------------------------------------------------
// [핸들러]
// ----------------------------------------------------------------------------

/// GET /status
pub async fn server_status(State(state): State<HttpState>) -> impl IntoResponse {
    let uptime_secs = current_timestamp().saturating_sub(state.start_time_ms) / 1000;
    Json(ServerStatus {
        uptime_secs,
        participant_count: state.roster.count(),
        channel_count:     state.registry.channel_count(),
    })
}

/// GET /channels
/// scan-channels와 동일한 목록/정렬 — 멤버 수 내림차순, 키 오름차순
pub async fn list_channels(State(state): State<HttpState>) -> impl IntoResponse {
    Json(state.registry.list_active())
}

/// GET /channels/{key}
pub async fn get_channel(
    State(state): State<HttpState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    match state.registry.detail_of(&key) {
        Some((mut members, last_activity)) => {
            members.sort();
            let detail = ChannelDetail {
                channel_key: key,
                member_count: members.len(),
                last_activity,
                members,
            };
            (StatusCode::OK, Json(detail)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "channel not found" })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_counts_follow_registry() {
        let roster   = Arc::new(ParticipantHub::new());
        let registry = Arc::new(ChannelRegistry::new());
        let state    = HttpState::new(Arc::clone(&roster), Arc::clone(&registry));

        registry.join("p_a", "101.5");
        registry.join("p_b", "101.5");
        registry.join("p_c", "27.105");

        assert_eq!(state.registry.channel_count(), 2);
        assert_eq!(state.registry.member_count("101.5"), 2);
    }

    #[test]
    fn detail_includes_sorted_members() {
        let registry = Arc::new(ChannelRegistry::new());
        registry.join("p_b", "101.5");
        registry.join("p_a", "101.5");

        let (mut members, _) = registry.detail_of("101.5").unwrap();
        members.sort();
        assert_eq!(members, vec!["p_a".to_string(), "p_b".to_string()]);
        assert!(registry.detail_of("88.0").is_none());
    }
}
