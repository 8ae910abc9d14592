// author: kodeholic (powered by Claude)
// 와이어 이벤트 정의
//
// 모든 WS 텍스트 프레임은 type 태그가 붙은 JSON 오브젝트 하나.
// 예시:
//   { "type": "join-channel", "channel_key": "101.5" }
//   { "type": "signal", "target": "p_ab12CD34ef", "payload": { "type": "offer", ... } }

use serde::{Deserialize, Serialize};

use crate::core::ScanEntry;

// ----------------------------------------------------------------------------
// [공유 소스] 한 participant가 채널에 중계하는 앰비언트 오디오 서술자
// ----------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// 외부 스트림 (스테이션 디렉터리 또는 수동 URL)
    Stream,
    /// 합성 백색소음 — 합성 자체는 DSP 레이어 소관, 여기서는 서술자만
    Noise,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub name: String,
}

// ----------------------------------------------------------------------------
// [C→S] 클라이언트 요청 이벤트
// ----------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinChannel {
        channel_key: String,
    },
    LeaveChannel,
    /// 요청/응답 — scan-results가 요청자에게만 내려간다
    ScanChannels,
    /// payload는 릴레이에 opaque. 검사/검증 없이 target에게만 그대로 전달.
    Signal {
        target: String,
        payload: serde_json::Value,
    },
    VoiceStatus {
        transmitting: bool,
    },
    /// descriptor: None == 중계 중단
    BroadcastSource {
        descriptor: Option<SourceDescriptor>,
    },
    Message {
        text: String,
    },
}

// ----------------------------------------------------------------------------
// [S→C] 서버 이벤트
// ----------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// 연결 직후 1회 — 릴레이가 발급한 participant id 통지
    Ready {
        participant: String,
    },
    /// join 성공 응답 (합류자 본인에게만)
    Joined {
        channel_key: String,
        member_count: usize,
    },
    ParticipantJoined {
        participant: String,
    },
    ParticipantLeft {
        participant: String,
    },
    ChannelUpdate {
        member_count: usize,
    },
    ScanResults {
        channels: Vec<ScanEntry>,
    },
    Signal {
        sender: String,
        payload: serde_json::Value,
    },
    VoiceStatus {
        participant: String,
        transmitting: bool,
    },
    SourceUpdate {
        descriptor: Option<SourceDescriptor>,
    },
    /// id/timestamp는 릴레이가 생성 — 클라이언트 시계/위조 방지
    ChatMessage {
        id: String,
        sender: String,
        text: String,
        timestamp: u64,
    },
    Error {
        code: u16,
        reason: String,
    },
}

impl ServerEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
