// author: kodeholic (powered by Gemini)

use std::fmt;

#[derive(Debug)]
pub enum CerebroError {
    // 1xxx: 프로토콜
    InvalidPayload(String),
    UnknownEvent(String),

    // 2xxx: 채널/프레즌스
    NotInChannel,
    DirectDialKey(String),

    // 3xxx: 메시지
    EmptyMessage,
    MessageTooLong(usize),

    // 4xxx: 협상 (Peer Session Coordinator)
    InvalidTransition { state: &'static str, event: &'static str },
    CaptureFailed(String),
    TransportFailed(String),

    // 5xxx: 외부 경계
    DirectoryError(String),
    GatewayError(String),

    // 9xxx: 내부
    InternalError(String),
    IoError(std::io::Error),
}

impl fmt::Display for CerebroError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CerebroError::InvalidPayload(msg) => write!(f, "Invalid payload: {}", msg),
            CerebroError::UnknownEvent(kind) => write!(f, "Unknown event type: {}", kind),
            CerebroError::NotInChannel => write!(f, "Not currently in any channel"),
            CerebroError::DirectDialKey(key) => {
                write!(f, "Key routes to the dial path, not the mesh: {}", key)
            }
            CerebroError::EmptyMessage => write!(f, "Message text is empty"),
            CerebroError::MessageTooLong(len) => write!(f, "Message too long: {} bytes", len),
            CerebroError::InvalidTransition { state, event } => {
                write!(f, "Illegal negotiation transition: {} in state {}", event, state)
            }
            CerebroError::CaptureFailed(msg) => write!(f, "Local capture failed: {}", msg),
            CerebroError::TransportFailed(msg) => write!(f, "Media transport failed: {}", msg),
            CerebroError::DirectoryError(msg) => write!(f, "Station directory error: {}", msg),
            CerebroError::GatewayError(msg) => write!(f, "Voice gateway error: {}", msg),
            CerebroError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            CerebroError::IoError(err) => write!(f, "Network I/O error: {}", err),
        }
    }
}

impl std::error::Error for CerebroError {}

impl From<std::io::Error> for CerebroError {
    fn from(err: std::io::Error) -> Self {
        CerebroError::IoError(err)
    }
}

pub type CerebroResult<T> = Result<T, CerebroError>;

// ----------------------------------------------------------------------------
// 와이어 에러 코드 — error 이벤트의 code 필드
// ----------------------------------------------------------------------------

pub const INVALID_PAYLOAD: u16 = 1004;
pub const UNKNOWN_EVENT: u16 = 1005;
pub const NOT_IN_CHANNEL: u16 = 2004;
pub const DIRECT_DIAL_KEY: u16 = 2005;
pub const EMPTY_MESSAGE: u16 = 3000;
pub const MESSAGE_TOO_LONG: u16 = 3001;
pub const NEGOTIATION_FAILED: u16 = 4000;
pub const INTERNAL_ERROR: u16 = 9000;

impl CerebroError {
    /// error 이벤트 응답용 코드 변환
    pub fn code(&self) -> u16 {
        match self {
            CerebroError::InvalidPayload(_) => INVALID_PAYLOAD,
            CerebroError::UnknownEvent(_) => UNKNOWN_EVENT,
            CerebroError::NotInChannel => NOT_IN_CHANNEL,
            CerebroError::DirectDialKey(_) => DIRECT_DIAL_KEY,
            CerebroError::EmptyMessage => EMPTY_MESSAGE,
            CerebroError::MessageTooLong(_) => MESSAGE_TOO_LONG,
            CerebroError::InvalidTransition { .. }
            | CerebroError::CaptureFailed(_)
            | CerebroError::TransportFailed(_) => NEGOTIATION_FAILED,
            _ => INTERNAL_ERROR,
        }
    }
}
