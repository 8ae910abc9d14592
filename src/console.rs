// author: kodeholic (powered by Claude)
// console 계층 — 로컬 participant 쪽 세션 구성 요소
//   media       : 로컬 캡처 추상화 (MediaSource / LocalCapture)
//   transport   : 미디어 전송 경계 (MediaTransport / SdpTransport)
//   coordinator : 원격 peer별 협상 상태 기계
//   controller  : 최상위 오케스트레이션 (PTT / 공유 소스 / peer 수명)
//   source      : 공유 배경 소스 재생 + ducking

pub mod controller;
pub mod coordinator;
pub mod media;
pub mod source;
pub mod transport;

pub use controller::{reconnect_backoff, ChannelController, ConsoleNotice};
pub use coordinator::{PeerCoordinator, PeerState};
pub use media::{FixedMediaSource, LocalCapture, LocalTrack, MediaSource, TrackKind};
pub use source::SourcePlayer;
pub use transport::{MediaTransport, SdpTransport, TransportFactory};
