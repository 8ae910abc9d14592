// author: kodeholic (powered by Claude)
// 네트워크 로직과 철저히 분리된, 순수 비즈니스 상태 관리 모듈입니다.

pub mod registry;
pub mod roster;

pub use registry::{ChannelRegistry, JoinInfo, ScanEntry};
pub use roster::{EgressTx, Participant, ParticipantHub};
