// author: kodeholic (powered by Claude)
// 매직 넘버를 배제하고 시스템 전체의 성능과 한계를 제어하는 상수 모음입니다.

/// 웹소켓 시그널링 서버 TCP 포트
pub const SIGNALING_PORT: u16 = 3001;

/// 송신(Egress) 워커 큐 사이즈.
/// 시그널링은 소형 제어 메시지만 다루므로 넉넉한 값이면 충분합니다.
pub const EGRESS_QUEUE_SIZE: usize = 256;

/// 좀비 세션 reaper 실행 주기 (10초)
pub const REAPER_INTERVAL_MS: u64 = 10_000;

/// 수신 트래픽이 끊긴 좀비 participant를 정리하기 위한 타임아웃 (60초)
pub const ZOMBIE_TIMEOUT_MS: u64 = 60_000;

/// 채팅 메시지 최대 길이 (bytes)
pub const MAX_MESSAGE_LENGTH: usize = 2_000;

/// remote description 적용 전까지 버퍼링할 candidate 최대 개수.
/// 초과분은 버림 — offer 없이 candidate만 쏟아지는 비정상 peer 방어
pub const MAX_PENDING_CANDIDATES: usize = 64;

// ----------------------------------------------------------------------------
// 콘솔 (클라이언트) 측
// ----------------------------------------------------------------------------

/// 공유 소스 기본 재생 볼륨
pub const DEFAULT_SOURCE_GAIN: f32 = 1.0;

/// 누군가 송신 중일 때 공유 소스에 적용하는 덕킹 배율
pub const DUCK_GAIN: f32 = 0.2;

/// 시그널링 재접속 최대 시도 횟수
pub const RECONNECT_MAX_ATTEMPTS: u32 = 5;

/// 재접속 백오프 기본 지연 (지수 증가의 초항, 밀리초)
pub const RECONNECT_BASE_DELAY_MS: u64 = 500;

// ----------------------------------------------------------------------------
// 채널 키 판별 (mesh vs direct-dial)
// ----------------------------------------------------------------------------

/// '+' 없이도 direct-dial로 간주하는 최소 숫자 길이
pub const DIRECT_DIAL_MIN_DIGITS: usize = 8;

/// 스테이션 디렉터리 검색 결과 상한
pub const STATION_SEARCH_LIMIT: usize = 10;
