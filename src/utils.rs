// author: kodeholic (powered by Gemini)

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// 현재 시간을 밀리초 단위의 Unix Timestamp로 반환합니다.
/// 에러 발생 시 시스템 패닉 대신 0(기본값)을 반환하여 장애를 방어합니다.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// `{prefix}_{영숫자 len자리}` 형식의 랜덤 식별자 생성
/// participant id, 채팅 메시지 id 등 릴레이가 발급하는 일회성 id 공용
pub fn random_id(prefix: &str, len: usize) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect();
    format!("{}_{}", prefix, suffix)
}
