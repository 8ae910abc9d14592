// author: kodeholic (powered by Claude)
// ParticipantHub — WS 연결 라우팅 테이블
//
// participant id는 릴레이가 연결 시 발급하는 일회성 식별자.
// 인증/계정 개념 없음 — 연결이 곧 신원이다.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::utils::{current_timestamp, random_id};

/// 연결별 송신자 타입 (직렬화된 ServerEvent JSON)
pub type EgressTx = mpsc::Sender<String>;

// ----------------------------------------------------------------------------
// [Participant] 연결 시 등록, WS 종료 시 제거
// ----------------------------------------------------------------------------

pub struct Participant {
    pub tx: EgressTx,
    pub connected_at: u64,
    pub last_seen: AtomicU64, // 마지막 수신 시간 (좀비 세션 감지용)
}

impl Participant {
    pub fn new(tx: EgressTx) -> Self {
        let now = current_timestamp();
        Self { tx, connected_at: now, last_seen: AtomicU64::new(now) }
    }

    pub fn touch(&self) {
        self.last_seen.store(current_timestamp(), Ordering::Relaxed);
    }
}

// ----------------------------------------------------------------------------
// [ParticipantHub] 전역 라우팅 테이블
// ----------------------------------------------------------------------------

pub struct ParticipantHub {
    participants: RwLock<HashMap<String, Arc<Participant>>>,
}

impl ParticipantHub {
    pub fn new() -> Self {
        trace!("Initializing ParticipantHub");
        Self { participants: RwLock::new(HashMap::new()) }
    }

    /// 신규 연결 등록 — 릴레이가 발급한 id를 반환.
    /// 생성 id는 연결 수명과 함께하는 ephemeral 값이다.
    pub fn register(&self, tx: EgressTx) -> (String, Arc<Participant>) {
        let participant = Arc::new(Participant::new(tx));
        let mut map = self.participants.write().unwrap();
        // 충돌 시 재발급 (10자리 영숫자라 사실상 발생하지 않음)
        let id = loop {
            let candidate = random_id("p", 10);
            if !map.contains_key(&candidate) {
                break candidate;
            }
        };
        map.insert(id.clone(), Arc::clone(&participant));
        trace!("Participant registered: {}", id);
        (id, participant)
    }

    pub fn unregister(&self, id: &str) {
        self.participants.write().unwrap().remove(id);
        trace!("Participant unregistered: {}", id);
    }

    pub fn get(&self, id: &str) -> Option<Arc<Participant>> {
        self.participants.read().unwrap().get(id).cloned()
    }

    /// 단일 대상 전송. 대상이 없거나 큐가 닫혔으면 false (조용히 드랍 — 재시도 없음).
    pub async fn send_to(&self, id: &str, packet_json: &str) -> bool {
        let participant = match self.get(id) {
            Some(p) => p,
            None => return false,
        };
        participant.tx.send(packet_json.to_string()).await.is_ok()
    }

    /// id 목록을 받아 각각의 tx로 패킷 전송
    /// exclude: 브로드캐스트에서 제외할 participant (발신자 본인 등)
    pub async fn broadcast_to(&self, ids: &HashSet<String>, packet_json: &str, exclude: Option<&str>) {
        let targets: Vec<Arc<Participant>> = {
            let map = self.participants.read().unwrap();
            ids.iter()
                .filter(|id| exclude.map_or(true, |ex| ex != id.as_str()))
                .filter_map(|id| map.get(id).cloned())
                .collect()
        };

        for participant in targets {
            if participant.tx.send(packet_json.to_string()).await.is_err() {
                warn!("Broadcast failed: rx closed");
            }
        }
    }

    /// 현재 접속 수
    pub fn count(&self) -> usize {
        self.participants.read().unwrap().len()
    }

    /// 좀비 세션 목록 반환 (last_seen 기준)
    pub fn find_zombies(&self, timeout_ms: u64) -> Vec<String> {
        let now = current_timestamp();
        self.participants
            .read()
            .unwrap()
            .iter()
            .filter(|(_, p)| now.saturating_sub(p.last_seen.load(Ordering::Relaxed)) >= timeout_ms)
            .map(|(id, _)| id.clone())
            .collect()
    }
}
