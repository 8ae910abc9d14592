// author: kodeholic (powered by Claude)
// ChannelRegistry — 채널 프레즌스의 단일 소유자
//
// forward index : channel_key → ChannelEntry(members, last_activity)
// reverse index : participant → channel_key
//
// 두 인덱스는 하나의 RwLock 아래에서만 변경되므로 불일치 상태가
// 외부에 관측될 수 없다. 모든 멤버십 변경은 join/leave로만 가능.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use tracing::trace;

use serde::{Deserialize, Serialize};

use crate::utils::current_timestamp;

/// join 결과 — 합류한 채널과 합류 직후 멤버 수
#[derive(Debug, Clone, PartialEq)]
pub struct JoinInfo {
    pub channel_key: String,
    pub member_count: usize,
}

/// listActive() 스냅샷 아이템. 와이어(scan-results)와 REST 양쪽에서 사용.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScanEntry {
    pub channel_key: String,
    pub member_count: usize,
    pub last_activity: u64,
}

struct ChannelEntry {
    members: HashSet<String>,
    last_activity: u64,
}

#[derive(Default)]
struct Indices {
    channels: HashMap<String, ChannelEntry>,
    by_participant: HashMap<String, String>,
}

pub struct ChannelRegistry {
    inner: RwLock<Indices>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        trace!("Initializing ChannelRegistry");
        Self { inner: RwLock::new(Indices::default()) }
    }

    /// 채널 합류. 이미 다른 채널 소속이면 먼저 묵시적으로 떠난다.
    /// 채널 레코드는 첫 join에서 생성된다.
    pub fn join(&self, participant: &str, channel_key: &str) -> JoinInfo {
        let mut inner = self.inner.write().unwrap();
        Self::detach(&mut inner, participant);

        let entry = inner
            .channels
            .entry(channel_key.to_string())
            .or_insert_with(|| ChannelEntry {
                members: HashSet::new(),
                last_activity: current_timestamp(),
            });
        entry.members.insert(participant.to_string());
        entry.last_activity = current_timestamp();
        let member_count = entry.members.len();

        inner
            .by_participant
            .insert(participant.to_string(), channel_key.to_string());

        trace!("join: {} -> {} ({} members)", participant, channel_key, member_count);
        JoinInfo { channel_key: channel_key.to_string(), member_count }
    }

    /// 현재 채널에서 제거. 소속이 없으면 no-op이며 None 반환.
    /// 마지막 멤버가 떠나면 채널 레코드도 삭제된다.
    pub fn leave(&self, participant: &str) -> Option<String> {
        let mut inner = self.inner.write().unwrap();
        let left = Self::detach(&mut inner, participant);
        if let Some(key) = &left {
            trace!("leave: {} <- {}", participant, key);
        }
        left
    }

    /// 채널 멤버 스냅샷. 없는 채널이면 빈 집합.
    pub fn members_of(&self, channel_key: &str) -> HashSet<String> {
        self.inner
            .read()
            .unwrap()
            .channels
            .get(channel_key)
            .map(|e| e.members.clone())
            .unwrap_or_default()
    }

    /// participant가 소속된 채널 키 (릴레이의 voice-status/message 라우팅용)
    pub fn channel_of(&self, participant: &str) -> Option<String> {
        self.inner.read().unwrap().by_participant.get(participant).cloned()
    }

    /// 비어있지 않은 채널 전체 스냅샷.
    /// 정렬: 멤버 수 내림차순 → 채널 키 오름차순 (스캔 UI용 결정적 순서)
    pub fn list_active(&self) -> Vec<ScanEntry> {
        let inner = self.inner.read().unwrap();
        let mut list: Vec<ScanEntry> = inner
            .channels
            .iter()
            .map(|(key, e)| ScanEntry {
                channel_key: key.clone(),
                member_count: e.members.len(),
                last_activity: e.last_activity,
            })
            .collect();
        list.sort_by(|a, b| {
            b.member_count
                .cmp(&a.member_count)
                .then_with(|| a.channel_key.cmp(&b.channel_key))
        });
        list
    }

    /// 활동 시각 갱신. 없는 채널이면 no-op.
    pub fn touch(&self, channel_key: &str) {
        let mut inner = self.inner.write().unwrap();
        if let Some(entry) = inner.channels.get_mut(channel_key) {
            entry.last_activity = current_timestamp();
        }
    }

    /// 현재 채널 수 (REST status용)
    pub fn channel_count(&self) -> usize {
        self.inner.read().unwrap().channels.len()
    }

    /// 채널 멤버 수. 없는 채널이면 0.
    pub fn member_count(&self, channel_key: &str) -> usize {
        self.inner
            .read()
            .unwrap()
            .channels
            .get(channel_key)
            .map(|e| e.members.len())
            .unwrap_or(0)
    }

    /// 채널 상세 조회 (REST용): (멤버 목록, last_activity)
    pub fn detail_of(&self, channel_key: &str) -> Option<(Vec<String>, u64)> {
        let inner = self.inner.read().unwrap();
        inner.channels.get(channel_key).map(|e| {
            let mut members: Vec<String> = e.members.iter().cloned().collect();
            members.sort();
            (members, e.last_activity)
        })
    }

    /// 두 인덱스에서 participant를 제거하고, 비게 된 채널은 삭제.
    /// write lock을 이미 잡은 상태에서만 호출.
    fn detach(inner: &mut Indices, participant: &str) -> Option<String> {
        let key = inner.by_participant.remove(participant)?;
        if let Some(entry) = inner.channels.get_mut(&key) {
            entry.members.remove(participant);
            if entry.members.is_empty() {
                inner.channels.remove(&key);
            }
        }
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_creates_channel_and_counts() {
        let reg = ChannelRegistry::new();
        let info = reg.join("a", "101.5");
        assert_eq!(info.channel_key, "101.5");
        assert_eq!(info.member_count, 1);
        let info = reg.join("b", "101.5");
        assert_eq!(info.member_count, 2);
    }

    #[test]
    fn leave_without_membership_is_none() {
        let reg = ChannelRegistry::new();
        assert_eq!(reg.leave("ghost"), None);
    }

    #[test]
    fn rejoin_implicitly_leaves_previous_channel() {
        let reg = ChannelRegistry::new();
        reg.join("a", "101.5");
        reg.join("a", "88.0");
        assert_eq!(reg.channel_of("a").as_deref(), Some("88.0"));
        // 이전 채널은 비어서 삭제됨
        assert!(reg.members_of("101.5").is_empty());
        assert_eq!(reg.channel_count(), 1);
    }

    #[test]
    fn empty_channel_is_deleted() {
        let reg = ChannelRegistry::new();
        reg.join("a", "CH");
        reg.join("b", "CH");
        reg.leave("a");
        assert_eq!(reg.member_count("CH"), 1);
        reg.leave("b");
        assert_eq!(reg.channel_count(), 0);
        assert!(reg.list_active().is_empty());
    }

    #[test]
    fn touch_unknown_channel_is_noop() {
        let reg = ChannelRegistry::new();
        reg.touch("nope");
        assert_eq!(reg.channel_count(), 0);
    }

    #[test]
    fn list_active_ordering() {
        let reg = ChannelRegistry::new();
        reg.join("a", "zz");
        reg.join("b", "aa");
        reg.join("c", "aa");
        reg.join("d", "mm");
        let list = reg.list_active();
        let keys: Vec<&str> = list.iter().map(|e| e.channel_key.as_str()).collect();
        // aa(2명) 먼저, 이후 1명 채널은 키 오름차순
        assert_eq!(keys, vec!["aa", "mm", "zz"]);
    }

    #[test]
    fn indices_stay_consistent() {
        let reg = ChannelRegistry::new();
        let ops: &[(&str, Option<&str>)] = &[
            ("a", Some("1")),
            ("b", Some("1")),
            ("a", Some("2")),
            ("b", None),
            ("c", Some("2")),
            ("a", None),
            ("c", Some("3")),
        ];
        for (p, op) in ops {
            match op {
                Some(key) => {
                    reg.join(p, key);
                }
                None => {
                    reg.leave(p);
                }
            }
            // 모든 채널 멤버의 역인덱스가 해당 채널을 가리켜야 한다
            for entry in reg.list_active() {
                for member in reg.members_of(&entry.channel_key) {
                    assert_eq!(reg.channel_of(&member).as_deref(), Some(entry.channel_key.as_str()));
                }
                assert!(entry.member_count > 0, "빈 채널이 남아있으면 안 됩니다");
            }
        }
    }
}
