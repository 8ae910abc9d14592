// author: kodeholic (powered by Gemini)
// dial — 외부 협력자 경계
//
// 채널 키의 모양이 경로를 결정한다:
//   - "101.5" 같은 주파수형 키  -> mesh (릴레이 + peer 협상)
//   - "+821012345678" / 긴 숫자열 -> 전화 게이트웨이 직통 다이얼
// 두 경로는 상호 배타 — 같은 키가 두 경로를 동시에 타는 일은 없다.
//
// StationDirectory는 공유 소스 descriptor를 채우는 용도로만 쓰이고
// 코어는 이 결과를 검사하지 않는다.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config;
use crate::error::{CerebroError, CerebroResult};
use crate::protocol::event::{SourceDescriptor, SourceKind};

// ----------------------------------------------------------------------------
// [경로 판정]
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPath {
    /// 릴레이 중재 mesh — 주파수형 키
    Mesh,
    /// 전화 게이트웨이 직통 — 전화번호형 키
    DirectDial,
}

impl ChannelPath {
    pub fn for_key(key: &str) -> Self {
        if is_direct_dial(key) {
            ChannelPath::DirectDial
        } else {
            ChannelPath::Mesh
        }
    }
}

/// 전화번호형 키 판정. '+' 접두이거나, '.' 없는 긴 숫자열이면 직통.
/// "101.5" 같은 주파수 표기는 '.' 때문에 항상 mesh로 떨어진다.
pub fn is_direct_dial(key: &str) -> bool {
    let key = key.trim();
    if key.starts_with('+') {
        return key.chars().skip(1).any(|c| c.is_ascii_digit());
    }
    if key.contains('.') {
        return false;
    }
    let digits = key.chars().filter(|c| c.is_ascii_digit()).count();
    digits >= config::DIRECT_DIAL_MIN_DIGITS && key.chars().all(|c| c.is_ascii_digit() || c == '-' || c == ' ')
}

/// 다이얼 가능한 형태로 정규화 — 선두 '+'만 남기고 숫자 외 문자 제거
pub fn normalize_number(raw: &str) -> String {
    let raw = raw.trim();
    let mut out = String::with_capacity(raw.len());
    if raw.starts_with('+') {
        out.push('+');
    }
    out.extend(raw.chars().filter(|c| c.is_ascii_digit()));
    out
}

// ----------------------------------------------------------------------------
// [VoiceGateway] 전화 게이트웨이 — 인터페이스만 소비
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    Accepted,
    Disconnected,
    Error(String),
}

/// 발신 통화 핸들. events가 닫히면 통화도 끝난 것.
#[derive(Debug)]
pub struct CallHandle {
    pub call_id: String,
    pub events:  mpsc::Receiver<CallEvent>,
}

#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// destination은 normalize_number를 거친 번호여야 한다
    async fn dial(&self, destination: &str, caller_id: &str) -> CerebroResult<CallHandle>;
}

// ----------------------------------------------------------------------------
// [StationDirectory] 방송국 검색 — 공유 소스 descriptor 공급용
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct StationInfo {
    pub name: String,
    #[serde(rename = "countrycode")]
    pub country_code: String,
    #[serde(default)]
    pub bitrate: u32,
    #[serde(rename = "url_resolved")]
    pub resolved_url: String,
}

impl StationInfo {
    pub fn to_descriptor(&self) -> SourceDescriptor {
        SourceDescriptor {
            kind: SourceKind::Stream,
            url:  Some(self.resolved_url.clone()),
            name: self.name.clone(),
        }
    }
}

#[async_trait]
pub trait StationDirectory: Send + Sync {
    async fn search(&self, query: &str) -> CerebroResult<Vec<StationInfo>>;
}

/// radio-browser 호환 HTTP 디렉터리
pub struct HttpStationDirectory {
    client:   reqwest::Client,
    base_url: String,
}

impl HttpStationDirectory {
    pub fn new(base_url: &str) -> Self {
        Self {
            client:   reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for HttpStationDirectory {
    fn default() -> Self {
        Self::new("https://de1.api.radio-browser.info")
    }
}

#[async_trait]
impl StationDirectory for HttpStationDirectory {
    async fn search(&self, query: &str) -> CerebroResult<Vec<StationInfo>> {
        let url = format!("{}/json/stations/search", self.base_url);
        debug!("station search: {}", query);
        let stations = self
            .client
            .get(&url)
            .query(&[
                ("name", query),
                ("limit", &config::STATION_SEARCH_LIMIT.to_string()),
                ("hidebroken", "true"),
            ])
            .send()
            .await
            .map_err(|e| CerebroError::DirectoryError(e.to_string()))?
            .json::<Vec<StationInfo>>()
            .await
            .map_err(|e| CerebroError::DirectoryError(e.to_string()))?;
        Ok(stations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_keys_take_the_mesh_path() {
        for key in ["101.5", "27.105", "446.00625", "ops-room", "1.9"] {
            assert_eq!(ChannelPath::for_key(key), ChannelPath::Mesh, "key={}", key);
        }
    }

    #[test]
    fn phone_shaped_keys_take_the_dial_path() {
        for key in ["+821012345678", "01012345678", "010-1234-5678", "+1 555 0100"] {
            assert_eq!(ChannelPath::for_key(key), ChannelPath::DirectDial, "key={}", key);
        }
    }

    #[test]
    fn short_digit_keys_are_still_mesh() {
        // 주파수를 점 없이 적은 짧은 숫자열은 직통으로 오판하지 않는다
        assert_eq!(ChannelPath::for_key("1015"), ChannelPath::Mesh);
        assert_eq!(ChannelPath::for_key("+"), ChannelPath::Mesh);
    }

    #[test]
    fn normalize_strips_formatting() {
        assert_eq!(normalize_number("+82 10-1234-5678"), "+821012345678");
        assert_eq!(normalize_number("010.1234.5678"), "01012345678");
    }

    struct LoopbackGateway;

    #[async_trait]
    impl VoiceGateway for LoopbackGateway {
        async fn dial(&self, destination: &str, caller_id: &str) -> CerebroResult<CallHandle> {
            if destination.is_empty() {
                return Err(CerebroError::GatewayError("empty destination".to_string()));
            }
            let (tx, rx) = mpsc::channel(4);
            tx.send(CallEvent::Accepted).await.ok();
            tx.send(CallEvent::Disconnected).await.ok();
            Ok(CallHandle { call_id: format!("call_{}", caller_id), events: rx })
        }
    }

    #[tokio::test]
    async fn gateway_call_lifecycle() {
        let gateway = LoopbackGateway;
        let number  = normalize_number("+82 10-1234-5678");
        let mut handle = gateway.dial(&number, "p_caller").await.unwrap();

        assert_eq!(handle.call_id, "call_p_caller");
        assert_eq!(handle.events.recv().await, Some(CallEvent::Accepted));
        assert_eq!(handle.events.recv().await, Some(CallEvent::Disconnected));
        assert_eq!(handle.events.recv().await, None, "통화 종료 후 채널 닫힘");
    }

    #[tokio::test]
    async fn gateway_rejects_empty_destination() {
        let gateway = LoopbackGateway;
        let err = gateway.dial("", "p_caller").await.unwrap_err();
        assert!(matches!(err, CerebroError::GatewayError(_)));
    }

    #[test]
    fn station_deserializes_radio_browser_shape() {
        let json = r#"{
            "name": "Jazz FM",
            "countrycode": "GB",
            "bitrate": 128,
            "url_resolved": "https://stream.example/jazz"
        }"#;
        let station: StationInfo = serde_json::from_str(json).unwrap();
        assert_eq!(station.country_code, "GB");

        let descriptor = station.to_descriptor();
        assert_eq!(descriptor.kind, SourceKind::Stream);
        assert_eq!(descriptor.url.as_deref(), Some("https://stream.example/jazz"));
        assert_eq!(descriptor.name, "Jazz FM");
    }
}
