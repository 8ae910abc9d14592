// author: kodeholic (powered by Claude)
// 시그널링 페이로드 — offer / answer / candidate
//
// 릴레이는 이 타입을 모른다. signal 이벤트의 payload는 릴레이에서
// raw serde_json::Value로 왕복하고, 해석은 콘솔(coordinator)에서만 한다.

use serde::{Deserialize, Serialize};

use crate::error::{CerebroError, CerebroResult};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalPayload {
    Offer { sdp: String },
    Answer { sdp: String },
    Candidate { candidate: String },
}

impl SignalPayload {
    /// 릴레이에서 받은 opaque Value → 시그널 해석
    pub fn from_value(value: serde_json::Value) -> CerebroResult<Self> {
        serde_json::from_value(value).map_err(|e| CerebroError::InvalidPayload(e.to_string()))
    }

    /// signal 이벤트에 실을 opaque Value로 변환
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SignalPayload::Offer { .. } => "offer",
            SignalPayload::Answer { .. } => "answer",
            SignalPayload::Candidate { .. } => "candidate",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_through_opaque_value() {
        let offer = SignalPayload::Offer { sdp: "v=0\r\n".into() };
        let value = offer.to_value();
        assert_eq!(value["type"], "offer");
        assert_eq!(SignalPayload::from_value(value).unwrap(), offer);
    }

    #[test]
    fn rejects_unknown_tag() {
        let err = SignalPayload::from_value(json!({ "type": "renegotiate" }));
        assert!(matches!(err, Err(CerebroError::InvalidPayload(_))));
    }
}
