// author: kodeholic (powered by Claude)

use cerebro::core::{ChannelRegistry, ParticipantHub};
use cerebro::protocol::{ws_handler, AppState};
use futures_util::{SinkExt, StreamExt};
use portpicker::pick_unused_port;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};

// ----------------------------------------------------------------------------
// [테스트 헬퍼]
// ----------------------------------------------------------------------------

async fn spawn_test_server() -> String {
    spawn_test_server_with_state().await.0
}

/// 서버 내부 상태(roster/registry)를 검사해야 하는 시나리오용
async fn spawn_test_server_with_state() -> (String, AppState) {
    let port = pick_unused_port().expect("사용 가능한 포트를 찾을 수 없습니다.");
    let addr = format!("127.0.0.1:{}", port);

    let app_state = AppState {
        roster:   Arc::new(ParticipantHub::new()),
        registry: Arc::new(ChannelRegistry::new()),
    };

    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(app_state.clone());

    let listener = TcpListener::bind(&addr).await.unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    (addr, app_state)
}

type WsTx = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;
type WsRx = futures_util::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
>;

/// 접속 + ready 수신까지. 릴레이가 발급한 participant id를 돌려준다.
async fn connect(addr: &str) -> (WsTx, WsRx, String) {
    let (ws, _) = connect_async(format!("ws://{}/ws", addr)).await.expect("WS 연결 실패");
    let (tx, mut rx) = ws.split();
    let ready = recv(&mut rx).await;
    assert_type(&ready, "ready", "READY");
    let pid = ready["participant"].as_str().expect("participant id 없음").to_string();
    (tx, rx, pid)
}

async fn send(tx: &mut WsTx, payload: Value) {
    tx.send(Message::Text(payload.to_string().into())).await.expect("전송 실패");
}

async fn recv(rx: &mut WsRx) -> Value {
    let next = tokio::time::timeout(tokio::time::Duration::from_secs(5), async {
        loop {
            match rx.next().await.expect("수신 실패").expect("메시지 에러") {
                Message::Text(t) => return serde_json::from_str::<Value>(&t).expect("JSON 파싱 실패"),
                _ => continue,
            }
        }
    });
    next.await.expect("수신 타임아웃")
}

fn assert_type(packet: &Value, expected: &str, label: &str) {
    assert_eq!(
        packet["type"].as_str().unwrap_or("?"), expected,
        "{}: 기대 type={}, 실제={}", label, expected, packet["type"]
    );
}

/// join-channel 전송 + joined/channel-update 소비
async fn join(tx: &mut WsTx, rx: &mut WsRx, channel_key: &str) -> Value {
    send(tx, json!({ "type": "join-channel", "channel_key": channel_key })).await;
    let joined = recv(rx).await;
    assert_type(&joined, "joined", "JOINED");
    let update = recv(rx).await;
    assert_type(&update, "channel-update", "CHANNEL_UPDATE");
    joined
}

// ----------------------------------------------------------------------------
// [시나리오 1] 접속 → ready (릴레이 발급 id)
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_ready_assigns_participant_id() {
    let addr = spawn_test_server().await;
    let (_tx, _rx, pid) = connect(&addr).await;
    assert!(pid.starts_with("p_"), "id 형식: {}", pid);
    assert_eq!(pid.len(), 2 + 10);
}

// ----------------------------------------------------------------------------
// [시나리오 2] A 합류 → B 합류 → B 퇴장 (프레즌스 전파)
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_presence_lifecycle() {
    let addr = spawn_test_server().await;
    let (mut a_tx, mut a_rx, _a_id) = connect(&addr).await;
    let (mut b_tx, mut b_rx, b_id) = connect(&addr).await;

    let joined = join(&mut a_tx, &mut a_rx, "101.5").await;
    assert_eq!(joined["channel_key"], "101.5");
    assert_eq!(joined["member_count"], 1);

    // B 합류 → B는 member_count 2, A는 participant-joined + channel-update
    let joined_b = join(&mut b_tx, &mut b_rx, "101.5").await;
    assert_eq!(joined_b["member_count"], 2);

    let pj = recv(&mut a_rx).await;
    assert_type(&pj, "participant-joined", "A가 본 B 합류");
    assert_eq!(pj["participant"], b_id.as_str());
    let update = recv(&mut a_rx).await;
    assert_eq!(update["member_count"], 2);

    // B 연결 종료 → A는 participant-left + channel-update(1), 채널은 유지
    drop(b_tx);
    drop(b_rx);

    let pl = recv(&mut a_rx).await;
    assert_type(&pl, "participant-left", "A가 본 B 퇴장");
    assert_eq!(pl["participant"], b_id.as_str());
    let update = recv(&mut a_rx).await;
    assert_eq!(update["member_count"], 1);
}

// ----------------------------------------------------------------------------
// [시나리오 3] signal 라우팅 — byte 동일 전달 + 부재 대상 조용히 드랍
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_signal_routing_verbatim_and_silent_drop() {
    let addr = spawn_test_server().await;
    let (mut a_tx, mut a_rx, a_id) = connect(&addr).await;
    let (mut b_tx, mut b_rx, b_id) = connect(&addr).await;

    join(&mut a_tx, &mut a_rx, "101.5").await;
    join(&mut b_tx, &mut b_rx, "101.5").await;
    recv(&mut a_rx).await; // participant-joined
    recv(&mut a_rx).await; // channel-update

    // 부재 대상 — 에러 없이 드랍
    send(&mut a_tx, json!({
        "type": "signal", "target": "p_ghost12345",
        "payload": { "type": "offer", "sdp": "v=0" }
    }))
    .await;

    // 실재 대상 — payload 그대로 도착
    let payload = json!({ "type": "offer", "sdp": "v=0\r\nm=audio 9\r\n", "extra": [1, 2, 3] });
    send(&mut a_tx, json!({ "type": "signal", "target": b_id, "payload": payload })).await;

    let fwd = recv(&mut b_rx).await;
    assert_type(&fwd, "signal", "B 수신");
    assert_eq!(fwd["sender"], a_id.as_str());
    assert_eq!(fwd["payload"], payload, "payload는 무변형 전달");

    // A에게는 (드랍 건 포함) 어떤 에러도 돌아오지 않았음을 확인 —
    // scan 요청의 응답이 A의 다음 수신 메시지여야 한다
    send(&mut a_tx, json!({ "type": "scan-channels" })).await;
    let scan = recv(&mut a_rx).await;
    assert_type(&scan, "scan-results", "A의 다음 수신");
}

// ----------------------------------------------------------------------------
// [시나리오 4] voice-status는 같은 채널에만 전파
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_voice_status_channel_isolation() {
    let addr = spawn_test_server().await;
    let (mut a_tx, mut a_rx, a_id) = connect(&addr).await;
    let (mut b_tx, mut b_rx, _b_id) = connect(&addr).await;
    let (mut c_tx, mut c_rx, _c_id) = connect(&addr).await;

    join(&mut a_tx, &mut a_rx, "101.5").await;
    join(&mut b_tx, &mut b_rx, "101.5").await;
    recv(&mut a_rx).await; // participant-joined
    recv(&mut a_rx).await; // channel-update
    join(&mut c_tx, &mut c_rx, "27.105").await;

    send(&mut a_tx, json!({ "type": "voice-status", "transmitting": true })).await;

    let vs = recv(&mut b_rx).await;
    assert_type(&vs, "voice-status", "같은 채널 B");
    assert_eq!(vs["participant"], a_id.as_str());
    assert_eq!(vs["transmitting"], true);

    // 다른 채널 C에는 오지 않는다 — C의 다음 수신은 scan 응답
    send(&mut c_tx, json!({ "type": "scan-channels" })).await;
    let scan = recv(&mut c_rx).await;
    assert_type(&scan, "scan-results", "C의 다음 수신");
}

// ----------------------------------------------------------------------------
// [시나리오 5] 채팅 — 릴레이 발급 id/timestamp, 발신자 포함 전파
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_chat_broadcast_with_relay_metadata() {
    let addr = spawn_test_server().await;
    let (mut a_tx, mut a_rx, a_id) = connect(&addr).await;
    let (mut b_tx, mut b_rx, _b_id) = connect(&addr).await;

    join(&mut a_tx, &mut a_rx, "101.5").await;
    join(&mut b_tx, &mut b_rx, "101.5").await;
    recv(&mut a_rx).await;
    recv(&mut a_rx).await;

    send(&mut a_tx, json!({ "type": "message", "text": "cq cq de p_a" })).await;

    for rx in [&mut a_rx, &mut b_rx] {
        let msg = recv(rx).await;
        assert_type(&msg, "chat-message", "채팅 전파");
        assert_eq!(msg["sender"], a_id.as_str());
        assert_eq!(msg["text"], "cq cq de p_a");
        assert!(msg["id"].as_str().unwrap().starts_with("msg_"));
        assert!(msg["timestamp"].as_u64().unwrap() > 0);
    }

    // 빈 메시지는 발신자에게만 에러로 반환
    send(&mut a_tx, json!({ "type": "message", "text": "   " })).await;
    let err = recv(&mut a_rx).await;
    assert_type(&err, "error", "빈 채팅");
    assert_eq!(err["code"].as_u64().unwrap(), 3000);
}

// ----------------------------------------------------------------------------
// [시나리오 6] 채널 밖 메시지 → not-in-channel 에러
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_message_outside_channel() {
    let addr = spawn_test_server().await;
    let (mut tx, mut rx, _pid) = connect(&addr).await;

    send(&mut tx, json!({ "type": "message", "text": "anyone?" })).await;
    let err = recv(&mut rx).await;
    assert_type(&err, "error", "채널 밖 채팅");
    assert_eq!(err["code"].as_u64().unwrap(), 2004);
}

// ----------------------------------------------------------------------------
// [시나리오 7] scan-results 정렬 — 멤버 수 내림차순, 키 오름차순
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_scan_ordering() {
    let addr = spawn_test_server().await;
    let (mut a_tx, mut a_rx, _a) = connect(&addr).await;
    let (mut b_tx, mut b_rx, _b) = connect(&addr).await;
    let (mut c_tx, mut c_rx, _c) = connect(&addr).await;

    join(&mut a_tx, &mut a_rx, "101.5").await;
    join(&mut b_tx, &mut b_rx, "101.5").await;
    recv(&mut a_rx).await;
    recv(&mut a_rx).await;
    join(&mut c_tx, &mut c_rx, "27.105").await;

    send(&mut c_tx, json!({ "type": "scan-channels" })).await;
    let scan = recv(&mut c_rx).await;
    assert_type(&scan, "scan-results", "SCAN");

    let channels = scan["channels"].as_array().unwrap();
    assert_eq!(channels.len(), 2);
    assert_eq!(channels[0]["channel_key"], "101.5");
    assert_eq!(channels[0]["member_count"], 2);
    assert_eq!(channels[1]["channel_key"], "27.105");
    assert_eq!(channels[1]["member_count"], 1);
}

// ----------------------------------------------------------------------------
// [시나리오 8] 재합류 시 묵시적 이탈 — 이전 채널 인원 정정
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_rejoin_implicitly_leaves() {
    let addr = spawn_test_server().await;
    let (mut a_tx, mut a_rx, _a) = connect(&addr).await;
    let (mut b_tx, mut b_rx, _b) = connect(&addr).await;

    join(&mut a_tx, &mut a_rx, "101.5").await;
    join(&mut b_tx, &mut b_rx, "101.5").await;
    recv(&mut a_rx).await;
    recv(&mut a_rx).await;

    // B가 다른 채널로 이동
    let joined = join(&mut b_tx, &mut b_rx, "27.105").await;
    assert_eq!(joined["member_count"], 1);

    // scan으로 양쪽 채널 인원 확인
    send(&mut b_tx, json!({ "type": "scan-channels" })).await;
    let scan = recv(&mut b_rx).await;
    let channels = scan["channels"].as_array().unwrap();
    let find = |key: &str| {
        channels.iter().find(|c| c["channel_key"] == key).map(|c| c["member_count"].as_u64().unwrap())
    };
    assert_eq!(find("101.5"), Some(1));
    assert_eq!(find("27.105"), Some(1));
}

// ----------------------------------------------------------------------------
// [시나리오 9] 알 수 없는 이벤트 → error 1005, 연결은 유지
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_unknown_event_keeps_connection() {
    let addr = spawn_test_server().await;
    let (mut tx, mut rx, _pid) = connect(&addr).await;

    send(&mut tx, json!({ "type": "warp-drive", "factor": 9 })).await;
    let err = recv(&mut rx).await;
    assert_type(&err, "error", "미지 이벤트");
    assert_eq!(err["code"].as_u64().unwrap(), 1005);

    // 연결은 살아있다
    let joined = join(&mut tx, &mut rx, "101.5").await;
    assert_eq!(joined["member_count"], 1);
}

// ----------------------------------------------------------------------------
// [시나리오 10] ping 프레임도 생존 신호 — 수신 전용 클라이언트의 last_seen 갱신
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_ping_frame_refreshes_liveness() {
    let (addr, state) = spawn_test_server_with_state().await;
    let (mut tx, _rx, _pid) = connect(&addr).await;

    // 이벤트 없이 시간만 흘려보낸 뒤 ping 한 번
    tokio::time::sleep(tokio::time::Duration::from_millis(300)).await;
    tx.send(Message::Ping(vec![1].into())).await.expect("ping 전송 실패");
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    // ping 직후 기준으로는 좀비가 아니어야 한다 — 접속 시점(400ms 전)이
    // 아니라 마지막 수신 프레임이 기준점
    assert!(
        state.roster.find_zombies(250).is_empty(),
        "ping만 보내는 클라이언트가 좀비로 분류됨"
    );
}
