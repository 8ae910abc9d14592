// author: kodeholic (powered by Claude)

pub mod config;
pub mod console;
pub mod core;
pub mod dial;
pub mod error;
pub mod http;
pub mod protocol;
pub mod reaper;
pub mod utils;

use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::core::{ChannelRegistry, ParticipantHub};
use crate::http::HttpState;
use crate::protocol::{ws_handler, AppState};

/// CLI에서 주입되는 런타임 설정
/// - 기본값은 config.rs 상수
pub struct ServerArgs {
    pub port: u16,
}

impl Default for ServerArgs {
    fn default() -> Self {
        Self { port: config::SIGNALING_PORT }
    }
}

pub async fn run_server(args: ServerArgs) {
    let roster   = Arc::new(ParticipantHub::new());
    let registry = Arc::new(ChannelRegistry::new());

    // 좀비 세션 자동 종료 태스크
    tokio::spawn(reaper::run_zombie_reaper(
        Arc::clone(&roster),
        Arc::clone(&registry),
    ));

    let app_state = AppState {
        roster:   Arc::clone(&roster),
        registry: Arc::clone(&registry),
    };

    let http_state = HttpState::new(Arc::clone(&roster), Arc::clone(&registry));

    let rest_router = Router::new()
        .route("/status",          get(http::server_status))
        .route("/channels",        get(http::list_channels))
        .route("/channels/{key}",  get(http::get_channel))
        .with_state(http_state);

    // CORS — 개발/운영 모두 전체 허용 (콘솔 클라이언트 로컬 접속)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(app_state)
        .merge(rest_router)
        .layer(cors);

    let addr     = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr).await.unwrap();

    info!("[cerebro] Signaling Relay on ws://{}", addr);
    axum::serve(listener, app).await.unwrap();
}
