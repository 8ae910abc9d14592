// author: kodeholic (powered by Gemini)

use clap::Parser;

use cerebro::{config, run_server, ServerArgs};

#[derive(Parser)]
#[command(name = "cbserver", about = "cerebro signaling relay")]
struct Cli {
    /// WS 시그널링 + REST 포트
    #[arg(long, default_value_t = config::SIGNALING_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() {
    // 환경 변수 기반 로깅 초기화 (기본값: info)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    run_server(ServerArgs { port: cli.port }).await;
}
