// author: kodeholic (powered by Claude)
//
// cbadmin — cerebro 운영 관리 CLI
//
// 사용법:
//   cbadmin [--host HOST] [--port PORT] <COMMAND>
//
// 조회 명령
//   cbadmin status                  서버 상태 요약 (uptime, 연결/채널 수)
//   cbadmin channels                활성 채널 테이블 (scan 정렬과 동일)
//   cbadmin channels <channel_key>  채널 상세 (멤버 목록)

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;
use tabled::{Table, Tabled};

// ----------------------------------------------------------------------------
// [CLI 정의]
// ----------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name    = "cbadmin",
    about   = "cerebro 운영 관리 CLI",
    version,
)]
struct Cli {
    /// 서버 호스트
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// 서버 포트 (WS/HTTP 공용)
    #[arg(long, default_value_t = 3001)]
    port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 서버 상태 요약 (uptime, participant/채널 수)
    Status,

    /// 채널 목록 또는 상세
    Channels {
        /// channel_key 지정 시 상세 보기
        channel_key: Option<String>,
    },
}

// ----------------------------------------------------------------------------
// [응답 타입] — http.rs 와 대응
// ----------------------------------------------------------------------------

#[derive(Deserialize)]
struct ServerStatus {
    uptime_secs:       u64,
    participant_count: usize,
    channel_count:     usize,
}

#[derive(Deserialize)]
struct ChannelSummary {
    channel_key:   String,
    member_count:  usize,
    last_activity: u64,
}

// 타임스탬프 렌더링용 표시 타입 (Tabled 적용)
#[derive(Tabled)]
struct ChannelSummaryDisplay {
    #[tabled(rename = "CHANNEL")]
    channel_key:   String,
    #[tabled(rename = "MEMBERS")]
    member_count:  usize,
    #[tabled(rename = "LAST ACTIVITY")]
    last_activity: String,
}

#[derive(Deserialize)]
struct ChannelDetail {
    channel_key:   String,
    member_count:  usize,
    last_activity: u64,
    members:       Vec<String>,
}

// ----------------------------------------------------------------------------
// [main]
// ----------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();
    let base = format!("http://{}:{}", cli.host, cli.port);

    let result = match &cli.command {
        Command::Status                            => cmd_status(&base),
        Command::Channels { channel_key: None }    => cmd_channels(&base),
        Command::Channels { channel_key: Some(k) } => cmd_channel_detail(&base, k),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "ERROR:".red().bold(), e);
        std::process::exit(1);
    }
}

// ----------------------------------------------------------------------------
// [커맨드 구현]
// ----------------------------------------------------------------------------

fn cmd_status(base: &str) -> Result<(), Box<dyn std::error::Error>> {
    let s: ServerStatus = get_json(&format!("{}/status", base))?;

    let hours   = s.uptime_secs / 3600;
    let minutes = (s.uptime_secs % 3600) / 60;
    let secs    = s.uptime_secs % 60;

    println!();
    println!("{}", "  cerebro Relay Status".bold().cyan());
    println!("  {}", "─".repeat(36).dimmed());
    println!("  {:16} {}",
        "Uptime:".bold(),
        format!("{}h {}m {}s", hours, minutes, secs).green()
    );
    println!("  {:16} {}", "Participants:".bold(), s.participant_count.to_string().yellow());
    println!("  {:16} {}", "Channels:".bold(),     s.channel_count.to_string().yellow());
    println!();
    Ok(())
}

fn cmd_channels(base: &str) -> Result<(), Box<dyn std::error::Error>> {
    let channels: Vec<ChannelSummary> = get_json(&format!("{}/channels", base))?;

    if channels.is_empty() {
        println!("{}", "  활성 채널 없음".dimmed());
        return Ok(());
    }

    let display: Vec<ChannelSummaryDisplay> = channels
        .iter()
        .map(|ch| ChannelSummaryDisplay {
            channel_key:   ch.channel_key.clone(),
            member_count:  ch.member_count,
            last_activity: format_ts(&ch.last_activity),
        })
        .collect();

    println!();
    println!("{}", Table::new(&display).to_string());
    println!("  {} channel(s)", channels.len());
    println!();
    Ok(())
}

fn cmd_channel_detail(base: &str, channel_key: &str) -> Result<(), Box<dyn std::error::Error>> {
    let ch: ChannelDetail = get_json(&format!("{}/channels/{}", base, channel_key))?;

    println!();
    println!("{}", format!("  Channel: {}", ch.channel_key).bold().cyan());
    println!("  {}", "─".repeat(36).dimmed());
    println!("  {:16} {}", "Members:".bold(),       ch.member_count.to_string().yellow());
    println!("  {:16} {}", "Last Activity:".bold(), format_ts(&ch.last_activity));

    println!();
    println!("{}", "  Members".bold());
    if ch.members.is_empty() {
        println!("    {}", "(없음)".dimmed());
    } else {
        for m in &ch.members {
            println!("    · {}", m.yellow());
        }
    }

    println!();
    Ok(())
}

// ----------------------------------------------------------------------------
// [공통 유틸]
// ----------------------------------------------------------------------------

/// GET 요청 + JSON 역직렬화
fn get_json<T: for<'de> serde::Deserialize<'de>>(url: &str) -> Result<T, Box<dyn std::error::Error>> {
    let resp = reqwest::blocking::get(url)?;
    let status = resp.status();
    if !status.is_success() {
        let body: serde_json::Value = resp.json().unwrap_or_default();
        let msg = body["error"].as_str().unwrap_or("unknown error");
        return Err(format!("[{}] {}", status, msg).into());
    }
    Ok(resp.json()?)
}

/// Unix millis → "YYYY-MM-DD HH:MM:SS UTC"
fn format_ts(ms: &u64) -> String {
    if *ms == 0 {
        return "-".to_string();
    }
    match DateTime::<Utc>::from_timestamp_millis(*ms as i64) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "-".to_string(),
    }
}
