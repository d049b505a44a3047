// 命令行入口
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use research_relay_lib::client::{
    ActivityEntry, Document, DocumentStatus, HttpTrackSource, ResearchClient, Sequencer,
    SessionListener,
};
use research_relay_lib::config::Config;
use research_relay_lib::logger;
use research_relay_lib::models::CompanyInfo;
use research_relay_lib::resilience::{CancellationToken, TimeoutConfig, TimeoutController};
use research_relay_lib::server;
use research_relay_lib::stream::events::ReportKind;

#[derive(Debug, Parser)]
#[command(name = "research-relay", version, about = "Deep research SSE relay")]
struct Cli {
    /// 配置文件路径，默认 ~/.research-relay/config.yaml
    #[arg(long, global = true, env = "RESEARCH_RELAY_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 启动中继服务
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// 调用中继服务生成两份报告
    Generate {
        #[arg(long)]
        company: String,
        #[arg(long)]
        location: String,
        #[arg(long)]
        revenue: String,
        /// 中继服务地址，覆盖配置文件
        #[arg(long)]
        server: Option<String>,
    },
}

/// 文档写到 stdout，活动写到 stderr
struct TerminalListener;

impl SessionListener for TerminalListener {
    fn on_track_started(&mut self, kind: ReportKind) {
        println!("\n# {} report\n", kind.label());
    }

    fn on_activity(&mut self, entry: &ActivityEntry) {
        eprintln!("[{}] {}", entry.report_kind.label(), entry.message);
    }

    fn on_delta(&mut self, _kind: ReportKind, fragment: &str) {
        print!("{}", fragment);
        let _ = std::io::stdout().flush();
    }

    fn on_track_finished(&mut self, kind: ReportKind, document: &Document) {
        println!();
        if document.status() == DocumentStatus::Failed {
            eprintln!("[{}] report incomplete", kind.label());
        }
    }

    fn on_session_error(&mut self, message: &str) {
        eprintln!("Error: {}", message);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = logger::with_bootstrap_logging(|| Config::load(cli.config.as_deref()))
        .context("failed to load config")?;
    logger::init_tracing(&config.logging);

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            server::serve(&config).await.context("server exited")?;
        }
        Command::Generate {
            company,
            location,
            revenue,
            server,
        } => {
            let server_url = server.unwrap_or_else(|| config.client.server_url.clone());
            let source = Arc::new(HttpTrackSource::new(&server_url));
            let timeouts = TimeoutController::new(TimeoutConfig::from_secs(
                config.client.start_timeout_secs,
                config.client.stream_idle_timeout_secs,
            ));
            let client = ResearchClient::new(source, timeouts);

            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    trigger.cancel();
                }
            });

            let mut sequencer = Sequencer::new(Box::new(TerminalListener));
            let info = CompanyInfo::new(company, location, revenue);
            // 错误已由 TerminalListener 输出
            if client.run(&mut sequencer, &info, &cancel).await.is_err() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
