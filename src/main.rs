//! 应用程序入口 (Application Entrypoint)
//!
//! 负责 CLI 指令解析、日志层初始化、依赖注入及系统生命周期管理。

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::fmt::MakeWriter;

use readstory::core::config::AppConfig;
use readstory::core::event::create_event_channel;
use readstory::engine::CrawlService;
use readstory::interfaces::{Fetcher, Store};
use readstory::network::HttpService;
use readstory::server;
use readstory::sites::StrategyRegistry;
use readstory::store::SqliteStore;
use readstory::ui::{Ui, get_multi};

/// 进度条感知的日志写入器 (TUI-aware Log Writer)
///
/// 确保异步日志输出不会破坏终端进度条的渲染布局。
struct IndicatifWriter;

impl io::Write for IndicatifWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let _ = get_multi().println(s.trim_end());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for IndicatifWriter {
    type Writer = IndicatifWriter;

    fn make_writer(&self) -> Self::Writer {
        IndicatifWriter
    }
}

/// 命令行界面 (CLI Scaffolding)
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 抓取单个故事并等待完成
    Crawl {
        /// 故事 URL 或裸故事名
        identifier: String,
    },
    /// 启动 HTTP 触发接口
    Serve {
        /// 监听地址，缺省读取配置
        #[arg(short, long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志层初始化
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(IndicatifWriter)
        .with_target(false)
        .with_ansi(true)
        .init();

    let cli = Cli::parse();

    // 依赖项初始化与注入
    let config = Arc::new(AppConfig::load_from(&cli.config)?);
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpService::new(&config.http)?);
    let store: Arc<dyn Store> = Arc::new(SqliteStore::connect(&config.database_url).await?);
    let registry = StrategyRegistry::new(&config, fetcher);
    tracing::info!("已注册站点: {}", registry.list().join(", "));

    match cli.command {
        Commands::Crawl { identifier } => {
            let (event_sender, event_receiver) = create_event_channel();
            let ui_handle = Ui::run(event_receiver);

            // 任务域限制，确保事件发送端释放后 UI 循环退出
            {
                let service = CrawlService::new(registry, store.clone(), config.clone())
                    .with_events(event_sender);

                let shutdown = service.shutdown_token();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        shutdown.cancel();
                    }
                });

                match service.crawl_story(&identifier).await {
                    Ok(report) => {
                        let total = store.count_chapters(report.story.id).await?;
                        tracing::info!(
                            "{}: 本次新增 {} 章，库中共 {} 章",
                            report.story.title,
                            report.saved.len(),
                            total
                        );
                    }
                    Err(e) => tracing::error!("抓取失败: {}", e),
                }
            }

            let _ = ui_handle.await;
        }
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let service = Arc::new(CrawlService::new(registry, store, config.clone()));
            server::serve(service, &bind).await?;
        }
    }

    Ok(())
}
