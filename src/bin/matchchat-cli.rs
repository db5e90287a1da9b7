//! MatchChat CLI 客户端（测试版）
//!
//! 非交互式 CLI，用于测试和展示会话同步：
//! 启动后执行首次全量拉取，之后从 stdin 逐行读取 JSON 推送事件投递到推送总线，
//! 会话列表每次变化都会打印出来

use anyhow::Result;
use clap::Parser;
use matchchat_sdk_core::im::conversation::listener::ConversationListener;
use matchchat_sdk_core::{ChatClient, ClientConfig, Conversation, ConversationRow, PushEvent};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

/// MatchChat CLI 客户端
#[derive(Parser, Debug)]
#[command(name = "matchchat-cli")]
#[command(about = "MatchChat CLI 客户端 - 用于测试和展示会话同步", long_about = None)]
struct Args {
    /// 用户 ID
    #[arg(short, long)]
    user_id: String,

    /// 认证 token
    #[arg(short, long, default_value = "")]
    token: String,

    /// HTTP API 基础地址
    #[arg(long, default_value = "http://localhost:10002")]
    api_base_url: String,

    /// 已读游标数据库 URL
    #[arg(long, default_value = "sqlite://matchchat.db?mode=rwc")]
    db_url: String,

    /// 运行时长（秒），0 表示运行到 stdin 关闭
    #[arg(short, long, default_value = "0")]
    duration: u64,

    /// 日志级别（默认: info,matchchat_sdk_core=debug）
    #[arg(long, default_value = "info,matchchat_sdk_core=debug")]
    log_level: String,
}

/// 初始化日志（同时输出到 stdout 和文件）
fn init_logger(log_level: &str) {
    use std::fs::OpenOptions;
    use std::io;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    // 优先使用环境变量 RUST_LOG（如果设置了），否则使用命令行参数
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("无法创建日志文件 debug.log");

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(true);

    // 文件不需要颜色
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    info!("[CLI] 📝 日志已同时输出到控制台和文件: debug.log");
}

struct CliConversationListener;

#[async_trait::async_trait]
impl ConversationListener for CliConversationListener {
    async fn on_sync_server_start(&self) {
        info!("[CLI/Conversation] 🔄 全量拉取开始");
    }

    async fn on_sync_server_finish(&self) {
        info!("[CLI/Conversation] ✅ 全量拉取完成");
    }

    async fn on_sync_server_failed(&self, error: String) {
        error!("[CLI/Conversation] ❌ 全量拉取失败: {}", error);
    }

    async fn on_new_conversation(&self, conversations: Vec<Conversation>) {
        for c in conversations {
            info!("[CLI/Conversation] 🆕 新会话: {}", c.id);
        }
    }

    async fn on_conversation_changed(&self, conversations: Vec<Conversation>) {
        for c in conversations {
            info!(
                "[CLI/Conversation] 🔄 会话变更: {} | 可用: {} | 未读: {}",
                c.id, c.available, c.unread_count
            );
        }
    }

    async fn on_total_unread_message_count_changed(&self, total_unread_count: u32) {
        info!("[CLI/Conversation] 📬 总未读数: {}", total_unread_count);
    }
}

fn print_rows(rows: &[ConversationRow]) {
    info!("[CLI] 📋 会话列表（共 {} 行）:", rows.len());
    for row in rows {
        match row {
            ConversationRow::Placeholder => info!("[CLI]   （暂无会话）"),
            ConversationRow::Conversation(item) => {
                let preview: String = item
                    .last_message
                    .as_deref()
                    .unwrap_or("")
                    .chars()
                    .take(30)
                    .collect();
                info!(
                    "[CLI]   - {} | {} | {:?} | 可用: {} | 未读: {} | 最新: {}",
                    item.conversation_id,
                    item.peer_nickname,
                    item.match_state,
                    item.available,
                    item.unread_count,
                    preview
                );
            }
        }
    }
}

/// 从 stdin 逐行读取推送事件，直到 stdin 关闭
async fn feed_stdin(client: Arc<ChatClient>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match PushEvent::from_json(line) {
            Ok(event) => {
                info!(
                    "[CLI] 📨 投递推送事件: kind={}, conversationID={}",
                    event.kind(),
                    event.conversation_id()
                );
                client.publish(event);
            }
            Err(e) => warn!("[CLI] ⚠️ 无法解析的推送事件，忽略: {:?}", e),
        }
    }
    info!("[CLI] stdin 已关闭");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logger(&args.log_level);

    info!("[CLI] 🚀 MatchChat CLI 客户端（测试模式）");
    info!("[CLI] 👤 用户ID: {}", args.user_id);
    info!("[CLI] ⏱️  运行时长: {} 秒（0=运行到 stdin 关闭）", args.duration);

    let mut config = ClientConfig::new(args.user_id.clone(), args.token.clone());
    config.api_base_url = args.api_base_url.clone();
    config.db_url = args.db_url.clone();

    let client = Arc::new(
        ChatClient::connect(config, Some(Arc::new(CliConversationListener)))
            .await
            .map_err(|e| anyhow::anyhow!("初始化客户端失败: {}", e))?,
    );
    client.start().await?;

    print_rows(&client.rows());
    if let Some(mut rows) = client.subscribe_rows() {
        tokio::spawn(async move {
            rows.borrow_and_update();
            while rows.changed().await.is_ok() {
                let current = rows.borrow_and_update().clone();
                print_rows(&current);
            }
        });
    }

    info!("[CLI] 📥 开始从 stdin 读取推送事件（每行一个 JSON）...");
    if args.duration > 0 {
        info!("[CLI] ⏰ {} 秒后自动退出", args.duration);
        let feeder = client.clone();
        let stdin_task = tokio::spawn(async move {
            if let Err(e) = feed_stdin(feeder).await {
                error!("[CLI] 读取 stdin 失败: {:?}", e);
            }
        });
        sleep(Duration::from_secs(args.duration)).await;
        stdin_task.abort();
    } else {
        feed_stdin(client.clone()).await?;
        // 给分发任务处理最后几个事件的时间
        sleep(Duration::from_millis(200)).await;
    }

    client.shutdown().await;
    info!("[CLI] 👋 程序退出");
    Ok(())
}
