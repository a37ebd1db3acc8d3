//! ODMS服务器主程序

use clap::Parser;
use odms_core::utils::RequestIdGenerator;
use odms_core::{OdmsError, Result};
use odms_matching::AllocationEngine;
use odms_oracle::InMemoryGateway;
use odms_registry::InMemoryRegistry;
use odms_web::{AccessPolicy, AppState, WebServer};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info};

mod config;
use crate::config::OdmsConfig;

/// ODMS服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "odms-server")]
#[command(about = "器官捐献匹配与分配系统 (ODMS) 服务器")]
struct Args {
    /// 监听端口（覆盖配置文件）
    #[arg(short, long)]
    port: Option<u16>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&args.log_level))
        .init();

    info!("启动ODMS服务器...");

    let config = OdmsConfig::load(args.config.as_deref())?;
    let port = args.port.unwrap_or(config.server.port);

    info!("ODMS服务器配置:");
    info!("  监听地址: {}:{}", config.server.host, port);
    info!("  评分阈值: {}", config.matching.minimum_score_threshold);
    info!("  最大等待天数: {}", config.matching.max_wait_days);

    let registry = Arc::new(InMemoryRegistry::new());
    let gateway = Arc::new(InMemoryGateway::new(RequestIdGenerator::new()));
    let engine = Arc::new(AllocationEngine::new(
        registry.clone(),
        config.matching.clone(),
    ));

    // 订阅证明事件：死亡验证完成后解锁对应供体的器官释放
    let mut events = gateway.subscribe();
    let subscriber_engine = engine.clone();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Err(e) = subscriber_engine
                        .handle_attestation(event.request_id, event.donor_id, event.is_deceased)
                        .await
                    {
                        error!("处理证明事件失败: {}", e);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    error!("证明事件订阅滞后，丢失 {} 条事件", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let addr: SocketAddr = format!("{}:{}", config.server.host, port)
        .parse()
        .map_err(|e| OdmsError::Config(format!("无效监听地址: {}", e)))?;

    let state = AppState {
        engine,
        registry,
        gateway,
        access: Arc::new(AccessPolicy::default()),
    };

    let server = WebServer::new(addr, state);
    if let Err(e) = server.run().await {
        error!("服务器启动失败: {}", e);
        return Err(e);
    }

    Ok(())
}
