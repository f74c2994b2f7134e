// 该文件是 Zhebi （遮蔽） 项目的一部分。
// src/bin/mask_server.rs - 遮蔽 HTTP 服务
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use zhebi::{
  config::{Config, DefaultMaskTask},
  server,
};

/// 遮蔽服务参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 监听地址
  #[arg(long, env = "ZHEBI_LISTEN", default_value = "0.0.0.0:8000", value_name = "ADDR")]
  pub listen: SocketAddr,

  #[command(flatten)]
  pub config: Config,
}

async fn serve(listen: SocketAddr, task: Arc<DefaultMaskTask>) -> Result<()> {
  let app = server::router(task);

  let listener = tokio::net::TcpListener::bind(listen).await?;
  info!("遮蔽服务监听于 {}", listen);
  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      tokio::signal::ctrl_c().await.ok();
      info!("收到中断信号，准备退出...");
    })
    .await?;
  Ok(())
}

fn main() -> Result<()> {
  dotenv::dotenv().ok();
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();

  // 阻塞 HTTP 客户端需在异步运行时之外创建和释放
  let task = Arc::new(args.config.build_task()?);

  let runtime = tokio::runtime::Runtime::new()?;
  runtime.block_on(serve(args.listen, Arc::clone(&task)))?;
  drop(runtime);

  info!("服务已退出");
  Ok(())
}
