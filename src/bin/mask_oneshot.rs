// 该文件是 Zhebi （遮蔽） 项目的一部分。
// src/bin/mask_oneshot.rs - 单张图片遮蔽
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

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use zhebi::{config::Config, task::MaskRequest};

/// 对单张图片中描述的目标做模糊遮蔽
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图片路径
  #[arg(long, value_name = "FILE")]
  pub input: PathBuf,

  /// 要遮蔽的目标描述
  #[arg(long, value_name = "PROMPT")]
  pub prompt: String,

  #[command(flatten)]
  pub config: Config,
}

fn main() -> Result<()> {
  dotenv::dotenv().ok();
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();

  info!("输入图片: {}", args.input.display());
  info!("目标描述: {}", args.prompt);
  info!("存档目录: {}", args.config.archive);

  let image = std::fs::read(&args.input)
    .with_context(|| format!("无法读取图片: {}", args.input.display()))?;
  let file_name = args
    .input
    .file_name()
    .and_then(|name| name.to_str())
    .unwrap_or("upload")
    .to_string();

  let task = args.config.build_task()?;
  let report = task.run(&MaskRequest {
    image,
    file_name,
    prompt: args.prompt,
  });

  println!("{}", serde_json::to_string_pretty(&report.response())?);
  if report.status_code() != 200 {
    std::process::exit(1);
  }

  Ok(())
}
