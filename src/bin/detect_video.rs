// 该文件是 Shanan Vis（山南西风·可视化）项目的一部分。
// src/bin/detect_video.rs - 视频逐帧检测标注
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;
use clap::Parser;
use url::Url;

use shanan_vis::{
  FromUrl,
  input::VideoFileInput,
  model::RecordedDetector,
  output::SaveVideoFileOutput,
  task::{AnnotateOptions, AnnotateVideoTask, CtrlCQuit, DEFAULT_TARGET_SIZE, Task},
};
use tracing::info;

/// 视频检测标注参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测结果记录，例如 recorded:///path/to/detections.jsonl
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入视频，例如 video:///path/to/input.mp4
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出视频，例如 video:///path/to/output.avi?fps=30
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 送入检测器前帧的短边尺寸
  #[arg(long, default_value_t = DEFAULT_TARGET_SIZE)]
  pub target_size: u32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("检测记录: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let model = RecordedDetector::from_url(&args.model)?;
  let input = VideoFileInput::from_url(&args.input)?;
  let output = SaveVideoFileOutput::from_url(&args.output)?;

  let options = AnnotateOptions {
    target_size: args.target_size,
    ..AnnotateOptions::default()
  };
  let task = AnnotateVideoTask::new(options)?.with_quit_signal(CtrlCQuit::install()?);

  info!("开始处理，按 Ctrl-C 提前结束...");
  let now = std::time::Instant::now();
  let summary = task.run_task(input, &model, output)?;
  info!(
    "处理完成，耗时: {:.2?}，写入 {} 帧{}",
    now.elapsed(),
    summary.frames_written,
    if summary.quit_early { "（提前结束）" } else { "" }
  );

  Ok(())
}
