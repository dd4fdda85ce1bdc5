// 该文件是 Shanan Vis（山南西风·可视化）项目的一部分。
// src/bin/prediction_grid.rs - 检测结果网格图
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
  frame::Image,
  input::ImageFileInput,
  model::RecordedDetector,
  output::DisplayWrapper,
  visualize::plot_prediction_grid,
};
use tracing::info;

/// 检测网格参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测结果记录，每张图像一行
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 显示输出，例如 image:///tmp/grid.png 或 folder:///tmp/record?record
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 网格行数，需与 --cols 同时给出
  #[arg(long, requires = "cols")]
  pub rows: Option<usize>,
  /// 网格列数
  #[arg(long, requires = "rows")]
  pub cols: Option<usize>,
  /// 图形宽度（像素）
  #[arg(long, requires = "height")]
  pub width: Option<u32>,
  /// 图形高度（像素）
  #[arg(long, requires = "width")]
  pub height: Option<u32>,
  /// 输入图像，例如 image:///path/to/a.png
  #[arg(value_name = "IMAGE", required = true)]
  pub images: Vec<Url>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let model = RecordedDetector::from_url(&args.model)?;
  let display = DisplayWrapper::from_url(&args.output)?;

  let images = args
    .images
    .iter()
    .map(|url| ImageFileInput::from_url(url).map(ImageFileInput::into_image))
    .collect::<Result<Vec<Image>, _>>()?;
  info!("已加载 {} 张图像", images.len());

  let dim = args.rows.zip(args.cols);
  let figsize = args.width.zip(args.height);
  plot_prediction_grid(&model, &images, dim, figsize, &display)?;

  Ok(())
}
