// 该文件是 Shanan Vis（山南西风·可视化）项目的一部分。
// src/bin/show_labeled_image.rs - 在图像上绘制边界框
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::{Result, anyhow};
use clap::Parser;
use url::Url;

use shanan_vis::{
  FromUrl,
  input::ImageFileInput,
  output::DisplayWrapper,
  visualize::{Boxes, show_labeled_image},
};
use tracing::info;

/// 边界框叠加参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图像
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 显示输出
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 边界框坐标 xmin,ymin,xmax,ymax；可重复给出多个框
  #[arg(long = "box", value_name = "BOX", value_delimiter = ',', required = true)]
  pub boxes: Vec<f32>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let boxes = Boxes::from_flat(&args.boxes)
    .ok_or_else(|| anyhow!("边界框坐标数量 {} 不是 4 的倍数", args.boxes.len()))?;
  let input = ImageFileInput::from_url(&args.input)?;
  let display = DisplayWrapper::from_url(&args.output)?;

  info!("绘制 {} 个边界框", boxes.clone().into_vec().len());
  show_labeled_image(input.image(), boxes, &display)?;

  Ok(())
}
