// 该文件是 Shanan Vis（山南西风·可视化）项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

//! 目录记录输出
//!
//! 每次显示把渲染结果保存到 `<目录>/<年>/<月>/<日>/<时-分-秒>-<序号>.png`。
//! URL 带 `record` 参数时，额外在同名 `.json` 文件中记录各面板的标题与图形。
//!
//! - `folder:///path/to/dir`
//! - `folder:///path/to/dir?record`

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Datelike, Local};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{Display, Figure, Painter, Shape},
  url_file_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("记录序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("字体加载错误: {0}")]
  FontError(#[from] ab_glyph::InvalidFont),
}

#[derive(Serialize)]
struct PanelRecord<'a> {
  title: Option<&'a str>,
  width: u32,
  height: u32,
  shapes: &'a [Shape],
}

#[derive(Serialize)]
struct FigureRecord<'a> {
  rows: usize,
  cols: usize,
  panels: Vec<PanelRecord<'a>>,
}

impl<'a> From<&'a Figure> for FigureRecord<'a> {
  fn from(figure: &'a Figure) -> Self {
    FigureRecord {
      rows: figure.rows(),
      cols: figure.cols(),
      panels: figure
        .panels()
        .iter()
        .map(|p| PanelRecord {
          title: p.title.as_deref(),
          width: p.image.width(),
          height: p.image.height(),
          shapes: &p.shapes,
        })
        .collect(),
    }
  }
}

pub struct DirectoryRecordOutput {
  directory: PathBuf,
  painter: Painter,
  frame_counter: Mutex<u16>,
  record: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let record = uri.query_pairs().any(|(k, _)| k == "record");
    Self::new(url_file_path(uri), record)
  }
}

impl DirectoryRecordOutput {
  pub fn new<P: AsRef<Path>>(directory: P, record: bool) -> Result<Self, DirectoryRecordOutputError> {
    Ok(DirectoryRecordOutput {
      directory: directory.as_ref().to_path_buf(),
      painter: Painter::new()?,
      frame_counter: Mutex::new(0),
      record,
    })
  }

  fn frame_id(&self) -> u16 {
    let mut counter = self
      .frame_counter
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    *counter = counter.wrapping_add(1);
    *counter
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Local::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Display for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn show(&self, figure: &Figure) -> Result<(), Self::Error> {
    let path = self.frame_path()?;
    figure.render(&self.painter).save(&path)?;

    if self.record {
      let json = serde_json::to_string_pretty(&FigureRecord::from(figure))?;
      std::fs::write(path.with_extension("json"), json)?;
    }

    info!("图形已记录: {}", path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::output::Panel;
  use image::RgbImage;

  fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    for entry in std::fs::read_dir(dir).unwrap() {
      let path = entry.unwrap().path();
      if path.is_dir() {
        collect_files(&path, out);
      } else {
        out.push(path);
      }
    }
  }

  #[test]
  fn writes_dated_png_and_record() {
    let dir = std::env::temp_dir().join(format!("shanan-vis-folder-{}", std::process::id()));
    let url = url::Url::parse(&format!("folder://{}?record", dir.display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();

    let mut panel = Panel::new(RgbImage::new(8, 8)).with_title("Image 1");
    panel.push(Shape::Rect {
      x: 1.0,
      y: 1.0,
      width: 3.0,
      height: 3.0,
      color: [255, 0, 0],
      thickness: 1,
    });
    output.show(&Figure::single(panel)).unwrap();

    let mut files = Vec::new();
    collect_files(&dir, &mut files);
    files.sort();
    assert_eq!(files.len(), 2);
    assert!(files.iter().any(|p| p.extension().is_some_and(|e| e == "png")));

    let json_path = files
      .iter()
      .find(|p| p.extension().is_some_and(|e| e == "json"))
      .unwrap();
    let record: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(json_path).unwrap()).unwrap();
    assert_eq!(record["panels"][0]["title"], "Image 1");
    assert_eq!(record["panels"][0]["shapes"][0]["kind"], "rect");

    std::fs::remove_dir_all(&dir).unwrap();
  }
}
