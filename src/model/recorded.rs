// 该文件是 Shanan Vis（山南西风·可视化）项目的一部分。
// src/model/recorded.rs - 回放预先记录的检测结果
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

//! 记录检测器
//!
//! 从 JSON Lines 文件中按调用顺序回放检测结果，每行对应一次检测调用：
//!
//! ```text
//! [{"label": "tick", "bbox": [10, 20, 110, 220], "score": 0.93}]
//! []
//! ```
//!
//! 记录用尽后返回空结果。

use std::cell::Cell;

use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Image,
  model::{Detector, Prediction, Predictions},
  url_file_path,
};

#[derive(Error, Debug)]
pub enum RecordedDetectorError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("第 {line} 行解析失败: {source}")]
  ParseError {
    line: usize,
    #[source]
    source: serde_json::Error,
  },
}

pub struct RecordedDetector {
  records: Vec<Predictions>,
  cursor: Cell<usize>,
}

impl FromUrlWithScheme for RecordedDetector {
  const SCHEME: &'static str = "recorded";
}

impl FromUrl for RecordedDetector {
  type Error = RecordedDetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RecordedDetectorError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let path = url_file_path(url);
    info!("加载检测记录: {}", path);
    let text = std::fs::read_to_string(&path)?;
    Self::from_json_lines(&text)
  }
}

impl RecordedDetector {
  pub fn from_json_lines(text: &str) -> Result<Self, RecordedDetectorError> {
    let mut records = Vec::new();
    for (index, line) in text.lines().enumerate() {
      if line.trim().is_empty() {
        continue;
      }
      let items: Vec<Prediction> =
        serde_json::from_str(line).map_err(|source| RecordedDetectorError::ParseError {
          line: index + 1,
          source,
        })?;
      records.push(Predictions::from(items));
    }
    debug!("共 {} 条检测记录", records.len());

    Ok(Self::from_records(records))
  }

  pub fn from_records(records: Vec<Predictions>) -> Self {
    Self {
      records,
      cursor: Cell::new(0),
    }
  }

  /// 已回放的记录数
  pub fn calls(&self) -> usize {
    self.cursor.get()
  }
}

impl Detector for RecordedDetector {
  type Error = RecordedDetectorError;

  fn predict(&self, _image: &Image) -> Result<Predictions, Self::Error> {
    let index = self.cursor.get();
    self.cursor.set(index + 1);
    match self.records.get(index) {
      Some(record) => Ok(record.clone()),
      None => {
        if index == self.records.len() {
          warn!("检测记录已用尽，后续调用返回空结果");
        }
        Ok(Predictions::default())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::BBox;
  use image::RgbImage;

  #[test]
  fn replays_lines_in_order_then_empty() {
    let text = r#"[{"label": "tick", "bbox": [1, 2, 3, 4], "score": 0.5}]

[]
"#;
    let detector = RecordedDetector::from_json_lines(text).unwrap();
    let image = Image::Raster(RgbImage::new(2, 2));

    let first = detector.predict(&image).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first.items[0].bbox, BBox::new(1.0, 2.0, 3.0, 4.0));
    assert!(detector.predict(&image).unwrap().is_empty());
    assert!(detector.predict(&image).unwrap().is_empty());
    assert_eq!(detector.calls(), 3);
  }

  #[test]
  fn reports_bad_line_number() {
    let text = "[]\nnot json\n";
    match RecordedDetector::from_json_lines(text) {
      Err(RecordedDetectorError::ParseError { line, .. }) => assert_eq!(line, 2),
      other => panic!("unexpected result: {:?}", other.map(|d| d.calls())),
    }
  }
}
