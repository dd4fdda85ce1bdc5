// 该文件是 Shanan Vis（山南西风·可视化）项目的一部分。
// src/model.rs - 检测器接口与检测结果
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

use serde::{Deserialize, Serialize};

use crate::frame::Image;

/// 像素坐标下的边界框 [x_min, y_min, x_max, y_max]
///
/// 坐标顺序由调用方保证，这里不做校验。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BBox(pub [f32; 4]);

impl BBox {
  pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
    BBox([x_min, y_min, x_max, y_max])
  }

  pub fn x_min(&self) -> f32 {
    self.0[0]
  }

  pub fn y_min(&self) -> f32 {
    self.0[1]
  }

  pub fn x_max(&self) -> f32 {
    self.0[2]
  }

  pub fn y_max(&self) -> f32 {
    self.0[3]
  }

  pub fn width(&self) -> f32 {
    self.0[2] - self.0[0]
  }

  pub fn height(&self) -> f32 {
    self.0[3] - self.0[1]
  }

  /// 四个坐标同乘一个系数
  pub fn scale(&self, factor: f32) -> Self {
    BBox(self.0.map(|v| v * factor))
  }
}

impl From<[f32; 4]> for BBox {
  fn from(value: [f32; 4]) -> Self {
    BBox(value)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
  pub label: String,
  pub bbox: BBox,
  pub score: f32,
}

impl Prediction {
  pub fn new(label: impl Into<String>, bbox: impl Into<BBox>, score: f32) -> Self {
    Self {
      label: label.into(),
      bbox: bbox.into(),
      score,
    }
  }

  /// 标签文本，形如 `dog: 0.87`
  pub fn caption(&self) -> String {
    format_caption(&self.label, self.score)
  }
}

/// 分数保留两位小数，末尾的 0 不显示，整数值保留一位小数（`1.0`）
pub fn format_caption(label: &str, score: f32) -> String {
  let rounded = (score * 100.0).round() / 100.0;
  if rounded.fract() == 0.0 {
    format!("{}: {:.1}", label, rounded)
  } else {
    format!("{}: {}", label, rounded)
  }
}

/// 一次检测调用的全部结果，保持检测器给出的顺序
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predictions {
  pub items: Box<[Prediction]>,
}

impl Predictions {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Prediction> {
    self.items.iter()
  }

  /// 每个类别只保留分数最高的一项，按类别首次出现的顺序排列
  pub fn top_per_class(&self) -> Predictions {
    let mut top: Vec<Prediction> = Vec::new();
    for item in self.items.iter() {
      match top.iter_mut().find(|p| p.label == item.label) {
        Some(best) if item.score > best.score => *best = item.clone(),
        Some(_) => {}
        None => top.push(item.clone()),
      }
    }
    Predictions::from(top)
  }
}

impl From<Vec<Prediction>> for Predictions {
  fn from(items: Vec<Prediction>) -> Self {
    Predictions {
      items: items.into_boxed_slice(),
    }
  }
}

impl FromIterator<Prediction> for Predictions {
  fn from_iter<I: IntoIterator<Item = Prediction>>(iter: I) -> Self {
    Predictions::from(iter.into_iter().collect::<Vec<_>>())
  }
}

impl<'a> IntoIterator for &'a Predictions {
  type Item = &'a Prediction;
  type IntoIter = std::slice::Iter<'a, Prediction>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

/// 目标检测器
///
/// 检测模型本身不在本库范围内，任何能把图像映射为检测结果的实现都可以接入。
pub trait Detector {
  type Error;

  /// 返回全部检测结果
  fn predict(&self, image: &Image) -> Result<Predictions, Self::Error>;

  /// 每个类别仅返回分数最高的检测结果
  fn predict_top(&self, image: &Image) -> Result<Predictions, Self::Error> {
    self.predict(image).map(|p| p.top_per_class())
  }
}

impl<D: Detector + ?Sized> Detector for &D {
  type Error = D::Error;

  fn predict(&self, image: &Image) -> Result<Predictions, Self::Error> {
    (**self).predict(image)
  }

  fn predict_top(&self, image: &Image) -> Result<Predictions, Self::Error> {
    (**self).predict_top(image)
  }
}

mod recorded;
pub use self::recorded::{RecordedDetector, RecordedDetectorError};
