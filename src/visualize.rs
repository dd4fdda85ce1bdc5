// 该文件是 Shanan Vis（山南西风·可视化）项目的一部分。
// src/visualize.rs - 检测结果可视化入口
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

//! 三个互不相关的可视化入口：
//!
//! - [`detect_video`]：逐帧检测视频并写出标注后的视频；
//! - [`plot_prediction_grid`]：对一组图像做检测，按网格组合成一幅图形；
//! - [`show_labeled_image`]：在单张图像上绘制给定的边界框。

use std::convert::Infallible;

use thiserror::Error;
use tracing::{debug, info};

use crate::{
  BoxError,
  frame::{Image, ToRgbImage},
  model::{BBox, Detector, Predictions},
  output::{Display, Figure, Panel, Shape},
};

#[derive(Error, Debug)]
pub enum VisualizeError<E = Infallible> {
  #[error("网格尺寸 {rows}x{cols} 与图像数量 {count} 不匹配")]
  InvalidLayout {
    rows: usize,
    cols: usize,
    count: usize,
  },
  #[error("视频源不可读: {0}")]
  UnreadableSource(String),
  #[error(transparent)]
  Detector(E),
  #[error("视频源读取错误: {0}")]
  Source(#[source] BoxError),
  #[error("视频输出错误: {0}")]
  Sink(#[source] BoxError),
  #[error("显示错误: {0}")]
  Display(#[source] BoxError),
  #[error("字体加载错误: {0}")]
  Font(#[from] ab_glyph::InvalidFont),
}

/// 边界框与标签的绘制样式
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxStyle {
  pub color: [u8; 3],
  pub thickness: u32,
  /// 标签字号（像素），为 `None` 时不绘制标签
  pub font_size: Option<f32>,
  /// 标签基线相对框左上角的偏移
  pub label_offset: (f32, f32),
}

impl BoxStyle {
  /// 视频标注：蓝色粗框
  pub const VIDEO: BoxStyle = BoxStyle {
    color: [0, 0, 255],
    thickness: 3,
    font_size: Some(30.0),
    label_offset: (0.0, -10.0),
  };

  /// 网格图：红色细框
  pub const GRID: BoxStyle = BoxStyle {
    color: [255, 0, 0],
    thickness: 1,
    font_size: Some(14.0),
    label_offset: (5.0, -10.0),
  };

  /// 单图叠加：红色细框，无标签
  pub const OVERLAY: BoxStyle = BoxStyle {
    color: [255, 0, 0],
    thickness: 1,
    font_size: None,
    label_offset: (0.0, 0.0),
  };
}

/// 以左上角加宽高表示的空心矩形
pub fn box_shape(bbox: &BBox, style: &BoxStyle) -> Shape {
  Shape::Rect {
    x: bbox.x_min(),
    y: bbox.y_min(),
    width: bbox.width(),
    height: bbox.height(),
    color: style.color,
    thickness: style.thickness,
  }
}

/// 把检测结果转换为图形；框坐标先乘以 `scale`
pub fn prediction_shapes(predictions: &Predictions, scale: f32, style: &BoxStyle) -> Vec<Shape> {
  let mut shapes = Vec::with_capacity(predictions.len() * 2);
  for prediction in predictions.iter() {
    let bbox = prediction.bbox.scale(scale);
    shapes.push(box_shape(&bbox, style));

    if let Some(size) = style.font_size {
      shapes.push(Shape::Text {
        x: bbox.x_min() + style.label_offset.0,
        y: bbox.y_min() + style.label_offset.1,
        text: prediction.caption(),
        color: style.color,
        size,
      });
    }
  }
  shapes
}

/// 网格布局 (行, 列)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
  pub rows: usize,
  pub cols: usize,
}

impl GridLayout {
  /// 单列布局
  pub fn column(count: usize) -> Self {
    GridLayout {
      rows: count,
      cols: 1,
    }
  }

  /// 单元格数量，溢出时为 `None`
  pub fn cells(&self) -> Option<usize> {
    self.rows.checked_mul(self.cols)
  }

  /// 校验网格与图像数量是否一致
  ///
  /// 没有图像时同样返回 [`VisualizeError::InvalidLayout`]：0 行的图形无法绘制。
  /// `rows * cols` 溢出时也视为不一致。
  pub fn validate<E>(&self, count: usize) -> Result<(), VisualizeError<E>> {
    if count == 0 || self.cells() != Some(count) {
      return Err(VisualizeError::InvalidLayout {
        rows: self.rows,
        cols: self.cols,
        count,
      });
    }
    Ok(())
  }
}

impl From<(usize, usize)> for GridLayout {
  fn from((rows, cols): (usize, usize)) -> Self {
    GridLayout { rows, cols }
  }
}

/// 组合检测网格图形
///
/// 检测作用于调用方给出的原图（张量或栅格），不做缩放；张量图像在显示前反归一化。
pub fn prediction_grid<M: Detector>(
  model: &M,
  images: &[Image],
  dim: Option<(usize, usize)>,
  figsize: Option<(u32, u32)>,
) -> Result<Figure, VisualizeError<M::Error>> {
  let layout = dim
    .map(GridLayout::from)
    .unwrap_or_else(|| GridLayout::column(images.len()));
  layout.validate::<M::Error>(images.len())?;

  let mut figure = Figure::new(layout.rows, layout.cols).with_size(figsize);
  for (index, image) in images.iter().enumerate() {
    let predictions = model.predict(image).map_err(VisualizeError::Detector)?;
    debug!("图像 {}: {} 个检测结果", index + 1, predictions.len());

    let mut panel = Panel::new(image.to_rgb_image()).with_title(format!("Image {}", index + 1));
    panel
      .shapes
      .extend(prediction_shapes(&predictions, 1.0, &BoxStyle::GRID));
    figure.push(panel);
  }

  Ok(figure)
}

/// 组合检测网格并交给显示面
pub fn plot_prediction_grid<M: Detector, D: Display>(
  model: &M,
  images: &[Image],
  dim: Option<(usize, usize)>,
  figsize: Option<(u32, u32)>,
  display: &D,
) -> Result<(), VisualizeError<M::Error>> {
  let figure = prediction_grid(model, images, dim, figsize)?;
  info!(
    "显示检测网格: {}x{}，共 {} 张图像",
    figure.rows(),
    figure.cols(),
    figure.panels().len()
  );
  display
    .show(&figure)
    .map_err(|e| VisualizeError::Display(Box::new(e)))
}

/// 单个框 (4,) 或多个框 (N, 4)
#[derive(Debug, Clone, PartialEq)]
pub enum Boxes {
  Single(BBox),
  Many(Vec<BBox>),
}

impl Boxes {
  /// 按扁平数组解释：长度为 4 时是单个框，4 的倍数时是 N 个框
  pub fn from_flat(values: &[f32]) -> Option<Boxes> {
    match values.len() {
      4 => Some(Boxes::Single(BBox([values[0], values[1], values[2], values[3]]))),
      n if n > 0 && n % 4 == 0 => Some(Boxes::Many(
        values
          .chunks_exact(4)
          .map(|c| BBox([c[0], c[1], c[2], c[3]]))
          .collect(),
      )),
      _ => None,
    }
  }

  pub fn into_vec(self) -> Vec<BBox> {
    match self {
      Boxes::Single(bbox) => vec![bbox],
      Boxes::Many(boxes) => boxes,
    }
  }
}

impl From<BBox> for Boxes {
  fn from(bbox: BBox) -> Self {
    Boxes::Single(bbox)
  }
}

impl From<[f32; 4]> for Boxes {
  fn from(bbox: [f32; 4]) -> Self {
    Boxes::Single(BBox(bbox))
  }
}

impl From<Vec<BBox>> for Boxes {
  fn from(boxes: Vec<BBox>) -> Self {
    Boxes::Many(boxes)
  }
}

impl From<Vec<[f32; 4]>> for Boxes {
  fn from(boxes: Vec<[f32; 4]>) -> Self {
    Boxes::Many(boxes.into_iter().map(BBox).collect())
  }
}

impl From<&Predictions> for Boxes {
  fn from(predictions: &Predictions) -> Self {
    Boxes::Many(predictions.iter().map(|p| p.bbox).collect())
  }
}

/// 在图像上叠加给定的边界框，不绘制标签
///
/// 张量图像按原值截断转换，不做反归一化。
pub fn labeled_image(image: &Image, boxes: impl Into<Boxes>) -> Figure {
  let mut panel = Panel::new(image.to_raster_unnormalized());
  for bbox in boxes.into().into_vec() {
    panel.push(box_shape(&bbox, &BoxStyle::OVERLAY));
  }
  Figure::single(panel)
}

/// 叠加边界框并交给显示面
pub fn show_labeled_image<D: Display>(
  image: &Image,
  boxes: impl Into<Boxes>,
  display: &D,
) -> Result<(), VisualizeError> {
  let figure = labeled_image(image, boxes);
  debug!("显示 {} 个边界框", figure.panels()[0].shapes.len());
  display
    .show(&figure)
    .map_err(|e| VisualizeError::Display(Box::new(e)))
}

#[cfg(feature = "video_file")]
pub use self::video::detect_video;

#[cfg(feature = "video_file")]
mod video {
  use tracing::error;

  use super::VisualizeError;
  use crate::{
    input::{VideoFileInput, VideoFileInputError},
    model::Detector,
    output::SaveVideoFileOutput,
    task::{AnnotateOptions, AnnotateSummary, AnnotateVideoTask, Task},
  };

  /// 对视频文件逐帧检测，把标注后的视频写到 `output_file`
  ///
  /// `fps` 通常取 [`DEFAULT_FPS`](crate::output::DEFAULT_FPS)。
  ///
  /// 输出建议使用 `.avi` 扩展名。部分播放器（如 QuickTime）可能无法打开输出，
  /// 遇到时请使用 VLC。
  pub fn detect_video<M: Detector>(
    model: &M,
    input_file: &str,
    output_file: &str,
    fps: u32,
  ) -> Result<AnnotateSummary, VisualizeError<M::Error>> {
    let input = VideoFileInput::open(input_file).map_err(|e| match e {
      VideoFileInputError::Unreadable { .. } => VisualizeError::UnreadableSource(e.to_string()),
      other => {
        error!("打开视频源失败: {}", other);
        VisualizeError::Source(Box::new(other))
      }
    })?;
    let output =
      SaveVideoFileOutput::new(output_file, fps).map_err(|e| VisualizeError::Sink(Box::new(e)))?;

    AnnotateVideoTask::new(AnnotateOptions::default())?.run_task(input, model, output)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Prediction;

  #[test]
  fn flat_boxes_follow_shape() {
    assert_eq!(
      Boxes::from_flat(&[1.0, 2.0, 3.0, 4.0]),
      Some(Boxes::Single(BBox::new(1.0, 2.0, 3.0, 4.0)))
    );
    let many = Boxes::from_flat(&[0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0]).unwrap();
    assert_eq!(many.into_vec().len(), 2);
    assert_eq!(Boxes::from_flat(&[1.0, 2.0, 3.0]), None);
    assert_eq!(Boxes::from_flat(&[]), None);
  }

  #[test]
  fn prediction_shapes_place_label_above_box() {
    let predictions = Predictions::from(vec![Prediction::new(
      "tick",
      [10.0, 20.0, 30.0, 60.0],
      0.876,
    )]);
    let shapes = prediction_shapes(&predictions, 2.0, &BoxStyle::GRID);
    assert_eq!(shapes.len(), 2);
    assert_eq!(
      shapes[0],
      Shape::Rect {
        x: 20.0,
        y: 40.0,
        width: 40.0,
        height: 80.0,
        color: [255, 0, 0],
        thickness: 1,
      }
    );
    match &shapes[1] {
      Shape::Text { x, y, text, .. } => {
        assert_eq!((*x, *y), (25.0, 30.0));
        assert_eq!(text, "tick: 0.88");
      }
      other => panic!("unexpected shape {:?}", other),
    }
  }

  #[test]
  fn video_style_labels_scaled_corner() {
    let predictions = Predictions::from(vec![Prediction::new("gate", [5.0, 15.0, 25.0, 35.0], 0.9)]);
    let shapes = prediction_shapes(&predictions, 2.0, &BoxStyle::VIDEO);
    assert_eq!(
      shapes,
      vec![
        Shape::Rect {
          x: 10.0,
          y: 30.0,
          width: 40.0,
          height: 40.0,
          color: [0, 0, 255],
          thickness: 3,
        },
        Shape::Text {
          x: 10.0,
          y: 20.0,
          text: "gate: 0.9".to_string(),
          color: [0, 0, 255],
          size: 30.0,
        },
      ]
    );
  }

  #[test]
  fn overlay_style_draws_no_labels() {
    let predictions = Predictions::from(vec![Prediction::new("a", [0.0, 0.0, 1.0, 1.0], 0.5)]);
    let shapes = prediction_shapes(&predictions, 1.0, &BoxStyle::OVERLAY);
    assert_eq!(shapes.len(), 1);
  }

  #[test]
  fn layout_validation() {
    assert!(GridLayout::from((2, 3)).validate::<Infallible>(6).is_ok());
    assert!(matches!(
      GridLayout::from((2, 2)).validate::<Infallible>(3),
      Err(VisualizeError::InvalidLayout {
        rows: 2,
        cols: 2,
        count: 3
      })
    ));
    assert!(GridLayout::column(0).validate::<Infallible>(0).is_err());
  }

  #[test]
  fn overflowing_layout_is_invalid() {
    let layout = GridLayout::from((usize::MAX, 2));
    assert_eq!(layout.cells(), None);
    assert!(matches!(
      layout.validate::<Infallible>(2),
      Err(VisualizeError::InvalidLayout {
        rows: usize::MAX,
        cols: 2,
        count: 2
      })
    ));
  }
}
