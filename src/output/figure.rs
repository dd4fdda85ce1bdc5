// 该文件是 Shanan Vis（山南西风·可视化）项目的一部分。
// src/output/figure.rs - 组合图形
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

//! 组合图形
//!
//! 一幅 [`Figure`] 由按行优先排列的若干 [`Panel`] 组成，每个面板是一张图像加上
//! 图像坐标下的矢量图形（矩形、文字）。渲染时统一栅格化到一张画布上。

use image::{Rgb, RgbImage, imageops::FilterType};
use serde::Serialize;

use crate::output::draw::{Painter, Transform};

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const TITLE_COLOR: [u8; 3] = [0, 0, 0];
const TITLE_FONT_SIZE: f32 = 18.0;
const TITLE_STRIP_HEIGHT: u32 = 28;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
  /// 空心矩形，(x, y) 为左上角
  Rect {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    color: [u8; 3],
    thickness: u32,
  },
  /// 文字，(x, y) 为基线起点
  Text {
    x: f32,
    y: f32,
    text: String,
    color: [u8; 3],
    size: f32,
  },
}

impl Shape {
  pub fn is_rect(&self) -> bool {
    matches!(self, Shape::Rect { .. })
  }
}

#[derive(Debug, Clone)]
pub struct Panel {
  pub image: RgbImage,
  pub title: Option<String>,
  pub shapes: Vec<Shape>,
}

impl Panel {
  pub fn new(image: RgbImage) -> Self {
    Self {
      image,
      title: None,
      shapes: Vec::new(),
    }
  }

  pub fn with_title(mut self, title: impl Into<String>) -> Self {
    self.title = Some(title.into());
    self
  }

  pub fn push(&mut self, shape: Shape) {
    self.shapes.push(shape);
  }

  pub fn rects(&self) -> impl Iterator<Item = &Shape> {
    self.shapes.iter().filter(|s| s.is_rect())
  }
}

#[derive(Debug, Clone)]
pub struct Figure {
  rows: usize,
  cols: usize,
  size: Option<(u32, u32)>,
  panels: Vec<Panel>,
}

impl Figure {
  pub fn new(rows: usize, cols: usize) -> Self {
    Self {
      rows,
      cols,
      size: None,
      panels: Vec::with_capacity(rows * cols),
    }
  }

  /// 单面板图形
  pub fn single(panel: Panel) -> Self {
    let mut figure = Self::new(1, 1);
    figure.push(panel);
    figure
  }

  /// 整幅图形的像素尺寸 (宽, 高)，缺省时按最大面板推算
  pub fn with_size(mut self, size: Option<(u32, u32)>) -> Self {
    self.size = size;
    self
  }

  pub fn push(&mut self, panel: Panel) {
    self.panels.push(panel);
  }

  pub fn rows(&self) -> usize {
    self.rows
  }

  pub fn cols(&self) -> usize {
    self.cols
  }

  pub fn panels(&self) -> &[Panel] {
    &self.panels
  }

  fn title_height(&self) -> u32 {
    if self.panels.iter().any(|p| p.title.is_some()) {
      TITLE_STRIP_HEIGHT
    } else {
      0
    }
  }

  /// 单元格尺寸 (宽, 高)，包含标题栏
  fn cell_size(&self) -> (u32, u32) {
    let rows = self.rows.max(1) as u32;
    let cols = self.cols.max(1) as u32;
    match self.size {
      Some((width, height)) => ((width / cols).max(1), (height / rows).max(1)),
      None => {
        let width = self.panels.iter().map(|p| p.image.width()).max().unwrap_or(1);
        let height = self.panels.iter().map(|p| p.image.height()).max().unwrap_or(1);
        (width.max(1), height.max(1) + self.title_height())
      }
    }
  }

  /// 栅格化整幅图形
  pub fn render(&self, painter: &Painter) -> RgbImage {
    let (cell_w, cell_h) = self.cell_size();
    let title_h = self.title_height().min(cell_h.saturating_sub(1));
    let area_h = cell_h - title_h;
    let cols = self.cols.max(1);

    let mut canvas = RgbImage::from_pixel(
      cell_w * cols as u32,
      cell_h * self.rows.max(1) as u32,
      BACKGROUND,
    );

    for (index, panel) in self.panels.iter().enumerate() {
      let cell_x = (index % cols) as u32 * cell_w;
      let cell_y = (index / cols) as u32 * cell_h;

      let (img_w, img_h) = panel.image.dimensions();
      if img_w == 0 || img_h == 0 {
        continue;
      }
      let scale = (cell_w as f32 / img_w as f32).min(area_h as f32 / img_h as f32);
      let out_w = ((img_w as f32 * scale).round() as u32).clamp(1, cell_w);
      let out_h = ((img_h as f32 * scale).round() as u32).clamp(1, area_h.max(1));

      let mut tile = if (out_w, out_h) == (img_w, img_h) {
        panel.image.clone()
      } else {
        image::imageops::resize(&panel.image, out_w, out_h, FilterType::Triangle)
      };
      painter.paint(&mut tile, &panel.shapes, Transform::scaled(scale));

      let offset_x = cell_x + (cell_w - out_w) / 2;
      let offset_y = cell_y + title_h + (area_h.saturating_sub(out_h)) / 2;
      image::imageops::overlay(&mut canvas, &tile, offset_x as i64, offset_y as i64);

      if let Some(title) = &panel.title {
        let (text_w, _) = painter.text_size(TITLE_FONT_SIZE, title);
        let x = cell_x as f32 + (cell_w.saturating_sub(text_w)) as f32 / 2.0;
        let baseline = cell_y as f32 + title_h as f32 - 6.0;
        let shape = Shape::Text {
          x,
          y: baseline,
          text: title.clone(),
          color: TITLE_COLOR,
          size: TITLE_FONT_SIZE,
        };
        painter.paint(&mut canvas, std::slice::from_ref(&shape), Transform::IDENTITY);
      }
    }

    canvas
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn rect(x: f32, y: f32, width: f32, height: f32) -> Shape {
    Shape::Rect {
      x,
      y,
      width,
      height,
      color: [255, 0, 0],
      thickness: 1,
    }
  }

  #[test]
  fn default_size_follows_largest_panel() {
    let painter = Painter::new().unwrap();
    let mut figure = Figure::new(2, 1);
    figure.push(Panel::new(RgbImage::new(40, 30)).with_title("Image 1"));
    figure.push(Panel::new(RgbImage::new(20, 10)).with_title("Image 2"));

    let canvas = figure.render(&painter);
    assert_eq!(canvas.dimensions(), (40, 2 * (30 + TITLE_STRIP_HEIGHT)));
  }

  #[test]
  fn explicit_size_splits_cells() {
    let painter = Painter::new().unwrap();
    let mut figure = Figure::new(2, 2).with_size(Some((200, 100)));
    for _ in 0..4 {
      figure.push(Panel::new(RgbImage::new(10, 10)));
    }
    assert_eq!(figure.render(&painter).dimensions(), (200, 100));
  }

  #[test]
  fn shapes_scale_with_panel() {
    let painter = Painter::new().unwrap();
    let mut panel = Panel::new(RgbImage::new(10, 10));
    panel.push(rect(2.0, 2.0, 4.0, 4.0));
    let figure = Figure::single(panel).with_size(Some((20, 20)));

    let canvas = figure.render(&painter);
    assert_eq!(canvas.get_pixel(4, 4), &Rgb([255, 0, 0]));
    assert_eq!(canvas.get_pixel(11, 11), &Rgb([255, 0, 0]));
    assert_eq!(canvas.get_pixel(7, 7), &Rgb([0, 0, 0]));
  }

  #[test]
  fn rects_skips_text() {
    let mut panel = Panel::new(RgbImage::new(4, 4));
    panel.push(rect(0.0, 0.0, 1.0, 1.0));
    panel.push(Shape::Text {
      x: 0.0,
      y: 0.0,
      text: "a".to_string(),
      color: [0, 0, 0],
      size: 10.0,
    });
    assert_eq!(panel.rects().count(), 1);
  }
}
