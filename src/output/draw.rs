// 该文件是 Shanan Vis（山南西风·可视化）项目的一部分。
// src/output/draw.rs - 矩形与文字绘制
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

use ab_glyph::{Font, FontArc, InvalidFont, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::output::figure::Shape;

/// 坐标变换：先缩放，再平移
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
  pub scale: f32,
  pub dx: f32,
  pub dy: f32,
}

impl Transform {
  pub const IDENTITY: Transform = Transform {
    scale: 1.0,
    dx: 0.0,
    dy: 0.0,
  };

  pub fn scaled(scale: f32) -> Self {
    Transform {
      scale,
      dx: 0.0,
      dy: 0.0,
    }
  }

  fn apply(&self, x: f32, y: f32) -> (f32, f32) {
    (x * self.scale + self.dx, y * self.scale + self.dy)
  }
}

/// 画笔，持有标签所用的字体
#[derive(Clone)]
pub struct Painter {
  font: FontArc,
}

impl Painter {
  /// 使用内置的 DejaVu Sans 字体
  pub fn new() -> Result<Self, InvalidFont> {
    let font_data = include_bytes!("../../assets/DejaVuSans.ttf");
    let font = FontArc::try_from_slice(font_data)?;
    Ok(Self { font })
  }

  pub fn with_font(font: FontArc) -> Self {
    Self { font }
  }

  pub fn font(&self) -> &FontArc {
    &self.font
  }

  /// 文字渲染后的像素尺寸 (宽, 高)
  pub fn text_size(&self, size: f32, text: &str) -> (u32, u32) {
    text_size(PxScale::from(size), &self.font, text)
  }

  /// 按变换绘制一组图形
  pub fn paint(&self, image: &mut RgbImage, shapes: &[Shape], transform: Transform) {
    for shape in shapes {
      match shape {
        Shape::Rect {
          x,
          y,
          width,
          height,
          color,
          thickness,
        } => {
          let (x0, y0) = transform.apply(*x, *y);
          let w = width * transform.scale;
          let h = height * transform.scale;
          draw_rect(image, x0, y0, w, h, Rgb(*color), *thickness);
        }
        Shape::Text {
          x,
          y,
          text,
          color,
          size,
        } => {
          let (x0, baseline) = transform.apply(*x, *y);
          self.draw_text(image, x0, baseline, text, Rgb(*color), size * transform.scale);
        }
      }
    }
  }

  /// 在 (x, baseline) 处绘制文字，文字上沿截断在图像内
  fn draw_text(
    &self,
    image: &mut RgbImage,
    x: f32,
    baseline: f32,
    text: &str,
    color: Rgb<u8>,
    size: f32,
  ) {
    if text.is_empty() || size < 1.0 {
      return;
    }
    let scale = PxScale::from(size);
    let ascent = self.font.as_scaled(scale).ascent();
    let top = (baseline - ascent).round().max(0.0);
    let left = x.round().max(0.0);
    if !(left < image.width() as f32 && top < image.height() as f32) {
      return;
    }
    let (left, top) = (left as i32, top as i32);

    draw_text_mut(image, color, left, top, scale, &self.font, text);
  }
}

/// 绘制空心矩形；线宽大于 1 时以边线为中心向内外扩展
pub fn draw_rect(
  image: &mut RgbImage,
  x: f32,
  y: f32,
  width: f32,
  height: f32,
  color: Rgb<u8>,
  thickness: u32,
) {
  // 负宽高时换算成左上角
  let (x, width) = if width < 0.0 { (x + width, -width) } else { (x, width) };
  let (y, height) = if height < 0.0 { (y + height, -height) } else { (y, height) };

  let thickness = thickness.max(1) as i64;
  let half = (thickness - 1) / 2;
  let (img_w, img_h) = image.dimensions();

  // 边线只会向外扩展 half 个像素，画布外更远处的部分截掉
  let margin = thickness + 1;
  let clamp = |v: f64, dim: u32| v.clamp(-(margin as f64), (dim as i64 + margin) as f64) as i64;
  let left = x.round() as f64;
  let top = y.round() as f64;
  let x0 = clamp(left, img_w);
  let y0 = clamp(top, img_h);
  let w = (clamp(left + (width.round() as f64).max(1.0), img_w) - x0).max(1);
  let h = (clamp(top + (height.round() as f64).max(1.0), img_h) - y0).max(1);

  for i in 0..thickness {
    let inset = i - half;
    let (rw, rh) = (w - 2 * inset, h - 2 * inset);
    if rw <= 0 || rh <= 0 {
      continue;
    }
    let rect = Rect::at((x0 + inset) as i32, (y0 + inset) as i32).of_size(rw as u32, rh as u32);
    draw_hollow_rect_mut(image, rect, color);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const RED: Rgb<u8> = Rgb([255, 0, 0]);

  #[test]
  fn draws_single_pixel_border() {
    let mut image = RgbImage::new(20, 20);
    draw_rect(&mut image, 5.0, 5.0, 6.0, 4.0, RED, 1);

    assert_eq!(image.get_pixel(5, 5), &RED);
    assert_eq!(image.get_pixel(10, 5), &RED);
    assert_eq!(image.get_pixel(5, 8), &RED);
    assert_eq!(image.get_pixel(10, 8), &RED);
    // 内部不填充
    assert_eq!(image.get_pixel(7, 6), &Rgb([0, 0, 0]));
    assert_eq!(image.get_pixel(11, 5), &Rgb([0, 0, 0]));
  }

  #[test]
  fn thick_border_grows_both_ways() {
    let mut image = RgbImage::new(20, 20);
    draw_rect(&mut image, 5.0, 5.0, 8.0, 8.0, RED, 3);

    assert_eq!(image.get_pixel(4, 4), &RED);
    assert_eq!(image.get_pixel(5, 5), &RED);
    assert_eq!(image.get_pixel(6, 6), &RED);
    assert_eq!(image.get_pixel(8, 8), &Rgb([0, 0, 0]));
  }

  #[test]
  fn negative_extent_is_normalized() {
    let mut image = RgbImage::new(20, 20);
    draw_rect(&mut image, 10.0, 10.0, -5.0, -5.0, RED, 1);
    assert_eq!(image.get_pixel(5, 5), &RED);
  }

  #[test]
  fn huge_thick_rect_is_clipped_to_canvas() {
    let mut image = RgbImage::new(20, 20);
    draw_rect(&mut image, 0.0, 0.0, 1e10, 1e10, RED, 3);

    // 只有左边和上边落在画布内
    assert_eq!(image.get_pixel(0, 10), &RED);
    assert_eq!(image.get_pixel(1, 10), &RED);
    assert_eq!(image.get_pixel(10, 0), &RED);
    assert_eq!(image.get_pixel(19, 19), &Rgb([0, 0, 0]));
    assert_eq!(image.get_pixel(10, 10), &Rgb([0, 0, 0]));
  }

  #[test]
  fn far_away_rect_draws_nothing() {
    let mut image = RgbImage::new(20, 20);
    draw_rect(&mut image, -1e12, 5e11, 3.0, 3.0, RED, 3);
    draw_rect(&mut image, f32::MAX, f32::MIN, f32::MAX, 4.0, RED, 3);
    assert!(image.pixels().all(|p| p == &Rgb([0, 0, 0])));
  }

  #[test]
  fn text_outside_canvas_is_skipped() {
    let painter = Painter::new().unwrap();
    let mut image = RgbImage::new(20, 20);
    let shapes = vec![Shape::Text {
      x: 1e10,
      y: 1e10,
      text: "far".to_string(),
      color: [255, 255, 255],
      size: 20.0,
    }];
    painter.paint(&mut image, &shapes, Transform::IDENTITY);
    assert!(image.pixels().all(|p| p == &Rgb([0, 0, 0])));
  }

  #[test]
  fn painter_draws_text_inside_image() {
    let painter = Painter::new().unwrap();
    let mut image = RgbImage::new(120, 40);
    let shapes = vec![Shape::Text {
      x: 2.0,
      y: 30.0,
      text: "dog: 0.9".to_string(),
      color: [255, 255, 255],
      size: 20.0,
    }];
    painter.paint(&mut image, &shapes, Transform::IDENTITY);
    assert!(image.pixels().any(|p| p[0] > 0));
  }
}
