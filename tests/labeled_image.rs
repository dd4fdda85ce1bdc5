// 该文件是 Shanan Vis（山南西风·可视化）项目的一部分。
// tests/labeled_image.rs - 边界框叠加测试
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

use std::cell::RefCell;
use std::convert::Infallible;

use image::{Rgb, RgbImage};
use shanan_vis::{
  frame::{Image, NormalizedTensor},
  model::BBox,
  output::{Display, Figure, Painter, Shape},
  visualize::{Boxes, labeled_image, show_labeled_image},
};

#[derive(Default)]
struct RecordingDisplay {
  shown: RefCell<Vec<Figure>>,
}

impl Display for RecordingDisplay {
  type Error = Infallible;

  fn show(&self, figure: &Figure) -> Result<(), Self::Error> {
    self.shown.borrow_mut().push(figure.clone());
    Ok(())
  }
}

fn rect_extents(figure: &Figure) -> Vec<(f32, f32, f32, f32)> {
  figure.panels()[0]
    .shapes
    .iter()
    .map(|s| match s {
      Shape::Rect { x, y, width, height, .. } => (*x, *y, *width, *height),
      other => panic!("不应绘制标签: {:?}", other),
    })
    .collect()
}

#[test]
fn single_box_draws_one_rectangle() {
  let image = Image::from(RgbImage::new(32, 32));
  let figure = labeled_image(&image, [2.0_f32, 3.0, 12.0, 20.0]);

  assert_eq!(figure.panels().len(), 1);
  assert_eq!(rect_extents(&figure), vec![(2.0, 3.0, 10.0, 17.0)]);
}

#[test]
fn many_boxes_keep_input_order() {
  let image = Image::from(RgbImage::new(32, 32));
  let boxes = vec![[0.0_f32, 0.0, 4.0, 4.0], [10.0, 10.0, 30.0, 20.0], [5.0, 6.0, 7.0, 9.0]];
  let display = RecordingDisplay::default();

  show_labeled_image(&image, boxes, &display).unwrap();

  let shown = display.shown.borrow();
  assert_eq!(
    rect_extents(&shown[0]),
    vec![(0.0, 0.0, 4.0, 4.0), (10.0, 10.0, 20.0, 10.0), (5.0, 6.0, 2.0, 3.0)]
  );
  assert!(shown[0].panels()[0].title.is_none());
}

#[test]
fn flat_boxes_match_nested_boxes() {
  let flat = Boxes::from_flat(&[1.0, 1.0, 3.0, 3.0, 4.0, 4.0, 8.0, 8.0]).unwrap();
  let nested = Boxes::from(vec![BBox::new(1.0, 1.0, 3.0, 3.0), BBox::new(4.0, 4.0, 8.0, 8.0)]);
  assert_eq!(flat, nested);
}

#[test]
fn tensor_is_converted_without_denormalizing() {
  let tensor = NormalizedTensor::from_chw(vec![1.0; 3 * 4 * 4], 4, 4).unwrap();
  let figure = labeled_image(&Image::Tensor(tensor), BBox::new(0.0, 0.0, 2.0, 2.0));

  assert_eq!(figure.panels()[0].image.get_pixel(3, 3), &Rgb([255, 255, 255]));
}

#[test]
fn rendered_overlay_is_red_and_unfilled() {
  let image = Image::from(RgbImage::new(20, 20));
  let figure = labeled_image(&image, [5.0_f32, 5.0, 15.0, 15.0]);
  let canvas = figure.render(&Painter::new().unwrap());

  assert_eq!(canvas.dimensions(), (20, 20));
  assert_eq!(canvas.get_pixel(5, 5), &Rgb([255, 0, 0]));
  assert_eq!(canvas.get_pixel(14, 14), &Rgb([255, 0, 0]));
  assert_eq!(canvas.get_pixel(10, 10), &Rgb([0, 0, 0]));
}

#[test]
fn oversized_box_is_clipped_to_image() {
  let image = Image::from(RgbImage::new(20, 20));
  let figure = labeled_image(&image, [0.0_f32, 0.0, 1e10, 1e10]);
  let canvas = figure.render(&Painter::new().unwrap());

  assert_eq!(canvas.dimensions(), (20, 20));
  assert_eq!(canvas.get_pixel(0, 10), &Rgb([255, 0, 0]));
  assert_eq!(canvas.get_pixel(10, 10), &Rgb([0, 0, 0]));
}
