// 该文件是 Shanan Vis（山南西风·可视化）项目的一部分。
// src/frame.rs - 帧与张量表示
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

use image::{ImageBuffer, Rgb, RgbImage, imageops::FilterType};

const RGB_CHANNELS: usize = 3;

/// ImageNet 均值（按 R、G、B 顺序）
pub const NORMALIZE_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet 标准差（按 R、G、B 顺序）
pub const NORMALIZE_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub trait ToRgbImage {
  fn to_rgb_image(&self) -> RgbImage;
}

pub trait FromRgbImage {
  fn from_rgb_image(image: &RgbImage) -> Self;
}

/// 视频帧
#[derive(Debug, Clone)]
pub struct Frame {
  /// RGB 图像数据
  pub image: RgbImage,
  /// 帧索引（从 0 开始）
  pub index: u64,
}

/// CHW 排布的浮点张量，已按 ImageNet 均值/标准差归一化
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
  data: Box<[f32]>,
  width: u32,
  height: u32,
}

impl NormalizedTensor {
  /// 由 CHW 数据构造，长度必须为 3 * width * height
  pub fn from_chw(data: Vec<f32>, width: u32, height: u32) -> Option<Self> {
    if data.len() != RGB_CHANNELS * width as usize * height as usize {
      return None;
    }
    Some(Self {
      data: data.into_boxed_slice(),
      width,
      height,
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn as_chw(&self) -> &[f32] {
    &self.data
  }

  fn plane(&self) -> usize {
    self.width as usize * self.height as usize
  }

  /// 反归一化到 [0, 1] 区间（未截断）
  pub fn reverse_normalize(&self) -> Vec<f32> {
    let plane = self.plane();
    self
      .data
      .iter()
      .enumerate()
      .map(|(i, v)| {
        let c = i / plane;
        v * NORMALIZE_STD[c] + NORMALIZE_MEAN[c]
      })
      .collect()
  }
}

impl FromRgbImage for NormalizedTensor {
  fn from_rgb_image(image: &RgbImage) -> Self {
    let (width, height) = image.dimensions();
    let plane = (width * height) as usize;
    let mut data = vec![0f32; plane * RGB_CHANNELS];

    for (x, y, pixel) in image.enumerate_pixels() {
      let idx = (y * width + x) as usize;
      for c in 0..RGB_CHANNELS {
        let value = pixel[c] as f32 / 255.0;
        data[c * plane + idx] = (value - NORMALIZE_MEAN[c]) / NORMALIZE_STD[c];
      }
    }

    Self {
      data: data.into_boxed_slice(),
      width,
      height,
    }
  }
}

impl ToRgbImage for NormalizedTensor {
  fn to_rgb_image(&self) -> RgbImage {
    chw_unit_to_rgb(&self.reverse_normalize(), self.width, self.height)
  }
}

/// 将 [0, 1] 区间的 CHW 数据转为 RGB 图像，越界值截断
fn chw_unit_to_rgb(data: &[f32], width: u32, height: u32) -> RgbImage {
  let plane = width as usize * height as usize;
  let to_u8 = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;

  ImageBuffer::from_fn(width, height, |x, y| {
    let idx = y as usize * width as usize + x as usize;
    Rgb([
      to_u8(data[idx]),
      to_u8(data[plane + idx]),
      to_u8(data[2 * plane + idx]),
    ])
  })
}

/// 检测器可接受的图像形式：原始栅格或归一化张量
#[derive(Debug, Clone)]
pub enum Image {
  Raster(RgbImage),
  Tensor(NormalizedTensor),
}

impl Image {
  pub fn width(&self) -> u32 {
    match self {
      Image::Raster(image) => image.width(),
      Image::Tensor(tensor) => tensor.width(),
    }
  }

  pub fn height(&self) -> u32 {
    match self {
      Image::Raster(image) => image.height(),
      Image::Tensor(tensor) => tensor.height(),
    }
  }

  pub fn is_tensor(&self) -> bool {
    matches!(self, Image::Tensor(_))
  }

  /// 张量按“仅截断到 [0, 255]”的方式直接转换，不做反归一化
  pub fn to_raster_unnormalized(&self) -> RgbImage {
    match self {
      Image::Raster(image) => image.clone(),
      Image::Tensor(tensor) => chw_unit_to_rgb(tensor.as_chw(), tensor.width(), tensor.height()),
    }
  }
}

impl ToRgbImage for Image {
  fn to_rgb_image(&self) -> RgbImage {
    match self {
      Image::Raster(image) => image.clone(),
      Image::Tensor(tensor) => tensor.to_rgb_image(),
    }
  }
}

impl ToRgbImage for RgbImage {
  fn to_rgb_image(&self) -> RgbImage {
    self.clone()
  }
}

impl FromRgbImage for RgbImage {
  fn from_rgb_image(image: &RgbImage) -> Self {
    image.clone()
  }
}

impl From<RgbImage> for Image {
  fn from(image: RgbImage) -> Self {
    Image::Raster(image)
  }
}

impl From<NormalizedTensor> for Image {
  fn from(tensor: NormalizedTensor) -> Self {
    Image::Tensor(tensor)
  }
}

/// 按短边缩放到 `short_side`，保持宽高比（双线性）
pub fn resize_short_side(image: &RgbImage, short_side: u32) -> RgbImage {
  let (width, height) = image.dimensions();
  if width == 0 || height == 0 || short_side == 0 {
    return image.clone();
  }

  let (new_width, new_height) = if width <= height {
    let long = (short_side as u64 * height as u64 / width as u64) as u32;
    (short_side, long.max(1))
  } else {
    let long = (short_side as u64 * width as u64 / height as u64) as u32;
    (long.max(1), short_side)
  };

  if (new_width, new_height) == (width, height) {
    return image.clone();
  }

  image::imageops::resize(image, new_width, new_height, FilterType::Triangle)
}
