// 该文件是 Shanan Vis（山南西风·可视化）项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::path::Path;

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Image, url_file_path};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 读取图像文件并转换为 RGB 栅格
pub fn read_image<P: AsRef<Path>>(path: P) -> Result<Image, ImageFileInputError> {
  let path = path.as_ref();
  let image = ImageReader::open(path)?.decode()?.to_rgb8();
  debug!(
    "读取图像: {} ({}x{})",
    path.display(),
    image.width(),
    image.height()
  );
  Ok(Image::Raster(image))
}

pub struct ImageFileInput {
  image: Image,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch);
    }

    Ok(ImageFileInput {
      image: read_image(url_file_path(url))?,
    })
  }
}

impl ImageFileInput {
  pub fn image(&self) -> &Image {
    &self.image
  }

  pub fn into_image(self) -> Image {
    self.image
  }
}
