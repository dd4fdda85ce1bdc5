// 该文件是 Shanan Vis（山南西风·可视化）项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{Display, Figure, Painter},
  url_file_path,
};

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("字体加载错误: {0}")]
  FontError(#[from] ab_glyph::InvalidFont),
}

/// 把图形渲染后保存为单个图像文件，重复显示会覆盖同一文件
pub struct SaveImageFileOutput {
  path: PathBuf,
  painter: Painter,
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Self::new(url_file_path(uri))
  }
}

impl SaveImageFileOutput {
  pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, SaveImageFileError> {
    Ok(SaveImageFileOutput {
      path: path.as_ref().to_path_buf(),
      painter: Painter::new()?,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Display for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn show(&self, figure: &Figure) -> Result<(), Self::Error> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let image = figure.render(&self.painter);
    image.save(&self.path)?;

    info!("保存图像到文件: {}", self.path.display());

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::output::Panel;
  use image::RgbImage;

  #[test]
  fn saves_rendered_figure() {
    let dir = std::env::temp_dir().join(format!("shanan-vis-save-{}", std::process::id()));
    let path = dir.join("nested").join("figure.png");
    let output = SaveImageFileOutput::new(&path).unwrap();

    let figure = Figure::single(Panel::new(RgbImage::new(16, 12)));
    output.show(&figure).unwrap();

    let saved = image::open(&path).unwrap();
    assert_eq!((saved.width(), saved.height()), (16, 12));

    std::fs::remove_dir_all(&dir).unwrap();
  }
}
