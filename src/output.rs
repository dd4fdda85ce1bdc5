// 该文件是 Shanan Vis（山南西风·可视化）项目的一部分。
// src/output.rs - 输出定义
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

use image::RgbImage;
use thiserror::Error;
use url::Url;

use crate::FromUrl;
#[cfg(any(feature = "save_image_file", feature = "directory_record"))]
use crate::FromUrlWithScheme;

pub mod draw;
pub mod figure;

pub use self::draw::Painter;
pub use self::figure::{Figure, Panel, Shape};

/// 顺序写入的视频输出
pub trait VideoSink {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 按调用顺序追加一帧
  fn write_frame(&mut self, image: &RgbImage) -> Result<(), Self::Error>;

  /// 完成写入并释放资源，多次调用无副作用
  fn finish(&mut self) -> Result<(), Self::Error>;
}

impl<S: VideoSink + ?Sized> VideoSink for Box<S> {
  type Error = S::Error;

  fn write_frame(&mut self, image: &RgbImage) -> Result<(), Self::Error> {
    (**self).write_frame(image)
  }

  fn finish(&mut self) -> Result<(), Self::Error> {
    (**self).finish()
  }
}

/// 图形显示面
///
/// 接收一幅组合好的图形并阻塞到显示（或保存）完成。
pub trait Display {
  type Error: std::error::Error + Send + Sync + 'static;

  fn show(&self, figure: &Figure) -> Result<(), Self::Error>;
}

impl<D: Display + ?Sized> Display for &D {
  type Error = D::Error;

  fn show(&self, figure: &Figure) -> Result<(), Self::Error> {
    (**self).show(figure)
  }
}

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "video_file")]
mod save_video_file;
#[cfg(feature = "video_file")]
pub use self::save_video_file::{DEFAULT_FPS, SaveVideoFileError, SaveVideoFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 按 URL 方案选择的显示输出
pub enum DisplayWrapper {
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
}

impl FromUrl for DisplayWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(DisplayWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(DisplayWrapper::DirectoryRecordOutput(output))
      }
      scheme => Err(OutputError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl Display for DisplayWrapper {
  type Error = OutputError;

  fn show(&self, figure: &Figure) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      DisplayWrapper::SaveImageFileOutput(output) => output.show(figure).map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      DisplayWrapper::DirectoryRecordOutput(output) => {
        output.show(figure).map_err(OutputError::from)
      }
    }
  }
}
