// 该文件是 Shanan Vis（山南西风·可视化）项目的一部分。
// src/input.rs - 视频/图像输入
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

use crate::frame::Frame;

/// 顺序读取的视频源
///
/// 源在被丢弃时释放其持有的资源（文件句柄、子进程等）。
pub trait VideoSource {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 帧宽度
  fn width(&self) -> u32;

  /// 帧高度
  fn height(&self) -> u32;

  /// 帧率（如果已知）
  fn fps(&self) -> Option<f64>;

  /// 读取下一帧，读完后返回 `Ok(None)`
  fn read_frame(&mut self) -> Result<Option<Frame>, Self::Error>;
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
  type Error = S::Error;

  fn width(&self) -> u32 {
    (**self).width()
  }

  fn height(&self) -> u32 {
    (**self).height()
  }

  fn fps(&self) -> Option<f64> {
    (**self).fps()
  }

  fn read_frame(&mut self) -> Result<Option<Frame>, Self::Error> {
    (**self).read_frame()
  }
}

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError, read_image};

#[cfg(feature = "video_file")]
mod video_file;
#[cfg(feature = "video_file")]
pub use self::video_file::{VideoFileInput, VideoFileInputError};
