// 该文件是 Shanan Vis（山南西风·可视化）项目的一部分。
// src/output/save_video_file.rs - 保存视频文件
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

//! 视频文件输出模块
//!
//! 逐帧写入的图像先缓存在输出文件旁的临时目录中，`finish` 时调用 ffmpeg
//! 编码为视频。
//!
//! # URL 格式
//!
//! - `video:///path/to/output.avi` - 默认 30 fps
//! - `video:///path/to/output.avi?fps=20` - 指定帧率
//!
//! `.avi` 输出使用 MPEG-4（DIVX 标签）编码，其他扩展名使用 H.264。
//!
//! # 依赖
//!
//! 此模块需要系统安装 ffmpeg 命令行工具来编码视频。

use std::path::{Path, PathBuf};
use std::process::Command;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, output::VideoSink, url_file_path};

#[derive(Error, Debug)]
pub enum SaveVideoFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("视频编码错误: {0}")]
  EncodingError(String),
  #[error("参数验证错误: {0}")]
  ValidationError(String),
}

pub const DEFAULT_FPS: u32 = 30;
const MIN_FPS: u32 = 1;
const MAX_FPS: u32 = 120;

/// 视频帧缓存
struct FrameBuffer {
  temp_dir: PathBuf,
  frames: usize,
  dimensions: Option<(u32, u32)>,
}

impl FrameBuffer {
  fn new(output_path: &Path) -> Result<Self, SaveVideoFileError> {
    // 在输出文件旁边创建临时目录
    let mut temp_dir = output_path.as_os_str().to_owned();
    temp_dir.push(".frames");
    let temp_dir = PathBuf::from(temp_dir);
    std::fs::create_dir_all(&temp_dir)?;

    Ok(FrameBuffer {
      temp_dir,
      frames: 0,
      dimensions: None,
    })
  }

  fn add_frame(&mut self, image: &RgbImage) -> Result<(), SaveVideoFileError> {
    let dimensions = image.dimensions();
    match self.dimensions {
      None => self.dimensions = Some(dimensions),
      Some(expected) if expected != dimensions => {
        return Err(SaveVideoFileError::ValidationError(format!(
          "帧尺寸 {}x{} 与首帧 {}x{} 不一致",
          dimensions.0, dimensions.1, expected.0, expected.1
        )));
      }
      Some(_) => {}
    }

    let frame_path = self.temp_dir.join(format!("frame_{:06}.png", self.frames));
    image.save(&frame_path)?;
    self.frames += 1;

    Ok(())
  }

  fn encode_to_video(&self, output_path: &Path, fps: u32) -> Result<(), SaveVideoFileError> {
    if self.frames == 0 {
      info!("没有帧可以编码为视频，跳过编码过程");
      return Ok(());
    }

    info!(
      "开始编码视频: {} 帧 @ {} fps -> {}",
      self.frames,
      fps,
      output_path.display()
    );

    if let Some(parent) = output_path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let mut command = Command::new("ffmpeg");
    command
      .arg("-y")
      .args(["-loglevel", "error"])
      .arg("-framerate")
      .arg(fps.to_string())
      .arg("-i")
      .arg(self.temp_dir.join("frame_%06d.png"))
      .args(codec_args(output_path))
      .arg(output_path);

    let output = command.output().map_err(|e| {
      error!("无法执行 ffmpeg: {}", e);
      SaveVideoFileError::EncodingError(format!("无法执行 ffmpeg (请确保已安装): {}", e))
    })?;

    if output.status.success() {
      info!("视频编码成功: {}", output_path.display());
      Ok(())
    } else {
      let stderr = String::from_utf8_lossy(&output.stderr);
      error!("ffmpeg 错误: {}", stderr);
      Err(SaveVideoFileError::EncodingError(format!(
        "ffmpeg 失败: {}",
        stderr
      )))
    }
  }

  fn cleanup(&self) {
    if let Err(e) = std::fs::remove_dir_all(&self.temp_dir) {
      warn!("清理临时目录失败: {}", e);
    }
  }
}

fn is_avi(path: &Path) -> bool {
  path
    .extension()
    .and_then(|e| e.to_str())
    .is_some_and(|e| e.eq_ignore_ascii_case("avi"))
}

/// yuv420p 要求宽高为偶数，奇数尺寸补一行/列
const EVEN_PAD_FILTER: &str = "pad=ceil(iw/2)*2:ceil(ih/2)*2";

/// 按输出扩展名选择编码参数
fn codec_args(path: &Path) -> Vec<&'static str> {
  if is_avi(path) {
    vec!["-c:v", "mpeg4", "-vtag", "DIVX", "-q:v", "3"]
  } else {
    vec![
      "-vf",
      EVEN_PAD_FILTER,
      "-c:v",
      "libx264",
      "-pix_fmt",
      "yuv420p",
      "-preset",
      "fast",
      "-crf",
      "23",
    ]
  }
}

/// RAII 守卫确保清理总是执行
struct CleanupGuard<'a>(&'a FrameBuffer);

impl Drop for CleanupGuard<'_> {
  fn drop(&mut self) {
    self.0.cleanup();
  }
}

pub struct SaveVideoFileOutput {
  path: PathBuf,
  fps: u32,
  buffer: Option<FrameBuffer>,
}

impl FromUrlWithScheme for SaveVideoFileOutput {
  const SCHEME: &'static str = "video";
}

impl FromUrl for SaveVideoFileOutput {
  type Error = SaveVideoFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveVideoFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let fps = match uri.query_pairs().find(|(k, _)| k == "fps") {
      Some((_, v)) => v
        .parse::<u32>()
        .map_err(|_| SaveVideoFileError::ValidationError(format!("无效的 FPS: {}", v)))?,
      None => DEFAULT_FPS,
    };

    Self::new(url_file_path(uri), fps)
  }
}

impl SaveVideoFileOutput {
  pub fn new<P: AsRef<Path>>(path: P, fps: u32) -> Result<Self, SaveVideoFileError> {
    if !(MIN_FPS..=MAX_FPS).contains(&fps) {
      return Err(SaveVideoFileError::ValidationError(format!(
        "FPS {} 超出有效范围 [{}, {}]",
        fps, MIN_FPS, MAX_FPS
      )));
    }

    let path = path.as_ref().to_path_buf();
    if is_avi(&path) {
      warn!(
        "{} 使用 MPEG-4/DIVX 编码，部分播放器（如 QuickTime）无法播放，建议使用 VLC",
        path.display()
      );
    }

    Ok(SaveVideoFileOutput {
      path,
      fps,
      buffer: None,
    })
  }

  pub fn fps(&self) -> u32 {
    self.fps
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl VideoSink for SaveVideoFileOutput {
  type Error = SaveVideoFileError;

  fn write_frame(&mut self, image: &RgbImage) -> Result<(), Self::Error> {
    if self.buffer.is_none() {
      self.buffer = Some(FrameBuffer::new(&self.path)?);
      info!("初始化视频帧缓冲区: {}", self.path.display());
    }

    if let Some(buffer) = self.buffer.as_mut() {
      buffer.add_frame(image)?;
      debug!("已缓存第 {} 帧", buffer.frames);
    }
    Ok(())
  }

  fn finish(&mut self) -> Result<(), Self::Error> {
    let Some(buffer) = self.buffer.take() else {
      return Ok(());
    };
    let _cleanup = CleanupGuard(&buffer);
    buffer.encode_to_video(&self.path, self.fps)
  }
}

impl Drop for SaveVideoFileOutput {
  fn drop(&mut self) {
    // 未显式完成时在销毁时编码
    if self.buffer.is_some() {
      if let Err(e) = self.finish() {
        error!("编码视频时出错: {}", e);
      } else {
        info!("视频已保存到文件: {}", self.path.display());
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_fps_from_url() {
    let url = Url::parse("video:///tmp/out.avi?fps=20").unwrap();
    let output = SaveVideoFileOutput::from_url(&url).unwrap();
    assert_eq!(output.fps(), 20);
    assert_eq!(output.path(), Path::new("/tmp/out.avi"));

    let url = Url::parse("video:///tmp/out.avi").unwrap();
    assert_eq!(SaveVideoFileOutput::from_url(&url).unwrap().fps(), DEFAULT_FPS);
  }

  #[test]
  fn rejects_out_of_range_fps() {
    let url = Url::parse("video:///tmp/out.avi?fps=0").unwrap();
    assert!(matches!(
      SaveVideoFileOutput::from_url(&url),
      Err(SaveVideoFileError::ValidationError(_))
    ));
    assert!(SaveVideoFileOutput::new("/tmp/out.avi", 121).is_err());
  }

  #[test]
  fn picks_codec_by_extension() {
    let avi = codec_args(Path::new("a.AVI"));
    assert!(avi.contains(&"DIVX"));
    assert!(!avi.contains(&"-vf"));

    let mp4 = codec_args(Path::new("a.mp4"));
    assert!(mp4.contains(&"libx264"));
    let filter = mp4.iter().position(|a| *a == "-vf").map(|i| mp4[i + 1]);
    assert_eq!(filter, Some(EVEN_PAD_FILTER));
  }

  #[test]
  fn rejects_frames_with_changing_size() {
    let dir = std::env::temp_dir().join(format!("shanan-vis-sink-{}", std::process::id()));
    let mut buffer = FrameBuffer::new(&dir.join("out.avi")).unwrap();
    buffer.add_frame(&RgbImage::new(4, 4)).unwrap();
    let result = buffer.add_frame(&RgbImage::new(4, 5));
    assert!(matches!(result, Err(SaveVideoFileError::ValidationError(_))));
    assert_eq!(buffer.frames, 1);

    buffer.cleanup();
    assert!(!buffer.temp_dir.exists());
    std::fs::remove_dir_all(&dir).unwrap();
  }
}
