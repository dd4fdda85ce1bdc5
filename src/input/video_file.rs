// 该文件是 Shanan Vis（山南西风·可视化）项目的一部分。
// src/input/video_file.rs - 视频文件输入
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

//! # 视频文件输入模块
//!
//! 基于 GStreamer 解码视频文件，管道为：
//!
//! ```text
//! filesrc ! decodebin ! videoconvert ! videoflip video-direction=auto
//!   ! videoconvert ! video/x-raw,format=RGB ! appsink
//! ```
//!
//! `videoflip` 按文件中的旋转标签转正画面，帧尺寸取自解码后的 caps。
//!
//! # URL 格式
//!
//! - `video:///path/to/input.mp4`
//!
//! ## 系统依赖
//!
//! 需要安装 GStreamer 开发库及 base/good 插件：
//!
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev \
//!   gstreamer1.0-plugins-good
//! ```

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, input::VideoSource, url_file_path};

#[derive(Error, Debug)]
pub enum VideoFileInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("无法读取视频源 {path}: {reason}")]
  Unreadable { path: String, reason: String },
  #[error("GStreamer 错误: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer 操作错误: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("状态切换错误: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  #[error("无法从 caps 获取视频信息")]
  VideoInfoError,
  #[error("不支持的视频格式: {0:?}")]
  UnsupportedFormat(gst_video::VideoFormat),
  #[error("缓冲区大小不匹配: 期望 {expected} 字节, 实际 {actual} 字节")]
  BufferSizeMismatch { expected: usize, actual: usize },
  #[error("解码失败: {0}")]
  DecodeError(String),
}

const PIPELINE: &str = "filesrc name=src ! decodebin ! videoconvert \
  ! videoflip video-direction=auto ! videoconvert ! video/x-raw,format=RGB \
  ! appsink name=sink sync=false max-buffers=4 drop=false";

/// 等待管道预滚的最长时间
const PREROLL_TIMEOUT_SECS: u64 = 10;
/// 每次拉取样本的等待时间，超时后检查总线错误
const PULL_TIMEOUT_MS: u64 = 200;

/// 由帧率分数计算帧率，可变帧率（0/1）返回 `None`
fn fraction_to_fps(numer: i32, denom: i32) -> Option<f64> {
  if numer <= 0 || denom <= 0 {
    return None;
  }
  Some(numer as f64 / denom as f64)
}

/// 去掉每行末尾的对齐填充，得到紧密排列的 RGB 数据
fn pack_rgb_rows(data: &[u8], width: usize, height: usize, stride: usize) -> Option<Vec<u8>> {
  let row = width * 3;
  if stride < row {
    return None;
  }
  if height == 0 {
    return Some(Vec::new());
  }
  if data.len() < stride * (height - 1) + row {
    return None;
  }

  let mut packed = Vec::with_capacity(row * height);
  for y in 0..height {
    packed.extend_from_slice(&data[y * stride..y * stride + row]);
  }
  Some(packed)
}

/// 取出总线上的第一条错误消息
fn bus_error(pipeline: &gst::Pipeline) -> Option<String> {
  let bus = pipeline.bus()?;
  let message = bus.pop_filtered(&[gst::MessageType::Error])?;
  match message.view() {
    gst::MessageView::Error(err) => Some(format!("{} ({:?})", err.error(), err.debug())),
    _ => None,
  }
}

/// 视频文件输入源
pub struct VideoFileInput {
  path: String,
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  width: u32,
  height: u32,
  fps: Option<f64>,
  frame_index: u64,
  finished: bool,
}

impl FromUrlWithScheme for VideoFileInput {
  const SCHEME: &'static str = "video";
}

impl FromUrl for VideoFileInput {
  type Error = VideoFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(VideoFileInputError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }
    Self::open(&url_file_path(url))
  }
}

impl VideoFileInput {
  /// 打开视频文件并预滚到第一帧
  ///
  /// 文件不存在、没有视频流或无法解码时返回 [`VideoFileInputError::Unreadable`]。
  pub fn open(path: &str) -> Result<Self, VideoFileInputError> {
    let unreadable = |reason: String| VideoFileInputError::Unreadable {
      path: path.to_string(),
      reason,
    };

    if !std::path::Path::new(path).is_file() {
      return Err(unreadable("文件不存在".to_string()));
    }

    gst::init().map_err(|e| unreadable(format!("GStreamer 初始化失败: {}", e)))?;

    let pipeline = gst::parse::launch(PIPELINE)
      .map_err(|e| unreadable(format!("无法创建管道: {}", e)))?
      .downcast::<gst::Pipeline>()
      .map_err(|_| unreadable("无法创建管道".to_string()))?;

    let source = pipeline
      .by_name("src")
      .ok_or_else(|| unreadable("找不到 filesrc 元素".to_string()))?;
    source.set_property("location", path);

    let appsink = pipeline
      .by_name("sink")
      .ok_or_else(|| unreadable("找不到 appsink 元素".to_string()))?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| unreadable("无法转换为 appsink".to_string()))?;

    info!("GStreamer 管道: {}", PIPELINE);

    // 预滚失败说明文件无法解码
    let preroll = pipeline
      .set_state(gst::State::Paused)
      .and_then(|_| pipeline.state(gst::ClockTime::from_seconds(PREROLL_TIMEOUT_SECS)).0);
    if let Err(e) = preroll {
      let reason = bus_error(&pipeline).unwrap_or_else(|| e.to_string());
      if let Err(e) = pipeline.set_state(gst::State::Null) {
        warn!("停止 GStreamer 管道失败: {}", e);
      }
      return Err(unreadable(reason));
    }

    let info = appsink
      .static_pad("sink")
      .and_then(|pad| pad.current_caps())
      .and_then(|caps| gst_video::VideoInfo::from_caps(&caps).ok());
    let Some(info) = info else {
      if let Err(e) = pipeline.set_state(gst::State::Null) {
        warn!("停止 GStreamer 管道失败: {}", e);
      }
      return Err(unreadable("找不到视频流".to_string()));
    };

    let fps = fraction_to_fps(info.fps().numer(), info.fps().denom());
    pipeline.set_state(gst::State::Playing)?;

    info!(
      "视频源已打开: {} ({}x{}, {:?} fps)",
      path,
      info.width(),
      info.height(),
      fps
    );

    Ok(Self {
      path: path.to_string(),
      pipeline,
      appsink,
      width: info.width(),
      height: info.height(),
      fps,
      frame_index: 0,
      finished: false,
    })
  }

  fn pull_sample(&mut self) -> Result<Option<gst::Sample>, VideoFileInputError> {
    loop {
      if let Some(sample) = self
        .appsink
        .try_pull_sample(gst::ClockTime::from_mseconds(PULL_TIMEOUT_MS))
      {
        return Ok(Some(sample));
      }
      if self.appsink.is_eos() {
        self.finished = true;
        debug!("视频源读取完毕: {} ({} 帧)", self.path, self.frame_index);
        return Ok(None);
      }
      if let Some(reason) = bus_error(&self.pipeline) {
        self.finished = true;
        return Err(VideoFileInputError::DecodeError(reason));
      }
    }
  }
}

fn convert_sample(sample: &gst::Sample) -> Result<RgbImage, VideoFileInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| VideoFileInputError::DecodeError("样本中没有缓冲区".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| VideoFileInputError::DecodeError("样本中没有 caps".to_string()))?;
  let info = gst_video::VideoInfo::from_caps(caps).map_err(|_| VideoFileInputError::VideoInfoError)?;

  if info.format() != gst_video::VideoFormat::Rgb {
    return Err(VideoFileInputError::UnsupportedFormat(info.format()));
  }

  let width = info.width() as usize;
  let height = info.height() as usize;
  let stride = info.stride()[0].max(0) as usize;
  let offset = info.offset()[0];

  let map = buffer.map_readable()?;
  let data = map.as_slice().get(offset..).unwrap_or_default();
  let packed = pack_rgb_rows(data, width, height, stride).ok_or(
    VideoFileInputError::BufferSizeMismatch {
      expected: offset + stride * height,
      actual: map.size(),
    },
  )?;

  RgbImage::from_raw(info.width(), info.height(), packed)
    .ok_or_else(|| VideoFileInputError::DecodeError("帧数据长度不匹配".to_string()))
}

impl VideoSource for VideoFileInput {
  type Error = VideoFileInputError;

  fn width(&self) -> u32 {
    self.width
  }

  fn height(&self) -> u32 {
    self.height
  }

  fn fps(&self) -> Option<f64> {
    self.fps
  }

  fn read_frame(&mut self) -> Result<Option<Frame>, Self::Error> {
    if self.finished {
      return Ok(None);
    }

    let Some(sample) = self.pull_sample()? else {
      return Ok(None);
    };
    let image = convert_sample(&sample)?;
    if image.dimensions() != (self.width, self.height) {
      return Err(VideoFileInputError::DecodeError(format!(
        "帧尺寸 {}x{} 与视频尺寸 {}x{} 不一致",
        image.width(),
        image.height(),
        self.width,
        self.height
      )));
    }

    let frame = Frame {
      image,
      index: self.frame_index,
    };
    self.frame_index += 1;
    Ok(Some(frame))
  }
}

impl Drop for VideoFileInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("停止 GStreamer 管道失败: {}", e);
    }
    debug!("视频源已释放: {} ({} 帧)", self.path, self.frame_index);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fps_from_fraction() {
    assert_eq!(fraction_to_fps(30, 1), Some(30.0));
    assert!((fraction_to_fps(30000, 1001).unwrap() - 29.97).abs() < 0.01);
    assert_eq!(fraction_to_fps(0, 1), None);
  }

  #[test]
  fn padded_rows_are_packed() {
    // 宽 3 像素，每行 9 字节，按 4 字节对齐到 12
    let mut data = Vec::new();
    for y in 0..2u8 {
      data.extend((0..9).map(|i| y * 10 + i));
      data.extend([0xEE; 3]);
    }
    let packed = pack_rgb_rows(&data, 3, 2, 12).unwrap();
    assert_eq!(packed.len(), 18);
    assert_eq!(&packed[..9], &[0, 1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(&packed[9..], &[10, 11, 12, 13, 14, 15, 16, 17, 18]);
    assert!(!packed.contains(&0xEE));
  }

  #[test]
  fn short_buffers_are_rejected() {
    assert_eq!(pack_rgb_rows(&[0; 20], 3, 2, 12), None);
    assert_eq!(pack_rgb_rows(&[0; 24], 4, 2, 8), None);
  }

  #[test]
  fn missing_file_is_unreadable() {
    let path = std::env::temp_dir().join("shanan-vis-no-such-video.mp4");
    assert!(matches!(
      VideoFileInput::open(&path.to_string_lossy()),
      Err(VideoFileInputError::Unreadable { .. })
    ));
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("image:///tmp/a.mp4").unwrap();
    assert!(matches!(
      VideoFileInput::from_url(&url),
      Err(VideoFileInputError::SchemeMismatch(_))
    ));
  }
}
