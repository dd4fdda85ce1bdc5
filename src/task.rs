// 该文件是 Shanan Vis（山南西风·可视化）项目的一部分。
// src/task.rs - 视频标注任务
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

use std::cell::Cell;
use std::sync::mpsc::{Receiver, channel};

use ab_glyph::InvalidFont;
use tracing::{debug, info, warn};

use crate::{
  frame::{FromRgbImage, Image, NormalizedTensor, resize_short_side},
  input::VideoSource,
  model::Detector,
  output::{
    Painter, VideoSink,
    draw::Transform,
  },
  visualize::{BoxStyle, VisualizeError, prediction_shapes},
};

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

/// 每帧检查一次的退出信号
pub trait QuitSignal {
  fn should_quit(&self) -> bool;
}

/// 从不退出
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverQuit;

impl QuitSignal for NeverQuit {
  fn should_quit(&self) -> bool {
    false
  }
}

impl<F: Fn() -> bool> QuitSignal for F {
  fn should_quit(&self) -> bool {
    self()
  }
}

/// Ctrl-C 触发的退出信号，进程内只能安装一次
pub struct CtrlCQuit {
  rx: Receiver<()>,
  raised: Cell<bool>,
}

impl CtrlCQuit {
  pub fn install() -> Result<Self, ctrlc::Error> {
    let (tx, rx) = channel();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
    })?;
    Ok(Self {
      rx,
      raised: Cell::new(false),
    })
  }
}

impl QuitSignal for CtrlCQuit {
  fn should_quit(&self) -> bool {
    if !self.raised.get() && self.rx.try_recv().is_ok() {
      self.raised.set(true);
    }
    self.raised.get()
  }
}

/// 检测输入的短边尺寸
pub const DEFAULT_TARGET_SIZE: u32 = 800;

#[derive(Debug, Clone)]
pub struct AnnotateOptions {
  /// 送入检测器前帧的短边尺寸
  pub target_size: u32,
  pub style: BoxStyle,
}

impl Default for AnnotateOptions {
  fn default() -> Self {
    Self {
      target_size: DEFAULT_TARGET_SIZE,
      style: BoxStyle::VIDEO,
    }
  }
}

/// 标注任务统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AnnotateSummary {
  pub frames_read: u64,
  pub frames_written: u64,
  pub detections: usize,
  pub quit_early: bool,
}

/// 原始帧短边与检测输入短边之比
pub fn downscale_factor(width: u32, height: u32, target_size: u32) -> f32 {
  width.min(height) as f32 / target_size as f32
}

/// 逐帧检测并标注视频
///
/// 输入源与输出在任务结束时释放，无论是正常结束、出错还是收到退出信号；
/// 输出总会被 `finish`，出错前已写入的帧会保留。
pub struct AnnotateVideoTask<Q = NeverQuit> {
  options: AnnotateOptions,
  painter: Painter,
  quit: Q,
}

impl AnnotateVideoTask<NeverQuit> {
  pub fn new(options: AnnotateOptions) -> Result<Self, InvalidFont> {
    Ok(Self {
      options,
      painter: Painter::new()?,
      quit: NeverQuit,
    })
  }
}

impl<Q: QuitSignal> AnnotateVideoTask<Q> {
  pub fn with_quit_signal<R: QuitSignal>(self, quit: R) -> AnnotateVideoTask<R> {
    AnnotateVideoTask {
      options: self.options,
      painter: self.painter,
      quit,
    }
  }

  fn annotate_frames<I, M, O>(
    &self,
    input: &mut I,
    model: &M,
    output: &mut O,
    factor: f32,
  ) -> Result<AnnotateSummary, VisualizeError<M::Error>>
  where
    I: VideoSource,
    M: Detector,
    O: VideoSink,
  {
    let mut summary = AnnotateSummary::default();

    while let Some(frame) = input.read_frame().map_err(|e| {
      // 第一帧都读不出来视为源不可读
      if summary.frames_read == 0 {
        VisualizeError::UnreadableSource(e.to_string())
      } else {
        VisualizeError::Source(Box::new(e))
      }
    })? {
      summary.frames_read += 1;

      let resized = resize_short_side(&frame.image, self.options.target_size);
      let tensor = Image::Tensor(NormalizedTensor::from_rgb_image(&resized));
      let predictions = model
        .predict_top(&tensor)
        .map_err(VisualizeError::Detector)?;

      for prediction in predictions.iter() {
        debug!(
          "帧 {}: {} {:.2} at {:?}",
          frame.index,
          prediction.label,
          prediction.score,
          prediction.bbox.scale(factor).0
        );
      }

      let shapes = prediction_shapes(&predictions, factor, &self.options.style);
      let mut image = frame.image;
      self.painter.paint(&mut image, &shapes, Transform::IDENTITY);

      output
        .write_frame(&image)
        .map_err(|e| VisualizeError::Sink(Box::new(e)))?;
      summary.frames_written += 1;
      summary.detections += predictions.len();
      info!("处理第 {} 帧，检测到 {} 个对象", frame.index, predictions.len());

      if self.quit.should_quit() {
        warn!("收到退出信号，停止处理");
        summary.quit_early = true;
        break;
      }
    }

    if summary.frames_read == 0 {
      return Err(VisualizeError::UnreadableSource(
        "视频源没有可读取的帧".to_string(),
      ));
    }

    Ok(summary)
  }
}

impl<I, M, O, Q> Task<I, M, O> for AnnotateVideoTask<Q>
where
  I: VideoSource,
  M: Detector,
  O: VideoSink,
  Q: QuitSignal,
{
  type Output = AnnotateSummary;
  type Error = VisualizeError<M::Error>;

  fn run_task(self, mut input: I, model: M, mut output: O) -> Result<Self::Output, Self::Error> {
    let (width, height) = (input.width(), input.height());
    if width == 0 || height == 0 {
      return Err(VisualizeError::UnreadableSource(format!(
        "无效的帧尺寸 {}x{}",
        width, height
      )));
    }

    let factor = downscale_factor(width, height, self.options.target_size);
    info!(
      "开始标注视频: {}x{}, 缩放系数 {:.3}",
      width, height, factor
    );

    let result = self.annotate_frames(&mut input, &model, &mut output, factor);
    drop(input);
    let finished = output.finish();
    drop(output);

    let summary = result?;
    finished.map_err(|e| VisualizeError::Sink(Box::new(e)))?;

    info!(
      "标注完成: 读取 {} 帧，写入 {} 帧，共 {} 个检测结果",
      summary.frames_read, summary.frames_written, summary.detections
    );
    Ok(summary)
  }
}
