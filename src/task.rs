// 该文件是 SSDetect 项目的一部分。
// src/task.rs - 检测并可视化任务
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

use std::{
  path::Path,
  str::FromStr,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use image::RgbImage;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
  detector::Detector,
  input::{InputError, load_rgb_image, resolve_image_path},
  model::{Backend, DetectBatch, ModelError},
  output::{Render, Visualizer},
};

pub const IMAGE_EXTENSIONS: [&str; 2] = ["png", "jpg"];
pub const VIDEO_EXTENSIONS: [&str; 2] = ["mp4", "avi"];

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("未知的文件扩展名 {0}，只支持 .png/.jpg/.mp4/.avi 文件")]
  UnsupportedFormat(String),
  #[error("无法解析视频模式: {0}")]
  InvalidVideoMode(String),
  #[error("未启用视频输入支持")]
  VideoUnavailable,
  #[error("模型错误: {0}")]
  Model(#[from] ModelError),
  #[error("输入错误: {0}")]
  Input(#[from] InputError),
  #[error("输出错误: {0}")]
  Output(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
}

/// 输入媒体类型，由扩展名决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
  Image,
  Video,
}

impl MediaKind {
  pub fn from_path(path: &Path) -> Result<Self, TaskError> {
    let extension = path
      .extension()
      .and_then(|e| e.to_str())
      .map(str::to_lowercase)
      .unwrap_or_default();

    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
      Ok(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
      Ok(MediaKind::Video)
    } else {
      Err(TaskError::UnsupportedFormat(path.display().to_string()))
    }
  }
}

/// 视频处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoMode {
  /// 只处理第一帧
  #[default]
  FirstFrame,
  /// 处理所有帧直到结束或收到停止信号
  FullStream,
}

impl FromStr for VideoMode {
  type Err = TaskError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "first-frame" | "first" => Ok(VideoMode::FirstFrame),
      "full-stream" | "full" => Ok(VideoMode::FullStream),
      other => Err(TaskError::InvalidVideoMode(other.to_string())),
    }
  }
}

/// 检测并把结果渲染到显示表面
pub struct VisualizeTask<R> {
  visualizer: Visualizer,
  output: R,
  video_mode: VideoMode,
  pause: bool,
  stop: Arc<AtomicBool>,
}

impl<R> VisualizeTask<R>
where
  R: Render,
  R::Error: std::error::Error + Send + Sync + 'static,
{
  pub fn new(visualizer: Visualizer, output: R) -> Self {
    Self {
      visualizer,
      output,
      video_mode: VideoMode::default(),
      pause: false,
      stop: Arc::new(AtomicBool::new(false)),
    }
  }

  pub fn with_video_mode(mut self, video_mode: VideoMode) -> Self {
    self.video_mode = video_mode;
    self
  }

  /// 每张静态图像渲染后等待回车确认
  pub fn with_pause(mut self, pause: bool) -> Self {
    self.pause = pause;
    self
  }

  pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
    self.stop = stop;
    self
  }

  pub fn stop_flag(&self) -> Arc<AtomicBool> {
    self.stop.clone()
  }

  pub fn output(&self) -> &R {
    &self.output
  }

  /// 按扩展名分派到图像或视频处理，返回渲染的帧数
  pub fn detect_and_visualize<B: Backend>(
    &self,
    detector: &mut Detector<B>,
    path: &str,
    root_dir: Option<&Path>,
    extension: Option<&str>,
    show_timer: bool,
  ) -> Result<usize, TaskError> {
    let resolved = resolve_image_path(path, root_dir, extension);
    match MediaKind::from_path(&resolved)? {
      MediaKind::Image => self.visualize_image(detector, path, root_dir, extension, show_timer),
      MediaKind::Video => self.visualize_video(detector, &resolved, show_timer),
    }
  }

  fn visualize_image<B: Backend>(
    &self,
    detector: &mut Detector<B>,
    path: &str,
    root_dir: Option<&Path>,
    extension: Option<&str>,
    show_timer: bool,
  ) -> Result<usize, TaskError> {
    let detections = detector.im_detect(&[path], root_dir, extension, show_timer)?;
    let resolved = resolve_image_path(path, root_dir, extension);

    let mut rendered = 0;
    for detection in detections.iter() {
      let mut image = load_rgb_image(&resolved)?;
      self.show(&mut image, detection)?;
      rendered += 1;
      if self.pause {
        wait_for_key()?;
      }
    }
    Ok(rendered)
  }

  #[cfg(feature = "gstreamer_input")]
  fn visualize_video<B: Backend>(
    &self,
    detector: &mut Detector<B>,
    path: &Path,
    show_timer: bool,
  ) -> Result<usize, TaskError> {
    let video = crate::input::VideoFileInput::open(path)?;
    self.visualize_frames(detector, video, show_timer)
  }

  #[cfg(not(feature = "gstreamer_input"))]
  fn visualize_video<B: Backend>(
    &self,
    _detector: &mut Detector<B>,
    path: &Path,
    _show_timer: bool,
  ) -> Result<usize, TaskError> {
    warn!("未启用 gstreamer_input 特性，无法读取视频: {}", path.display());
    Err(TaskError::VideoUnavailable)
  }

  /// 逐帧检测并渲染，`FirstFrame` 模式下只处理第一帧
  pub fn visualize_frames<B, I>(
    &self,
    detector: &mut Detector<B>,
    frames: I,
    show_timer: bool,
  ) -> Result<usize, TaskError>
  where
    B: Backend,
    I: IntoIterator<Item = Result<RgbImage, InputError>>,
  {
    let mut frame_count = 0usize;
    let mut rendered = 0usize;
    for frame in frames {
      let mut frame = frame?;
      frame_count += 1;

      let detections = detector.im_detect_single(&frame, show_timer)?;
      for detection in detections.iter() {
        self.show(&mut frame, detection)?;
        rendered += 1;
      }

      if self.video_mode == VideoMode::FirstFrame {
        break;
      }
      if self.stop.load(Ordering::Relaxed) {
        warn!("收到停止信号，退出视频循环");
        break;
      }
    }

    if frame_count == 0 {
      return Err(InputError::EmptyVideo.into());
    }
    info!("视频处理完成: {} 帧", frame_count);
    Ok(rendered)
  }

  fn show(&self, image: &mut RgbImage, detection: &DetectBatch) -> Result<(), TaskError> {
    self.visualizer.visualize_detection(image, detection);
    self
      .output
      .render_result(image, detection)
      .map_err(|e| TaskError::Output(Box::new(e)))
  }
}

fn wait_for_key() -> Result<(), TaskError> {
  info!("按回车键继续...");
  let mut line = String::new();
  std::io::stdin().read_line(&mut line)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn media_kind_by_extension() {
    assert_eq!(MediaKind::from_path(Path::new("a.png")).unwrap(), MediaKind::Image);
    assert_eq!(MediaKind::from_path(Path::new("b/c.JPG")).unwrap(), MediaKind::Image);
    assert_eq!(MediaKind::from_path(Path::new("d.mp4")).unwrap(), MediaKind::Video);
    assert_eq!(MediaKind::from_path(Path::new("e.avi")).unwrap(), MediaKind::Video);
    assert!(matches!(
      MediaKind::from_path(Path::new("notes.txt")),
      Err(TaskError::UnsupportedFormat(_))
    ));
    assert!(matches!(
      MediaKind::from_path(Path::new("no_extension")),
      Err(TaskError::UnsupportedFormat(_))
    ));
  }

  #[test]
  fn parse_video_mode() {
    assert_eq!("first-frame".parse::<VideoMode>().unwrap(), VideoMode::FirstFrame);
    assert_eq!("full".parse::<VideoMode>().unwrap(), VideoMode::FullStream);
    assert!("all".parse::<VideoMode>().is_err());
  }
}
