// 该文件是 SSDetect 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 视频文件输入
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

//! # GStreamer 视频输入
//!
//! 通过 `decodebin` 解码视频文件，并由 `appsink` 逐帧取出 RGB 图像。
//!
//! 使用前需要安装 GStreamer 开发库：
//!
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```

use std::path::Path;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use tracing::{error, info, warn};

use super::InputError;

/// 视频文件的 RGB 帧迭代器
pub struct VideoFileInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  frame_index: u64,
  finished: bool,
}

impl Drop for VideoFileInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("停止 GStreamer 管道失败: {}", e);
    }
  }
}

impl VideoFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, InputError> {
    let path = path.as_ref();
    if !path.is_file() {
      error!("视频文件不存在: {}", path.display());
      return Err(InputError::VideoNotFound(path.to_path_buf()));
    }

    gst::init()?;

    let description = format!(
      "filesrc location=\"{}\" ! decodebin ! videoconvert ! video/x-raw,format=RGB ! appsink name=sink sync=false max-buffers=2",
      path.display()
    );
    info!("GStreamer 管道: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| InputError::Pipeline("无法创建管道".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or_else(|| InputError::Pipeline("找不到 appsink 元素".to_string()))?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| InputError::Pipeline("无法转换为 appsink".to_string()))?;

    pipeline.set_state(gst::State::Playing)?;

    Ok(VideoFileInput {
      pipeline,
      appsink,
      frame_index: 0,
      finished: false,
    })
  }

  pub fn frame_index(&self) -> u64 {
    self.frame_index
  }
}

impl Iterator for VideoFileInput {
  type Item = Result<RgbImage, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.finished {
      return None;
    }

    match self.appsink.pull_sample() {
      Ok(sample) => {
        self.frame_index += 1;
        let frame = convert_sample_to_rgb(sample);
        if frame.is_err() {
          self.finished = true;
        }
        Some(frame)
      }
      Err(_) if self.appsink.is_eos() => {
        info!("视频结束，共 {} 帧", self.frame_index);
        self.finished = true;
        None
      }
      Err(e) => {
        error!("获取视频帧失败: {}", e);
        self.finished = true;
        Some(Err(InputError::Pipeline(e.to_string())))
      }
    }
  }
}

fn convert_sample_to_rgb(sample: gst::Sample) -> Result<RgbImage, InputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| InputError::Pipeline("采样中没有缓冲区".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| InputError::Pipeline("采样中没有 caps".to_string()))?;

  let video_info = gst_video::VideoInfo::from_caps(caps)
    .map_err(|_| InputError::Pipeline("无法从 caps 获取视频信息".to_string()))?;
  if video_info.format() != gst_video::VideoFormat::Rgb {
    return Err(InputError::Pipeline(format!(
      "不支持的像素格式: {:?}",
      video_info.format()
    )));
  }

  let width = video_info.width() as usize;
  let height = video_info.height() as usize;
  let stride = video_info.stride()[0] as usize;

  let map = buffer
    .map_readable()
    .map_err(|e| InputError::Pipeline(format!("无法映射缓冲区: {}", e)))?;
  let data = map.as_slice();

  // 行可能按 4 字节对齐
  let expected = stride * (height.saturating_sub(1)) + width * 3;
  if data.len() < expected {
    return Err(InputError::BufferSizeMismatch {
      expected,
      actual: data.len(),
    });
  }

  let mut pixels = Vec::with_capacity(width * height * 3);
  for row in 0..height {
    let start = row * stride;
    pixels.extend_from_slice(&data[start..start + width * 3]);
  }

  RgbImage::from_raw(width as u32, height as u32, pixels)
    .ok_or_else(|| InputError::Pipeline("无法创建 RGB 图像".to_string()))
}
