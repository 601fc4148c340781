// 该文件是 SSDetect 项目的一部分。
// src/detector.rs - SSD 检测器
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

use image::RgbImage;
use ndarray::{Array4, Axis};
use tracing::{debug, info};

use crate::{
  config::DetectorConfig,
  input::{ArraySource, BatchSource, ImageListSource, Prefetcher},
  model::{Backend, DetectBatch, ModelError, filter_detections},
  timer::DetectTimer,
};

/// 持有已绑定输入形状的检测网络，并提供检测接口
///
/// 构造完成后参数只读，可以反复调用检测。
pub struct Detector<B> {
  backend: B,
  config: DetectorConfig,
}

#[cfg(feature = "onnx_runtime")]
impl Detector<crate::model::OrtBackend> {
  /// 加载 `{model_prefix}-{epoch:04}.onnx` 并绑定输入形状
  pub fn new(config: DetectorConfig) -> Result<Self, ModelError> {
    config.validate()?;
    let checkpoint = crate::config::Checkpoint::resolve(&config.model_prefix, config.epoch)?;
    let backend =
      crate::model::OrtBackend::load(&checkpoint, config.symbol.as_deref(), config.ctx)?;
    Self::with_backend(backend, config)
  }
}

impl<B: Backend> Detector<B> {
  pub fn with_backend(mut backend: B, config: DetectorConfig) -> Result<Self, ModelError> {
    config.validate()?;
    backend.bind(config.input_shape())?;
    info!(
      "检测器就绪: 输入 {:?}, 设备 {}",
      config.input_shape(),
      config.ctx
    );
    Ok(Detector { backend, config })
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  pub fn data_shape(&self) -> usize {
    self.config.data_shape
  }

  pub fn mean_pixels(&self) -> [f32; 3] {
    self.config.mean_pixels
  }

  pub fn batch_size(&self) -> usize {
    self.config.batch_size
  }

  /// 检测批数据源中的全部图像，每张图像返回一组检测结果
  pub fn detect<S: BatchSource + 'static>(
    &mut self,
    source: S,
    show_timer: bool,
  ) -> Result<Vec<DetectBatch>, ModelError> {
    let expected = self.config.input_shape();
    let actual = source.batch_shape();
    if actual != expected {
      return Err(ModelError::ShapeMismatch {
        expected: expected.to_vec(),
        actual: actual.to_vec(),
      });
    }

    let mut source: Box<dyn BatchSource> = if source.is_prefetching() {
      Box::new(source)
    } else {
      Box::new(Prefetcher::new(source))
    };

    let mut timer = DetectTimer::new();
    let detections = self.backend.predict(&mut source, &mut timer)?;
    let elapsed = timer.elapsed();
    if show_timer {
      info!("检测耗时: {:.4} 秒", elapsed.as_secs_f64());
    }
    timer.report();

    let result: Vec<DetectBatch> = detections
      .axis_iter(Axis(0))
      .map(filter_detections)
      .collect();
    debug!(
      "共 {} 张图像, {} 个有效检测",
      result.len(),
      result.iter().map(DetectBatch::len).sum::<usize>()
    );
    Ok(result)
  }

  /// 检测图像文件列表，名称可由 `root_dir` 与 `extension` 补全
  pub fn im_detect<S: AsRef<str>>(
    &mut self,
    im_list: &[S],
    root_dir: Option<&Path>,
    extension: Option<&str>,
    show_timer: bool,
  ) -> Result<Vec<DetectBatch>, ModelError> {
    let source = ImageListSource::new(
      im_list,
      root_dir,
      extension,
      self.config.batch_size,
      self.config.data_shape,
      self.config.mean_pixels,
    )?;
    self.detect(source, show_timer)
  }

  /// 检测一张已解码的图像
  pub fn im_detect_single(
    &mut self,
    image: &RgbImage,
    show_timer: bool,
  ) -> Result<Vec<DetectBatch>, ModelError> {
    let source = ArraySource::from_image(
      image,
      self.config.data_shape,
      self.config.mean_pixels,
      self.config.batch_size,
    )?;
    self.detect(source, show_timer)
  }

  /// 检测已经预处理好的 (n, 3, side, side) 张量
  pub fn im_detect_tensor(
    &mut self,
    tensor: Array4<f32>,
    show_timer: bool,
  ) -> Result<Vec<DetectBatch>, ModelError> {
    let source = ArraySource::from_tensor(tensor, self.config.batch_size)?;
    self.detect(source, show_timer)
  }
}
