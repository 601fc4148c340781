// 该文件是 SSDetect 项目的一部分。
// src/config.rs - 检测器配置
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
  fmt,
  path::{Path, PathBuf},
  str::FromStr,
};

use thiserror::Error;
use tracing::error;

pub const DEFAULT_DATA_SHAPE: usize = 300;
pub const DEFAULT_MEAN_PIXELS: [f32; 3] = [123.0, 117.0, 104.0];
pub const DEFAULT_BATCH_SIZE: usize = 1;
pub const CHECKPOINT_EXTENSION: &str = "onnx";

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("检查点文件不存在: {0}")]
  CheckpointNotFound(PathBuf),
  #[error("无法解析计算设备: {0}")]
  InvalidDevice(String),
  #[error("输入边长必须大于 0")]
  ZeroDataShape,
  #[error("批大小必须大于 0")]
  ZeroBatchSize,
  #[error("均值需要 3 个分量 (r,g,b), 实际 {0} 个")]
  InvalidMeanPixels(usize),
}

/// 命令行给出的 r,g,b 均值
pub fn mean_pixels_from_slice(values: &[f32]) -> Result<[f32; 3], ConfigError> {
  values
    .try_into()
    .map_err(|_| ConfigError::InvalidMeanPixels(values.len()))
}

/// 计算设备
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
  #[default]
  Cpu,
  Gpu(u32),
}

impl FromStr for Device {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let lower = s.trim().to_lowercase();
    match lower.as_str() {
      "cpu" => Ok(Device::Cpu),
      "gpu" | "cuda" => Ok(Device::Gpu(0)),
      other => {
        let id = other
          .strip_prefix("gpu:")
          .or_else(|| other.strip_prefix("cuda:"))
          .and_then(|id| id.parse::<u32>().ok())
          .ok_or_else(|| ConfigError::InvalidDevice(s.to_string()))?;
        Ok(Device::Gpu(id))
      }
    }
  }
}

impl fmt::Display for Device {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Device::Cpu => write!(f, "cpu"),
      Device::Gpu(id) => write!(f, "gpu:{}", id),
    }
  }
}

/// 由前缀和轮次定位的检查点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
  prefix: PathBuf,
  epoch: u32,
  params: PathBuf,
}

impl Checkpoint {
  /// 参数文件名为 `{prefix}-{epoch:04}.onnx`
  pub fn params_path(prefix: &Path, epoch: u32) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(format!("-{:04}.{}", epoch, CHECKPOINT_EXTENSION));
    PathBuf::from(name)
  }

  pub fn resolve(prefix: impl AsRef<Path>, epoch: u32) -> Result<Self, ConfigError> {
    let prefix = prefix.as_ref().to_path_buf();
    let params = Self::params_path(&prefix, epoch);
    if !params.is_file() {
      error!("找不到检查点文件: {}", params.display());
      return Err(ConfigError::CheckpointNotFound(params));
    }

    Ok(Checkpoint {
      prefix,
      epoch,
      params,
    })
  }

  pub fn prefix(&self) -> &Path {
    &self.prefix
  }

  pub fn epoch(&self) -> u32 {
    self.epoch
  }

  pub fn params(&self) -> &Path {
    &self.params
  }
}

/// 检测器构造参数
#[derive(Debug, Clone)]
pub struct DetectorConfig {
  /// 网络定义文件，为空时使用检查点内嵌的定义
  pub symbol: Option<PathBuf>,
  pub model_prefix: PathBuf,
  pub epoch: u32,
  /// 输入图像缩放后的边长
  pub data_shape: usize,
  /// (r, g, b) 均值
  pub mean_pixels: [f32; 3],
  pub batch_size: usize,
  pub ctx: Device,
}

impl DetectorConfig {
  pub fn new(model_prefix: impl Into<PathBuf>, epoch: u32) -> Self {
    Self {
      symbol: None,
      model_prefix: model_prefix.into(),
      epoch,
      data_shape: DEFAULT_DATA_SHAPE,
      mean_pixels: DEFAULT_MEAN_PIXELS,
      batch_size: DEFAULT_BATCH_SIZE,
      ctx: Device::default(),
    }
  }

  pub fn with_symbol(mut self, symbol: Option<PathBuf>) -> Self {
    self.symbol = symbol;
    self
  }

  pub fn with_data_shape(mut self, data_shape: usize) -> Self {
    self.data_shape = data_shape;
    self
  }

  pub fn with_mean_pixels(mut self, mean_pixels: [f32; 3]) -> Self {
    self.mean_pixels = mean_pixels;
    self
  }

  pub fn with_batch_size(mut self, batch_size: usize) -> Self {
    self.batch_size = batch_size;
    self
  }

  pub fn with_ctx(mut self, ctx: Device) -> Self {
    self.ctx = ctx;
    self
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.data_shape == 0 {
      return Err(ConfigError::ZeroDataShape);
    }
    if self.batch_size == 0 {
      return Err(ConfigError::ZeroBatchSize);
    }
    Ok(())
  }

  /// 绑定到网络的输入形状 (batch, 3, side, side)
  pub fn input_shape(&self) -> [usize; 4] {
    [self.batch_size, 3, self.data_shape, self.data_shape]
  }
}
