// 该文件是 SSDetect 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use ssdetect::{
  config::{
    DEFAULT_BATCH_SIZE, DEFAULT_DATA_SHAPE, DEFAULT_MEAN_PIXELS, DetectorConfig, Device,
    mean_pixels_from_slice,
  },
  output::DEFAULT_THRESHOLD,
  task::VideoMode,
};

/// SSD 检测与可视化
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检查点前缀，参数文件为 {prefix}-{epoch:04}.onnx
  #[arg(long, value_name = "PREFIX")]
  pub prefix: PathBuf,

  /// 检查点轮次
  #[arg(long, value_name = "EPOCH")]
  pub epoch: u32,

  /// 网络定义文件（可选）
  #[arg(long, value_name = "FILE")]
  pub symbol: Option<PathBuf>,

  /// 输入图像边长
  #[arg(long, default_value_t = DEFAULT_DATA_SHAPE, value_name = "SIDE")]
  pub data_shape: usize,

  /// 各通道均值 r,g,b
  #[arg(
    long,
    value_delimiter = ',',
    default_values_t = DEFAULT_MEAN_PIXELS,
    value_name = "R,G,B"
  )]
  pub mean_pixels: Vec<f32>,

  #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_name = "SIZE")]
  pub batch_size: usize,

  /// 计算设备: cpu 或 gpu:N
  #[arg(long, default_value = "cpu", value_name = "DEVICE")]
  pub device: Device,

  /// 输入文件（.png/.jpg/.mp4/.avi）
  #[arg(long, value_name = "FILE")]
  pub input: String,

  /// 输入文件所在目录
  #[arg(long, value_name = "DIR")]
  pub root_dir: Option<PathBuf>,

  /// 输入文件没有扩展名时补上的扩展名
  #[arg(long, value_name = "EXT")]
  pub extension: Option<String>,

  /// 输出路径，例如 image:///tmp/result.png 或 folder:///tmp/records?record
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 类别名称，逗号分隔
  #[arg(long, value_delimiter = ',', value_name = "NAMES")]
  pub classes: Vec<String>,

  /// 绘制阈值
  #[arg(long, default_value_t = DEFAULT_THRESHOLD, value_name = "THRESHOLD")]
  pub threshold: f32,

  /// 标签字体文件 (TTF)，缺省时使用内置的 DejaVu Sans
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,

  /// 输出检测耗时
  #[arg(long)]
  pub show_timer: bool,

  /// 视频处理方式: first-frame 或 full-stream
  #[arg(long, default_value = "first-frame", value_name = "MODE")]
  pub video_mode: VideoMode,

  /// 每张静态图像渲染后等待回车确认（默认不等待，渲染后直接继续）
  #[arg(long)]
  pub pause: bool,
}

impl Args {
  pub fn detector_config(&self) -> anyhow::Result<DetectorConfig> {
    let mean_pixels = mean_pixels_from_slice(&self.mean_pixels)?;

    Ok(
      DetectorConfig::new(&self.prefix, self.epoch)
        .with_symbol(self.symbol.clone())
        .with_data_shape(self.data_shape)
        .with_mean_pixels(mean_pixels)
        .with_batch_size(self.batch_size)
        .with_ctx(self.device),
    )
  }
}
