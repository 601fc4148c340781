// 该文件是 SSDetect 项目的一部分。
// src/bin/batch_detect.rs - 批量检测图像并输出 JSON
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

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tracing::info;

use ssdetect::{
  config::{
    DEFAULT_BATCH_SIZE, DEFAULT_DATA_SHAPE, DEFAULT_MEAN_PIXELS, DetectorConfig, Device,
    mean_pixels_from_slice,
  },
  detector::Detector,
};

/// 批量检测图像列表
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检查点前缀
  #[arg(long, value_name = "PREFIX")]
  pub prefix: PathBuf,

  #[arg(long, value_name = "EPOCH")]
  pub epoch: u32,

  #[arg(long, value_name = "FILE")]
  pub symbol: Option<PathBuf>,

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

  #[arg(long, default_value = "cpu", value_name = "DEVICE")]
  pub device: Device,

  #[arg(long, value_name = "DIR")]
  pub root_dir: Option<PathBuf>,

  #[arg(long, value_name = "EXT")]
  pub extension: Option<String>,

  #[arg(long)]
  pub show_timer: bool,

  /// 图像名称列表
  #[arg(required = true, value_name = "IMAGES")]
  pub images: Vec<String>,
}

impl Args {
  fn detector_config(&self) -> Result<DetectorConfig> {
    Ok(
      DetectorConfig::new(&self.prefix, self.epoch)
        .with_symbol(self.symbol.clone())
        .with_data_shape(self.data_shape)
        .with_mean_pixels(mean_pixels_from_slice(&self.mean_pixels)?)
        .with_batch_size(self.batch_size)
        .with_ctx(self.device),
    )
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let mut detector = Detector::new(args.detector_config()?)?;

  info!("开始检测 {} 张图像...", args.images.len());
  let detections = detector.im_detect(
    &args.images,
    args.root_dir.as_deref(),
    args.extension.as_deref(),
    args.show_timer,
  )?;

  let report: Vec<_> = args
    .images
    .iter()
    .zip(detections.iter())
    .map(|(name, batch)| {
      json!({
        "image": name,
        "detections": batch.to_json(),
      })
    })
    .collect();
  println!("{}", serde_json::to_string_pretty(&report)?);

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mean_pixels_reach_detector_config() {
    let args = Args::try_parse_from([
      "ssdetect-batch",
      "--prefix",
      "model/ssd",
      "--epoch",
      "3",
      "--mean-pixels",
      "104,117,123",
      "a.jpg",
    ])
    .unwrap();
    let config = args.detector_config().unwrap();
    assert_eq!(config.mean_pixels, [104.0, 117.0, 123.0]);
  }

  #[test]
  fn mean_pixels_default_and_arity() {
    let args =
      Args::try_parse_from(["ssdetect-batch", "--prefix", "ssd", "--epoch", "0", "a"]).unwrap();
    assert_eq!(args.detector_config().unwrap().mean_pixels, DEFAULT_MEAN_PIXELS);

    let args = Args::try_parse_from([
      "ssdetect-batch",
      "--prefix",
      "ssd",
      "--epoch",
      "0",
      "--mean-pixels",
      "1,2",
      "a",
    ])
    .unwrap();
    assert!(args.detector_config().is_err());
  }
}
