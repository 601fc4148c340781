// 该文件是 SSDetect 项目的一部分。
// src/main.rs - 检测并可视化主程序
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

mod args;

use std::sync::atomic::Ordering;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use ssdetect::{
  FromUrl,
  detector::Detector,
  output::{OutputWrapper, Visualizer, draw::Draw},
  task::VisualizeTask,
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("检查点: {}-{:04}", args.prefix.display(), args.epoch);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);
  info!("计算设备: {}", args.device);

  let config = args.detector_config()?;
  info!("正在加载模型...");
  let mut detector = Detector::new(config)?;
  info!("模型加载完成");

  let mut draw = Draw::default();
  if let Some(font) = &args.font {
    draw = draw.with_font(Draw::load_font(font)?);
  }
  let visualizer = Visualizer::new(args.classes.clone(), args.threshold).with_draw(draw);
  let output = OutputWrapper::from_url(&args.output)?;

  let task = VisualizeTask::new(visualizer, output)
    .with_video_mode(args.video_mode)
    .with_pause(args.pause);

  let stop = task.stop_flag();
  ctrlc::set_handler(move || {
    warn!("收到中断信号，正在停止...");
    stop.store(true, Ordering::Relaxed);
  })?;

  let rendered = task.detect_and_visualize(
    &mut detector,
    &args.input,
    args.root_dir.as_deref(),
    args.extension.as_deref(),
    args.show_timer,
  )?;

  info!("处理完成，共渲染 {} 帧", rendered);
  Ok(())
}
