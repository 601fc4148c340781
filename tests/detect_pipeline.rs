// 该文件是 SSDetect 项目的一部分。
// tests/detect_pipeline.rs - 检测与可视化流程测试
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
  cell::Cell,
  convert::Infallible,
  path::Path,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
  },
};

use image::{Rgb, RgbImage};
use ndarray::{Array3, Array4};

use ssdetect::{
  config::DetectorConfig,
  detector::Detector,
  input::{Batch, InputError},
  model::{Backend, DETECTION_FIELDS, DetectBatch, ModelError},
  output::{Render, Visualizer},
  task::{TaskError, VideoMode, VisualizeTask},
};

const SIDE: usize = 4;

/// 每个槽位输出两行：一条有效检测（类别为红色通道值 / 10）和一条填充行
#[derive(Clone, Default)]
struct MockBackend {
  bound: Arc<Mutex<Option<[usize; 4]>>>,
  batches: Arc<Mutex<Vec<usize>>>,
}

impl Backend for MockBackend {
  fn bind(&mut self, shape: [usize; 4]) -> Result<(), ModelError> {
    *self.bound.lock().unwrap() = Some(shape);
    Ok(())
  }

  fn forward(&mut self, batch: &Batch) -> Result<Array3<f32>, ModelError> {
    self.batches.lock().unwrap().push(batch.valid());
    let slots = batch.shape()[0];
    let mut output = Array3::from_elem((slots, 2, DETECTION_FIELDS), -1.0f32);
    for n in 0..slots {
      let class = batch.data[[n, 0, 0, 0]] / 10.0;
      let row = [class, 0.9, 0.25, 0.25, 0.75, 0.75];
      for (f, value) in row.into_iter().enumerate() {
        output[[n, 0, f]] = value;
      }
    }
    Ok(output)
  }
}

#[derive(Default)]
struct CountingRender {
  calls: Cell<usize>,
  last_drawn: Cell<bool>,
}

impl Render for CountingRender {
  type Error = Infallible;

  fn render_result(&self, image: &RgbImage, _result: &DetectBatch) -> Result<(), Self::Error> {
    self.calls.set(self.calls.get() + 1);
    self
      .last_drawn
      .set(image.pixels().any(|p| *p != image.get_pixel(0, 0).to_owned()));
    Ok(())
  }
}

fn config(batch_size: usize) -> DetectorConfig {
  DetectorConfig::new("unused", 0)
    .with_data_shape(SIDE)
    .with_mean_pixels([0.0; 3])
    .with_batch_size(batch_size)
}

fn detector(batch_size: usize) -> (Detector<MockBackend>, MockBackend) {
  let backend = MockBackend::default();
  let detector = Detector::with_backend(backend.clone(), config(batch_size)).unwrap();
  (detector, backend)
}

fn write_image(dir: &Path, name: &str, red: u8) {
  RgbImage::from_pixel(SIDE as u32, SIDE as u32, Rgb([red, 0, 0]))
    .save(dir.join(name))
    .unwrap();
}

#[test]
fn binds_configured_input_shape() {
  let (_detector, backend) = detector(2);
  assert_eq!(*backend.bound.lock().unwrap(), Some([2, 3, SIDE, SIDE]));
}

#[test]
fn one_batch_per_image_in_input_order() {
  let dir = tempfile::tempdir().unwrap();
  write_image(dir.path(), "a.png", 10);
  write_image(dir.path(), "b.png", 20);
  write_image(dir.path(), "c.png", 30);

  let (mut detector, backend) = detector(2);
  let result = detector
    .im_detect(&["a", "b", "c"], Some(dir.path()), Some(".png"), false)
    .unwrap();

  assert_eq!(result.len(), 3);
  let classes: Vec<f32> = result
    .iter()
    .map(|batch| {
      assert_eq!(batch.len(), 1);
      batch.items[0].class_id
    })
    .collect();
  assert_eq!(classes, vec![1.0, 2.0, 3.0]);
  // 第二批只有一张真实图像
  assert_eq!(*backend.batches.lock().unwrap(), vec![2, 1]);
}

#[test]
fn missing_image_fails_before_inference() {
  let dir = tempfile::tempdir().unwrap();
  let (mut detector, backend) = detector(1);
  let result = detector.im_detect(&["ghost.png"], Some(dir.path()), None, false);
  assert!(matches!(
    result,
    Err(ModelError::Input(InputError::ImageNotFound(_)))
  ));
  assert!(backend.batches.lock().unwrap().is_empty());
}

#[test]
fn tensor_with_wrong_side_is_rejected() {
  let (mut detector, _) = detector(1);
  let tensor = Array4::zeros((1, 3, SIDE * 2, SIDE * 2));
  assert!(matches!(
    detector.im_detect_tensor(tensor, false),
    Err(ModelError::ShapeMismatch { .. })
  ));
}

#[test]
fn empty_tensor_yields_no_batches() {
  let (mut detector, _) = detector(2);
  let result = detector
    .im_detect_tensor(Array4::zeros((0, 3, SIDE, SIDE)), true)
    .unwrap();
  assert!(result.is_empty());
}

#[test]
fn unsupported_extension_renders_nothing() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

  let (mut detector, backend) = detector(1);
  let task = VisualizeTask::new(Visualizer::default(), CountingRender::default());
  let result = task.detect_and_visualize(&mut detector, "notes.txt", Some(dir.path()), None, false);

  assert!(matches!(result, Err(TaskError::UnsupportedFormat(_))));
  assert_eq!(task.output().calls.get(), 0);
  assert!(backend.batches.lock().unwrap().is_empty());
}

#[test]
fn still_image_is_rendered_once_with_boxes() {
  let dir = tempfile::tempdir().unwrap();
  RgbImage::from_pixel(64, 64, Rgb([10, 0, 0]))
    .save(dir.path().join("cat.PNG"))
    .unwrap();

  let (mut detector, _) = detector(1);
  let task = VisualizeTask::new(Visualizer::default(), CountingRender::default());
  let rendered = task
    .detect_and_visualize(&mut detector, "cat.PNG", Some(dir.path()), None, false)
    .unwrap();

  assert_eq!(rendered, 1);
  assert_eq!(task.output().calls.get(), 1);
  assert!(task.output().last_drawn.get());
}

fn frames(count: usize) -> impl Iterator<Item = Result<RgbImage, InputError>> {
  (0..count).map(|_| Ok(RgbImage::from_pixel(16, 16, Rgb([10, 0, 0]))))
}

#[test]
fn first_frame_mode_processes_one_frame() {
  let (mut detector, backend) = detector(1);
  let task = VisualizeTask::new(Visualizer::default(), CountingRender::default());
  let rendered = task.visualize_frames(&mut detector, frames(5), false).unwrap();

  assert_eq!(rendered, 1);
  assert_eq!(backend.batches.lock().unwrap().len(), 1);
}

#[test]
fn full_stream_mode_processes_every_frame() {
  let (mut detector, _) = detector(1);
  let task = VisualizeTask::new(Visualizer::default(), CountingRender::default())
    .with_video_mode(VideoMode::FullStream);
  let rendered = task.visualize_frames(&mut detector, frames(3), false).unwrap();
  assert_eq!(rendered, 3);
}

#[test]
fn stop_flag_ends_full_stream() {
  let stop = Arc::new(AtomicBool::new(false));
  let (mut detector, _) = detector(1);
  let task = VisualizeTask::new(Visualizer::default(), CountingRender::default())
    .with_video_mode(VideoMode::FullStream)
    .with_stop_flag(stop.clone());

  stop.store(true, Ordering::Relaxed);
  let rendered = task.visualize_frames(&mut detector, frames(4), false).unwrap();
  assert_eq!(rendered, 1);
}

#[test]
fn empty_video_is_an_error() {
  let (mut detector, _) = detector(1);
  let task = VisualizeTask::new(Visualizer::default(), CountingRender::default());
  assert!(matches!(
    task.visualize_frames(&mut detector, frames(0), false),
    Err(TaskError::Input(InputError::EmptyVideo))
  ));
}

#[cfg(feature = "onnx_runtime")]
#[test]
fn missing_checkpoint_fails_construction() {
  use ssdetect::config::ConfigError;

  let dir = tempfile::tempdir().unwrap();
  let config = DetectorConfig::new(dir.path().join("ssd_300"), 12);
  assert!(matches!(
    Detector::new(config),
    Err(ModelError::Config(ConfigError::CheckpointNotFound(path)))
      if path.ends_with("ssd_300-0012.onnx")
  ));
}
