// 该文件是 SSDetect 项目的一部分。
// src/output/visualizer.rs - 可视化模块
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

use image::RgbImage;
use tracing::debug;

use super::draw::Draw;
use crate::model::{DetectBatch, DetectRecord};

pub const DEFAULT_THRESHOLD: f32 = 0.6;

/// 把检测结果画到图像上
pub struct Visualizer {
  draw: Draw,
  class_names: Vec<String>,
  threshold: f32,
}

impl Default for Visualizer {
  fn default() -> Self {
    Self::new(Vec::new(), DEFAULT_THRESHOLD)
  }
}

impl Visualizer {
  pub fn new(class_names: Vec<String>, threshold: f32) -> Self {
    Self {
      draw: Draw::default(),
      class_names,
      threshold,
    }
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  pub fn threshold(&self) -> f32 {
    self.threshold
  }

  pub fn class_names(&self) -> &[String] {
    &self.class_names
  }

  /// 类别名缺失时退回到类别编号
  pub fn label_for(&self, record: &DetectRecord) -> String {
    let name = record
      .class_index()
      .and_then(|index| self.class_names.get(index).cloned())
      .unwrap_or_else(|| format!("{}", record.class_id as i64));
    format!("{} {:.3}", name, record.score)
  }

  /// 在图像上绘制分数高于阈值的检测，返回绘制的数量
  pub fn visualize_detection(&self, image: &mut RgbImage, detections: &DetectBatch) -> usize {
    let mut drawn = 0;
    for record in detections.iter() {
      if record.score > self.threshold {
        let label = self.label_for(record);
        if self.draw.draw_bbox_with_label(image, &record.bbox, &label) {
          drawn += 1;
        }
      }
    }
    debug!("绘制 {} / {} 个检测", drawn, detections.len());
    drawn
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn batch(scores: &[f32]) -> DetectBatch {
    DetectBatch {
      items: scores
        .iter()
        .map(|&score| DetectRecord {
          class_id: 1.0,
          score,
          bbox: [0.1, 0.1, 0.5, 0.5],
        })
        .collect(),
    }
  }

  #[test]
  fn threshold_is_strict() {
    let visualizer = Visualizer::new(vec!["bg".into(), "cat".into()], 0.6);

    let mut image = RgbImage::new(64, 64);
    assert_eq!(visualizer.visualize_detection(&mut image, &batch(&[0.59])), 0);
    assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));

    let mut image = RgbImage::new(64, 64);
    assert_eq!(visualizer.visualize_detection(&mut image, &batch(&[0.61])), 1);
    assert!(image.pixels().any(|p| *p != Rgb([0, 0, 0])));

    let mut image = RgbImage::new(64, 64);
    assert_eq!(visualizer.visualize_detection(&mut image, &batch(&[0.6])), 0);
  }

  #[test]
  fn label_text_is_overlaid() {
    use crate::output::draw::{BOX_COLOR, LABEL_COLOR};

    let visualizer = Visualizer::new(vec!["bg".into(), "cat".into()], 0.6);
    let mut image = RgbImage::new(200, 200);
    assert_eq!(visualizer.visualize_detection(&mut image, &batch(&[0.9])), 1);

    let text_pixels = image
      .pixels()
      .filter(|p| **p != Rgb(BOX_COLOR) && **p != Rgb(LABEL_COLOR) && **p != Rgb([0, 0, 0]))
      .count();
    assert!(text_pixels > 0);
  }

  #[test]
  fn label_uses_class_name_or_id() {
    let record = DetectRecord {
      class_id: 1.0,
      score: 0.8765,
      bbox: [0.0; 4],
    };
    let named = Visualizer::new(vec!["bg".into(), "dog".into()], 0.5);
    assert_eq!(named.label_for(&record), "dog 0.877");
    assert_eq!(Visualizer::default().label_for(&record), "1 0.877");
  }
}
