// 该文件是 SSDetect 项目的一部分。
// src/model.rs - 检测结果与推理后端
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

use ndarray::{Array2, Array3, ArrayView1, ArrayView2, Axis, s};
use thiserror::Error;
use tracing::debug;

use crate::{
  config::ConfigError,
  input::{Batch, InputError},
  timer::DetectTimer,
};

#[cfg(feature = "onnx_runtime")]
mod ort_backend;
#[cfg(feature = "onnx_runtime")]
pub use self::ort_backend::OrtBackend;

/// 每条检测记录的字段数: [class_id, score, xmin, ymin, xmax, ymax]
pub const DETECTION_FIELDS: usize = 6;

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("配置错误: {0}")]
  Config(#[from] ConfigError),
  #[error("输入错误: {0}")]
  Input(#[from] InputError),
  #[error("推理运行时错误: {0}")]
  Runtime(String),
  #[error("输入形状不匹配: 已绑定 {expected:?}, 实际 {actual:?}")]
  ShapeMismatch {
    expected: Vec<usize>,
    actual: Vec<usize>,
  },
  #[error("输出形状无效: {0}")]
  OutputShape(String),
  #[error("模型尚未绑定输入形状")]
  NotBound,
}

/// 一条检测记录，坐标相对于图像宽高归一化到 [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectRecord {
  pub class_id: f32,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]
}

impl DetectRecord {
  pub fn from_row(row: ArrayView1<f32>) -> Self {
    let field = |i: usize| row.get(i).copied().unwrap_or(0.0);
    DetectRecord {
      class_id: field(0),
      score: field(1),
      bbox: [field(2), field(3), field(4), field(5)],
    }
  }

  pub fn to_row(&self) -> [f32; DETECTION_FIELDS] {
    [
      self.class_id,
      self.score,
      self.bbox[0],
      self.bbox[1],
      self.bbox[2],
      self.bbox[3],
    ]
  }

  /// 负数类别为填充行
  pub fn class_index(&self) -> Option<usize> {
    if self.class_id >= 0.0 {
      Some(self.class_id as usize)
    } else {
      None
    }
  }

  pub fn to_json(&self) -> serde_json::Value {
    serde_json::json!({
      "class_id": self.class_id,
      "score": self.score,
      "bbox": self.bbox,
    })
  }
}

/// 单张图像的有效检测，保持运行时输出的顺序
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectBatch {
  pub items: Box<[DetectRecord]>,
}

impl DetectBatch {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &DetectRecord> {
    self.items.iter()
  }

  /// 转回 (n, 6) 张量
  pub fn to_array(&self) -> Array2<f32> {
    let mut array = Array2::zeros((self.items.len(), DETECTION_FIELDS));
    for (mut row, item) in array.rows_mut().into_iter().zip(self.items.iter()) {
      for (dst, src) in row.iter_mut().zip(item.to_row()) {
        *dst = src;
      }
    }
    array
  }

  pub fn to_json(&self) -> serde_json::Value {
    serde_json::Value::Array(self.items.iter().map(DetectRecord::to_json).collect())
  }
}

/// 只保留第一列不小于 0 的行
///
/// `tensor` 的形状必须是 (max_detections, 6)，`Backend::predict` 的输出已保证这一点。
pub fn filter_detections(tensor: ArrayView2<f32>) -> DetectBatch {
  debug_assert_eq!(
    tensor.ncols(),
    DETECTION_FIELDS,
    "检测记录应有 {} 个字段",
    DETECTION_FIELDS
  );
  let items: Vec<DetectRecord> = tensor
    .rows()
    .into_iter()
    .filter(|row| row.get(0).is_some_and(|class_id| *class_id >= 0.0))
    .map(DetectRecord::from_row)
    .collect();

  DetectBatch {
    items: items.into_boxed_slice(),
  }
}

/// 推理后端：绑定固定输入形状后按批执行前向计算
pub trait Backend {
  fn bind(&mut self, shape: [usize; 4]) -> Result<(), ModelError>;

  /// 输出形状为 (batch, max_detections, 6)
  fn forward(&mut self, batch: &Batch) -> Result<Array3<f32>, ModelError>;

  /// 依次计算所有批，丢弃填充槽位后沿图像维拼接
  fn predict(
    &mut self,
    batches: &mut dyn Iterator<Item = Result<Batch, InputError>>,
    timer: &mut DetectTimer,
  ) -> Result<Array3<f32>, ModelError> {
    let mut outputs = Vec::new();
    for (index, batch) in batches.enumerate() {
      let batch = batch?;
      let output = self.forward(&batch)?;
      timer.lap(format!("批 {}", index));

      let (slots, rows, fields) = output.dim();
      if fields != DETECTION_FIELDS {
        return Err(ModelError::OutputShape(format!(
          "每行应有 {} 个字段, 实际 {}",
          DETECTION_FIELDS, fields
        )));
      }
      let valid = batch.valid();
      if slots < valid {
        return Err(ModelError::OutputShape(format!(
          "输出只有 {} 个槽位, 批中有 {} 张图像",
          slots, valid
        )));
      }
      debug!("批 {}: {} 张图像, 每张最多 {} 个检测", index, valid, rows);
      outputs.push(output.slice_move(s![..valid, .., ..]));
    }

    if outputs.is_empty() {
      return Ok(Array3::zeros((0, 0, DETECTION_FIELDS)));
    }

    let views: Vec<_> = outputs.iter().map(|output| output.view()).collect();
    ndarray::concatenate(Axis(0), &views).map_err(|e| ModelError::OutputShape(e.to_string()))
  }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
  fn bind(&mut self, shape: [usize; 4]) -> Result<(), ModelError> {
    (**self).bind(shape)
  }

  fn forward(&mut self, batch: &Batch) -> Result<Array3<f32>, ModelError> {
    (**self).forward(batch)
  }
}
