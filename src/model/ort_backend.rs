// 该文件是 SSDetect 项目的一部分。
// src/model/ort_backend.rs - ONNX Runtime 推理后端
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

use ndarray::Array3;
use ort::{execution_providers::CUDAExecutionProvider, session::Session, value::Tensor};
use tracing::{debug, error, info};

use crate::{
  config::{Checkpoint, Device},
  input::Batch,
  model::{Backend, ModelError},
};

fn runtime_error<E: std::fmt::Display>(err: E) -> ModelError {
  error!("ONNX Runtime 错误: {}", err);
  ModelError::Runtime(err.to_string())
}

pub struct OrtBackend {
  session: Session,
  input_shape: Option<[usize; 4]>,
}

impl OrtBackend {
  /// 有 `symbol` 时使用该网络定义文件，否则使用检查点中内嵌的定义
  pub fn load(
    checkpoint: &Checkpoint,
    symbol: Option<&Path>,
    device: Device,
  ) -> Result<Self, ModelError> {
    let graph = symbol.unwrap_or_else(|| checkpoint.params());
    info!("加载模型文件: {}", graph.display());
    if let Ok(meta) = std::fs::metadata(graph) {
      debug!(
        "模型文件大小: {:.2} MB",
        meta.len() as f64 / (1024.0 * 1024.0)
      );
    }

    let mut builder = Session::builder().map_err(runtime_error)?;
    if let Device::Gpu(id) = device {
      info!("使用 CUDA 设备 {}", id);
      builder = builder
        .with_execution_providers([CUDAExecutionProvider::default()
          .with_device_id(id as i32)
          .build()])
        .map_err(runtime_error)?;
    }
    let session = builder.commit_from_file(graph).map_err(runtime_error)?;
    info!("模型加载完成");

    Ok(OrtBackend {
      session,
      input_shape: None,
    })
  }
}

impl Backend for OrtBackend {
  fn bind(&mut self, shape: [usize; 4]) -> Result<(), ModelError> {
    info!("绑定输入形状: {:?}", shape);
    self.input_shape = Some(shape);

    // 用全零批试运行一次，形状与参数不兼容时在构造阶段失败
    let output = self.forward(&Batch::zeros(shape))?;
    debug!("试运行输出形状: {:?}", output.shape());
    Ok(())
  }

  fn forward(&mut self, batch: &Batch) -> Result<Array3<f32>, ModelError> {
    let bound = self.input_shape.ok_or(ModelError::NotBound)?;
    let shape = batch.shape();
    if shape != bound {
      return Err(ModelError::ShapeMismatch {
        expected: bound.to_vec(),
        actual: shape.to_vec(),
      });
    }

    let data: Vec<f32> = batch.data.iter().copied().collect();
    let input = Tensor::from_array((shape, data.into_boxed_slice())).map_err(runtime_error)?;

    debug!("执行模型推理");
    let outputs = self
      .session
      .run(ort::inputs![input])
      .map_err(runtime_error)?;

    let (dims, values) = outputs[0]
      .try_extract_tensor::<f32>()
      .map_err(runtime_error)?;
    let dims: Vec<usize> = dims.iter().map(|&d| d.max(0) as usize).collect();
    if dims.len() != 3 {
      return Err(ModelError::OutputShape(format!(
        "期望三维输出 (batch, detections, 6), 实际 {:?}",
        dims
      )));
    }

    Array3::from_shape_vec((dims[0], dims[1], dims[2]), values.to_vec())
      .map_err(|e| ModelError::OutputShape(e.to_string()))
  }
}
