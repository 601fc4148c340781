// 该文件是 SSDetect 项目的一部分。
// src/input/array_source.rs - 内存张量输入
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
use ndarray::{Array4, Axis, s};

use super::{Batch, BatchSource, InputError, preprocess};

/// 已在内存中的 (n, c, h, w) 张量，按批切分
pub struct ArraySource {
  data: Array4<f32>,
  cursor: usize,
  batch_size: usize,
}

impl ArraySource {
  pub fn from_tensor(data: Array4<f32>, batch_size: usize) -> Result<Self, InputError> {
    if batch_size == 0 {
      return Err(InputError::ZeroBatchSize);
    }
    Ok(ArraySource {
      data,
      cursor: 0,
      batch_size,
    })
  }

  /// 单张已解码图像，只产生一个批
  pub fn from_image(
    image: &RgbImage,
    data_shape: usize,
    mean_pixels: [f32; 3],
    batch_size: usize,
  ) -> Result<Self, InputError> {
    let tensor = preprocess(image, data_shape, mean_pixels).insert_axis(Axis(0));
    Self::from_tensor(tensor, batch_size)
  }

  pub fn len(&self) -> usize {
    self.data.len_of(Axis(0))
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl Iterator for ArraySource {
  type Item = Result<Batch, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let total = self.len();
    if self.cursor >= total {
      return None;
    }

    let end = (self.cursor + self.batch_size).min(total);
    let mut batch = Batch::zeros(self.batch_shape());
    batch
      .data
      .slice_mut(s![0..end - self.cursor, .., .., ..])
      .assign(&self.data.slice(s![self.cursor..end, .., .., ..]));
    batch.pad = self.batch_size - (end - self.cursor);
    self.cursor = end;

    Some(Ok(batch))
  }
}

impl BatchSource for ArraySource {
  fn batch_shape(&self) -> [usize; 4] {
    let (_, c, h, w) = self.data.dim();
    [self.batch_size, c, h, w]
  }
}
