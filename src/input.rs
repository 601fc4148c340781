// 该文件是 SSDetect 项目的一部分。
// src/input.rs - 图像/视频输入与批数据
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

use std::path::{Path, PathBuf};

use image::{RgbImage, imageops::FilterType};
use ndarray::{Array3, Array4, Axis};
use thiserror::Error;

mod array_source;
mod image_list;
mod prefetch;

pub use self::array_source::ArraySource;
pub use self::image_list::ImageListSource;
pub(crate) use self::image_list::load_rgb_image;
pub use self::prefetch::{DEFAULT_PREFETCH_DEPTH, Prefetcher};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::VideoFileInput;

pub const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum InputError {
  #[error("图像文件不存在: {0}")]
  ImageNotFound(PathBuf),
  #[error("图像加载错误 {path}: {source}")]
  ImageLoad {
    path: PathBuf,
    #[source]
    source: image::ImageError,
  },
  #[error("张量形状不匹配: 期望 {expected:?}, 实际 {actual:?}")]
  ShapeMismatch {
    expected: Vec<usize>,
    actual: Vec<usize>,
  },
  #[error("批大小必须大于 0")]
  ZeroBatchSize,
  #[error("视频文件不存在: {0}")]
  VideoNotFound(PathBuf),
  #[error("视频中没有可解码的帧")]
  EmptyVideo,
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer 错误: {0}")]
  GStreamer(#[from] gstreamer::glib::Error),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer 布尔错误: {0}")]
  GStreamerBool(#[from] gstreamer::glib::BoolError),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer 状态切换错误: {0}")]
  StateChange(#[from] gstreamer::StateChangeError),
  #[error("管道错误: {0}")]
  Pipeline(String),
  #[error("缓冲区大小不匹配: 期望 {expected} 字节, 实际 {actual} 字节")]
  BufferSizeMismatch { expected: usize, actual: usize },
}

/// 一个固定形状的输入批 (batch, channels, height, width)
///
/// `pad` 为尾部填充的空位数量，推理结果中对应的槽位会被丢弃。
#[derive(Debug, Clone)]
pub struct Batch {
  pub data: Array4<f32>,
  pub pad: usize,
}

impl Batch {
  pub fn zeros(shape: [usize; 4]) -> Self {
    Batch {
      data: Array4::zeros(shape),
      pad: 0,
    }
  }

  /// 把若干单张图像张量 (c, h, w) 装入批，不足部分补零
  pub fn assemble(images: &[Array3<f32>], shape: [usize; 4]) -> Result<Self, InputError> {
    let mut data = Array4::zeros(shape);
    for (slot, image) in images.iter().enumerate().take(shape[0]) {
      if image.shape() != &shape[1..] {
        return Err(InputError::ShapeMismatch {
          expected: shape[1..].to_vec(),
          actual: image.shape().to_vec(),
        });
      }
      data.index_axis_mut(Axis(0), slot).assign(image);
    }

    Ok(Batch {
      data,
      pad: shape[0].saturating_sub(images.len()),
    })
  }

  pub fn shape(&self) -> [usize; 4] {
    let dim = self.data.dim();
    [dim.0, dim.1, dim.2, dim.3]
  }

  /// 非填充的图像数量
  pub fn valid(&self) -> usize {
    self.data.len_of(Axis(0)).saturating_sub(self.pad)
  }
}

/// 批数据来源
pub trait BatchSource: Iterator<Item = Result<Batch, InputError>> + Send {
  /// 每个批的形状
  fn batch_shape(&self) -> [usize; 4];

  /// 是否已经在后台预取下一批
  fn is_prefetching(&self) -> bool {
    false
  }
}

impl<S: BatchSource + ?Sized> BatchSource for Box<S> {
  fn batch_shape(&self) -> [usize; 4] {
    (**self).batch_shape()
  }

  fn is_prefetching(&self) -> bool {
    (**self).is_prefetching()
  }
}

/// 缩放到 `data_shape × data_shape`，转为 CHW 并减去各通道均值
pub fn preprocess(image: &RgbImage, data_shape: usize, mean_pixels: [f32; 3]) -> Array3<f32> {
  let side = data_shape as u32;
  let resized;
  let image = if image.dimensions() == (side, side) {
    image
  } else {
    resized = image::imageops::resize(image, side, side, FilterType::Triangle);
    &resized
  };

  let mut tensor = Array3::<f32>::zeros((RGB_CHANNELS, data_shape, data_shape));
  for (x, y, pixel) in image.enumerate_pixels() {
    for c in 0..RGB_CHANNELS {
      tensor[[c, y as usize, x as usize]] = pixel[c] as f32 - mean_pixels[c];
    }
  }
  tensor
}

/// 解析图像路径：名称没有扩展名时补上 `extension`，再拼接 `root_dir`
pub fn resolve_image_path(name: &str, root_dir: Option<&Path>, extension: Option<&str>) -> PathBuf {
  let mut file = PathBuf::from(name);
  if let Some(extension) = extension
    && file.extension().is_none()
  {
    let extension = extension.trim_start_matches('.');
    if !extension.is_empty() {
      file.set_extension(extension);
    }
  }

  match root_dir {
    Some(root) => root.join(file),
    None => file,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn preprocess_subtracts_mean_per_channel() {
    let image = RgbImage::from_pixel(4, 4, Rgb([130, 120, 110]));
    let tensor = preprocess(&image, 4, [123.0, 117.0, 104.0]);
    assert_eq!(tensor.shape(), &[3, 4, 4]);
    assert_eq!(tensor[[0, 0, 0]], 7.0);
    assert_eq!(tensor[[1, 3, 2]], 3.0);
    assert_eq!(tensor[[2, 1, 1]], 6.0);
  }

  #[test]
  fn preprocess_resizes_to_square() {
    let image = RgbImage::from_pixel(17, 9, Rgb([0, 0, 0]));
    let tensor = preprocess(&image, 8, [0.0; 3]);
    assert_eq!(tensor.shape(), &[3, 8, 8]);
  }

  #[test]
  fn assemble_pads_missing_slots() {
    let one = Array3::from_elem((3, 2, 2), 1.0);
    let batch = Batch::assemble(&[one], [3, 3, 2, 2]).unwrap();
    assert_eq!(batch.pad, 2);
    assert_eq!(batch.valid(), 1);
    assert_eq!(batch.data[[0, 1, 1, 1]], 1.0);
    assert_eq!(batch.data[[2, 1, 1, 1]], 0.0);
  }

  #[test]
  fn assemble_rejects_wrong_image_shape() {
    let wrong = Array3::zeros((3, 4, 4));
    assert!(matches!(
      Batch::assemble(&[wrong], [1, 3, 2, 2]),
      Err(InputError::ShapeMismatch { .. })
    ));
  }

  #[test]
  fn resolve_appends_extension_and_root() {
    let root = Path::new("/data/voc");
    assert_eq!(
      resolve_image_path("000001", Some(root), Some(".jpg")),
      PathBuf::from("/data/voc/000001.jpg")
    );
    assert_eq!(
      resolve_image_path("000002.png", Some(root), Some(".jpg")),
      PathBuf::from("/data/voc/000002.png")
    );
    assert_eq!(
      resolve_image_path("a/b", None, Some("png")),
      PathBuf::from("a/b.png")
    );
    assert_eq!(resolve_image_path("cat.jpg", None, None), PathBuf::from("cat.jpg"));
  }
}
