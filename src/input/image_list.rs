// 该文件是 SSDetect 项目的一部分。
// src/input/image_list.rs - 图像文件列表输入
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

use image::{ImageReader, RgbImage};
use ndarray::Array3;
use tracing::{debug, error};

use super::{Batch, BatchSource, InputError, RGB_CHANNELS, preprocess, resolve_image_path};

/// 按批读取图像文件，读取时才解码
pub struct ImageListSource {
  paths: Vec<PathBuf>,
  cursor: usize,
  batch_size: usize,
  data_shape: usize,
  mean_pixels: [f32; 3],
}

impl ImageListSource {
  pub fn new<S: AsRef<str>>(
    names: &[S],
    root_dir: Option<&Path>,
    extension: Option<&str>,
    batch_size: usize,
    data_shape: usize,
    mean_pixels: [f32; 3],
  ) -> Result<Self, InputError> {
    if batch_size == 0 {
      return Err(InputError::ZeroBatchSize);
    }

    let mut paths = Vec::with_capacity(names.len());
    for name in names {
      let path = resolve_image_path(name.as_ref(), root_dir, extension);
      if !path.is_file() {
        error!("图像文件不存在: {}", path.display());
        return Err(InputError::ImageNotFound(path));
      }
      paths.push(path);
    }
    debug!("图像列表共 {} 张", paths.len());

    Ok(ImageListSource {
      paths,
      cursor: 0,
      batch_size,
      data_shape,
      mean_pixels,
    })
  }

  pub fn paths(&self) -> &[PathBuf] {
    &self.paths
  }

  pub fn len(&self) -> usize {
    self.paths.len()
  }

  pub fn is_empty(&self) -> bool {
    self.paths.is_empty()
  }

  fn load(&self, path: &Path) -> Result<Array3<f32>, InputError> {
    let image = load_rgb_image(path)?;
    Ok(preprocess(&image, self.data_shape, self.mean_pixels))
  }
}

pub(crate) fn load_rgb_image(path: &Path) -> Result<RgbImage, InputError> {
  let to_error = |source| InputError::ImageLoad {
    path: path.to_path_buf(),
    source,
  };
  let image = ImageReader::open(path)
    .map_err(|e| to_error(image::ImageError::IoError(e)))?
    .with_guessed_format()
    .map_err(|e| to_error(image::ImageError::IoError(e)))?
    .decode()
    .map_err(to_error)?;
  Ok(image.to_rgb8())
}

impl Iterator for ImageListSource {
  type Item = Result<Batch, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.cursor >= self.paths.len() {
      return None;
    }

    let end = (self.cursor + self.batch_size).min(self.paths.len());
    let mut images = Vec::with_capacity(end - self.cursor);
    for path in &self.paths[self.cursor..end] {
      match self.load(path) {
        Ok(image) => images.push(image),
        Err(e) => {
          self.cursor = self.paths.len();
          return Some(Err(e));
        }
      }
    }
    self.cursor = end;

    Some(Batch::assemble(&images, self.batch_shape()))
  }
}

impl BatchSource for ImageListSource {
  fn batch_shape(&self) -> [usize; 4] {
    [self.batch_size, RGB_CHANNELS, self.data_shape, self.data_shape]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn write_images(dir: &Path, count: usize) -> Vec<String> {
    (0..count)
      .map(|i| {
        let name = format!("img{}", i);
        RgbImage::from_pixel(6, 4, Rgb([i as u8 * 10, 0, 0]))
          .save(dir.join(format!("{}.png", name)))
          .unwrap();
        name
      })
      .collect()
  }

  #[test]
  fn batches_with_trailing_pad() {
    let dir = tempfile::tempdir().unwrap();
    let names = write_images(dir.path(), 3);
    let source =
      ImageListSource::new(&names, Some(dir.path()), Some(".png"), 2, 8, [0.0; 3]).unwrap();
    assert_eq!(source.len(), 3);

    let batches: Vec<Batch> = source.map(Result::unwrap).collect();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].shape(), [2, 3, 8, 8]);
    assert_eq!(batches[0].pad, 0);
    assert_eq!(batches[1].pad, 1);
    assert_eq!(batches[1].data[[0, 0, 0, 0]], 20.0);
  }

  #[test]
  fn missing_image_fails_on_construction() {
    let dir = tempfile::tempdir().unwrap();
    let result = ImageListSource::new(&["nope"], Some(dir.path()), Some(".jpg"), 1, 8, [0.0; 3]);
    assert!(matches!(result, Err(InputError::ImageNotFound(_))));
  }

  #[test]
  fn undecodable_image_stops_iteration() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bad.png"), b"not an image").unwrap();
    let mut source =
      ImageListSource::new(&["bad.png"], Some(dir.path()), None, 1, 8, [0.0; 3]).unwrap();
    assert!(matches!(source.next(), Some(Err(InputError::ImageLoad { .. }))));
    assert!(source.next().is_none());
  }
}
