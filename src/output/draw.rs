// 该文件是 SSDetect 项目的一部分。
// src/output/draw.rs - 检测框与标签绘制
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

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use tracing::{info, warn};

use super::OutputError;

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_TEXT_HEIGHT: u32 = 16;
const LABEL_CHAR_WIDTH: f32 = 8.0; // 无字体时每字符宽度的估计
pub const BOX_COLOR: [u8; 3] = [192, 0, 0];
pub const LABEL_COLOR: [u8; 3] = [0, 0, 128];
pub const TEXT_COLOR: [u8; 3] = [255, 255, 255];

static DEFAULT_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

pub struct Draw {
  font: Option<FontArc>,
  font_size: f32,
  box_color: Rgb<u8>,
  label_color: Rgb<u8>,
  text_color: Rgb<u8>,
}

impl Default for Draw {
  fn default() -> Self {
    let font = FontArc::try_from_slice(DEFAULT_FONT)
      .inspect_err(|e| warn!("无法加载内置字体: {}", e))
      .ok();

    Self {
      font,
      font_size: LABEL_FONT_SIZE,
      box_color: Rgb(BOX_COLOR),
      label_color: Rgb(LABEL_COLOR),
      text_color: Rgb(TEXT_COLOR),
    }
  }
}

impl Draw {
  pub fn load_font(path: impl AsRef<Path>) -> Result<FontArc, OutputError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(data)
      .map_err(|e| OutputError::Font(format!("{}: {}", path.display(), e)))?;
    info!("已加载字体: {}", path.display());
    Ok(font)
  }

  /// 不绘制标签文字，只画边框与标签背景
  pub fn without_font(mut self) -> Self {
    self.font = None;
    self
  }

  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = Some(font);
    self
  }

  pub fn with_font_size(mut self, font_size: f32) -> Self {
    self.font_size = font_size;
    self
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  fn label_size(&self, label: &str) -> (u32, u32) {
    match &self.font {
      Some(font) => text_size(PxScale::from(self.font_size), font, label),
      None => (
        (label.chars().count() as f32 * LABEL_CHAR_WIDTH) as u32,
        LABEL_TEXT_HEIGHT,
      ),
    }
  }

  /// 绘制边框与标签，bbox 为归一化坐标 [x_min, y_min, x_max, y_max]
  ///
  /// 边框退化（宽或高为零）时不绘制，返回 false。
  pub fn draw_bbox_with_label(&self, image: &mut RgbImage, bbox: &[f32; 4], label: &str) -> bool {
    let (w, h) = (image.width() as f32, image.height() as f32);
    if w < 1.0 || h < 1.0 {
      return false;
    }

    let x_min = ((bbox[0] * w) as i32).clamp(0, w as i32 - 1);
    let y_min = ((bbox[1] * h) as i32).clamp(0, h as i32 - 1);
    let x_max = ((bbox[2] * w) as i32).clamp(0, w as i32 - 1);
    let y_max = ((bbox[3] * h) as i32).clamp(0, h as i32 - 1);

    if x_min >= x_max || y_min >= y_max {
      return false;
    }

    // 边框加粗为 2 像素
    let box_w = (x_max - x_min + 1) as u32;
    let box_h = (y_max - y_min + 1) as u32;
    draw_hollow_rect_mut(
      image,
      Rect::at(x_min, y_min).of_size(box_w, box_h),
      self.box_color,
    );
    if box_w > 2 && box_h > 2 {
      draw_hollow_rect_mut(
        image,
        Rect::at(x_min + 1, y_min + 1).of_size(box_w - 2, box_h - 2),
        self.box_color,
      );
    }

    // 标签背景贴在边框上方
    let (text_w, text_h) = self.label_size(label);
    let label_y = (y_min - text_h as i32).max(0);
    let label_w = text_w.min((w as i32 - x_min).max(0) as u32);
    if label_w > 0 && text_h > 0 {
      draw_filled_rect_mut(
        image,
        Rect::at(x_min, label_y).of_size(label_w, text_h),
        self.label_color,
      );
      if let Some(font) = &self.font {
        draw_text_mut(
          image,
          self.text_color,
          x_min,
          label_y,
          PxScale::from(self.font_size),
          font,
          label,
        );
      }
    }

    true
  }
}
