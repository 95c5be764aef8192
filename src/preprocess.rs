// 该文件是 DLR Classify 项目的一部分。
// src/preprocess.rs - 图像预处理
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

use image::{DynamicImage, RgbImage, imageops::FilterType};

use crate::tensor::{Tensor, TensorError, TensorLayout};

const RGB_CHANNELS: usize = 3;

/// 逐通道归一化: `(v - mean[c]) / std[c]`，通道顺序为 RGB。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
  pub mean: [f32; 3],
  pub std: [f32; 3],
}

impl Normalization {
  pub const fn uniform(mean: f32, std: f32) -> Self {
    Self {
      mean: [mean; 3],
      std: [std; 3],
    }
  }

  pub fn apply(&self, rgb: [u8; 3]) -> [f32; 3] {
    [
      (rgb[0] as f32 - self.mean[0]) / self.std[0],
      (rgb[1] as f32 - self.mean[1]) / self.std[1],
      (rgb[2] as f32 - self.mean[2]) / self.std[2],
    ]
  }

  /// 归一化打包像素 `0xAARRGGBB`。
  pub fn normalize_argb(&self, pixel: u32) -> [f32; 3] {
    let r = ((pixel >> 16) & 0xFF) as u8;
    let g = ((pixel >> 8) & 0xFF) as u8;
    let b = (pixel & 0xFF) as u8;
    self.apply([r, g, b])
  }
}

/// 缩放到模型输入尺寸（不保持宽高比）。
pub fn resize_to_input(image: &DynamicImage, width: u32, height: u32) -> RgbImage {
  if image.width() == width && image.height() == height {
    return image.to_rgb8();
  }
  image
    .resize_exact(width, height, FilterType::Triangle)
    .to_rgb8()
}

/// 一次遍历完成归一化，按布局输出 `[1, H, W, 3]` 或 `[1, 3, H, W]`。
pub fn image_to_tensor(
  image: &RgbImage,
  layout: TensorLayout,
  norm: &Normalization,
) -> Result<Tensor, TensorError> {
  let (width, height) = image.dimensions();
  let (w, h) = (width as usize, height as usize);
  let plane = w * h;
  let mut data = vec![0.0f32; plane * RGB_CHANNELS];

  for (i, pixel) in image.pixels().enumerate() {
    let values = norm.apply(pixel.0);
    for (c, value) in values.into_iter().enumerate() {
      let index = match layout {
        TensorLayout::Nhwc => i * RGB_CHANNELS + c,
        TensorLayout::Nchw => c * plane + i,
      };
      data[index] = value;
    }
  }

  let shape = match layout {
    TensorLayout::Nhwc => [1, h as i64, w as i64, RGB_CHANNELS as i64],
    TensorLayout::Nchw => [1, RGB_CHANNELS as i64, h as i64, w as i64],
  };
  Tensor::new(shape.to_vec(), data)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tensor::hwc_to_chw;
  use image::Rgb;

  const GLUONCV: Normalization = Normalization {
    mean: [123.0, 117.0, 104.0],
    std: [58.395, 57.12, 57.375],
  };

  #[test]
  fn argb_channels_are_extracted() {
    let norm = Normalization::uniform(0.0, 1.0);
    assert_eq!(norm.normalize_argb(0xFF102030), [16.0, 32.0, 48.0]);
  }

  #[test]
  fn normalization_is_deterministic() {
    let norm = Normalization::uniform(127.5, 127.5);
    for pixel in [0u32, 0xFFFFFFFF, 0xFF7F80FF, 0x00123456] {
      assert_eq!(norm.normalize_argb(pixel), norm.normalize_argb(pixel));
    }
    assert_eq!(norm.normalize_argb(0xFF000000), [-1.0, -1.0, -1.0]);
    assert_eq!(norm.normalize_argb(0xFFFFFFFF), [1.0, 1.0, 1.0]);
  }

  #[test]
  fn gluoncv_constants() {
    let [r, g, b] = GLUONCV.normalize_argb(0xFF7B7568);
    assert_eq!([r, g, b], [0.0, 0.0, 0.0]);
  }

  #[test]
  fn layouts_agree_after_reorder() {
    let mut image = RgbImage::new(3, 2);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
      *pixel = Rgb([x as u8 * 40, y as u8 * 90, 200]);
    }

    let nhwc = image_to_tensor(&image, TensorLayout::Nhwc, &GLUONCV).unwrap();
    let nchw = image_to_tensor(&image, TensorLayout::Nchw, &GLUONCV).unwrap();

    assert_eq!(nhwc.shape(), &[1, 2, 3, 3]);
    assert_eq!(nchw.shape(), &[1, 3, 2, 3]);
    assert_eq!(hwc_to_chw(nhwc.data(), 2, 3, 3), nchw.data());
  }

  #[test]
  fn resize_matches_model_input() {
    let image = DynamicImage::ImageRgb8(RgbImage::new(320, 240));
    let resized = resize_to_input(&image, 224, 224);
    assert_eq!(resized.dimensions(), (224, 224));
  }
}
