// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 图像处理 (Image Processing)
///
/// - Filter: 按名称注册的帧滤镜 (GREY / COLOR / RESIZE / CUT)
/// - grid:   多图拼接显示
pub mod grid;

pub use grid::{add_border, images_grid, pad_to, unify_images};

use std::fmt;
use std::str::FromStr;

use fast_image_resize as fr;
use image::{DynamicImage, GrayImage, RgbImage};
use phf::phf_map;

use crate::error::{Error, Result};

/// 帧滤镜
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    /// 彩色 → 灰度
    Grey,
    /// 灰度 → 彩色
    Color,
    /// 缩放到模型输入尺寸
    Resize,
    /// 居中裁剪到模型输入宽高比
    Cut,
}

static FILTERS: phf::Map<&'static str, Filter> = phf_map! {
    "GREY" => Filter::Grey,
    "COLOR" => Filter::Color,
    "RESIZE" => Filter::Resize,
    "CUT" => Filter::Cut,
};

impl Filter {
    pub const ALL: [Filter; 4] = [Filter::Grey, Filter::Color, Filter::Resize, Filter::Cut];

    /// 按名称查找 (不区分大小写)
    pub fn from_name(name: &str) -> Result<Self> {
        FILTERS
            .get(name.trim().to_uppercase().as_str())
            .copied()
            .ok_or_else(|| Error::UnknownFilter(name.to_string()).logged())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Filter::Grey => "GREY",
            Filter::Color => "COLOR",
            Filter::Resize => "RESIZE",
            Filter::Cut => "CUT",
        }
    }

    /// 可用滤镜名列表 (用于命令行帮助)
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Filter::name).collect()
    }

    /// 应用滤镜, `size` 为模型输入尺寸 (width, height)
    pub fn apply(&self, frame: &DynamicImage, size: (u32, u32)) -> Result<DynamicImage> {
        match self {
            Filter::Grey => Ok(DynamicImage::ImageLuma8(frame.to_luma8())),
            Filter::Color => Ok(DynamicImage::ImageRgb8(frame.to_rgb8())),
            Filter::Resize => resize(frame, size.0, size.1),
            Filter::Cut => Ok(cut(frame, size.0, size.1)),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Filter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Filter::from_name(s)
    }
}

/// 依次应用滤镜链
pub fn apply_filters(
    frame: &DynamicImage,
    filters: &[Filter],
    size: (u32, u32),
) -> Result<DynamicImage> {
    let mut out = frame.clone();
    for filter in filters {
        out = filter.apply(&out, size)?;
    }
    Ok(out)
}

/// 双线性缩放 (fast_image_resize), 灰度图保持单通道
pub fn resize(frame: &DynamicImage, width: u32, height: u32) -> Result<DynamicImage> {
    if width == 0 || height == 0 {
        return Err(Error::Resize(format!("invalid target size {}x{}", width, height)).logged());
    }
    let options =
        fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear));
    let mut resizer = fr::Resizer::new();

    if let DynamicImage::ImageLuma8(grey) = frame {
        let src = fr::images::Image::from_vec_u8(
            grey.width(),
            grey.height(),
            grey.as_raw().clone(),
            fr::PixelType::U8,
        )
        .map_err(|e| Error::Resize(e.to_string()))?;
        let mut dst = fr::images::Image::new(width, height, fr::PixelType::U8);
        resizer
            .resize(&src, &mut dst, &options)
            .map_err(|e| Error::Resize(e.to_string()))?;
        let out = GrayImage::from_raw(width, height, dst.into_vec())
            .ok_or_else(|| Error::Resize("buffer size mismatch".into()))?;
        return Ok(DynamicImage::ImageLuma8(out));
    }

    let rgb = frame.to_rgb8();
    let src = fr::images::Image::from_vec_u8(
        rgb.width(),
        rgb.height(),
        rgb.into_raw(),
        fr::PixelType::U8x3,
    )
    .map_err(|e| Error::Resize(e.to_string()))?;
    let mut dst = fr::images::Image::new(width, height, fr::PixelType::U8x3);
    resizer
        .resize(&src, &mut dst, &options)
        .map_err(|e| Error::Resize(e.to_string()))?;
    let out = RgbImage::from_raw(width, height, dst.into_vec())
        .ok_or_else(|| Error::Resize("buffer size mismatch".into()))?;
    Ok(DynamicImage::ImageRgb8(out))
}

/// 居中裁剪到 width:height 的宽高比 (不放大)
pub fn cut(frame: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (w0, h0) = (frame.width(), frame.height());
    if width == 0 || height == 0 || w0 == 0 || h0 == 0 {
        return frame.clone();
    }
    let ratio = width as f64 / height as f64;
    let (cw, ch) = if (w0 as f64 / h0 as f64) > ratio {
        (((h0 as f64) * ratio).round() as u32, h0)
    } else {
        (w0, ((w0 as f64) / ratio).round() as u32)
    };
    let (cw, ch) = (cw.clamp(1, w0), ch.clamp(1, h0));
    frame.crop_imm((w0 - cw) / 2, (h0 - ch) / 2, cw, ch)
}
