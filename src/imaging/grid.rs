// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 多图拼接 - 原始帧与各滤镜输出并排显示

use image::{imageops, DynamicImage, Rgb, RgbImage};

use crate::error::{Error, Result};

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// 四周加纯色边框
pub fn add_border(img: &RgbImage, width: u32, color: Rgb<u8>) -> RgbImage {
    let mut out = RgbImage::from_pixel(img.width() + 2 * width, img.height() + 2 * width, color);
    imageops::replace(&mut out, img, width as i64, width as i64);
    out
}

/// 填充到目标尺寸, 差值前半在上/左, 后半在下/右
pub fn pad_to(img: &RgbImage, target_height: u32, target_width: u32, color: Rgb<u8>) -> RgbImage {
    let delta_h = target_height.saturating_sub(img.height());
    let delta_w = target_width.saturating_sub(img.width());
    let mut out = RgbImage::from_pixel(img.width() + delta_w, img.height() + delta_h, color);
    imageops::replace(&mut out, img, (delta_w / 2) as i64, (delta_h / 2) as i64);
    out
}

/// 统一颜色通道与尺寸: 全部转为RGB并填充到最大宽高
pub fn unify_images(images: &[DynamicImage]) -> Vec<RgbImage> {
    let colored: Vec<RgbImage> = images.iter().map(DynamicImage::to_rgb8).collect();
    let max_w = colored.iter().map(RgbImage::width).max().unwrap_or(0);
    let max_h = colored.iter().map(RgbImage::height).max().unwrap_or(0);
    colored
        .iter()
        .map(|img| pad_to(img, max_h, max_w, WHITE))
        .collect()
}

/// 网格拼接: 列数 = ceil(sqrt(n)), 最后一行不足时以黑图补齐
pub fn images_grid(images: &[DynamicImage]) -> Result<RgbImage> {
    if images.is_empty() {
        return Err(Error::Parse("no images to build a grid from".into()).logged());
    }
    let cells: Vec<RgbImage> = unify_images(images)
        .iter()
        .map(|img| add_border(img, 1, WHITE))
        .collect();

    let n = cells.len();
    let cols = (n as f64).sqrt().ceil() as usize;
    let rows = n.div_ceil(cols);
    let (cell_w, cell_h) = cells[0].dimensions();

    let mut out = RgbImage::new(cell_w * cols as u32, cell_h * rows as u32);
    for (i, cell) in cells.iter().enumerate() {
        let x = (i % cols) as u32 * cell_w;
        let y = (i / cols) as u32 * cell_h;
        imageops::replace(&mut out, cell, x as i64, y as i64);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    fn rgb(w: u32, h: u32, v: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([v, v, v])))
    }

    #[test]
    fn border_grows_both_axes() {
        let out = add_border(&RgbImage::new(10, 4), 3, WHITE);
        assert_eq!(out.dimensions(), (16, 10));
        assert_eq!(*out.get_pixel(0, 0), WHITE);
        assert_eq!(*out.get_pixel(3, 3), Rgb([0, 0, 0]));
    }

    #[test]
    fn padding_splits_delta() {
        let out = pad_to(&RgbImage::new(10, 10), 10, 13, WHITE);
        assert_eq!(out.dimensions(), (13, 10));
        // 左1列, 右2列
        assert_eq!(*out.get_pixel(0, 5), WHITE);
        assert_eq!(*out.get_pixel(1, 5), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(10, 5), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(11, 5), WHITE);
    }

    #[test]
    fn unify_mixed_images() {
        let grey = DynamicImage::ImageLuma8(GrayImage::new(30, 5));
        let out = unify_images(&[rgb(10, 20, 0), grey]);
        assert!(out.iter().all(|img| img.dimensions() == (30, 20)));
    }

    #[test]
    fn grid_layout() {
        assert_eq!(images_grid(&[rgb(10, 10, 0)]).unwrap().dimensions(), (12, 12));
        assert_eq!(
            images_grid(&[rgb(10, 10, 0), rgb(10, 10, 0)]).unwrap().dimensions(),
            (24, 12)
        );
        let three = images_grid(&[rgb(10, 10, 9), rgb(10, 10, 9), rgb(10, 10, 9)]).unwrap();
        assert_eq!(three.dimensions(), (24, 24));
        // 补齐的空白格为黑色
        assert_eq!(*three.get_pixel(18, 18), Rgb([0, 0, 0]));
        assert_eq!(*three.get_pixel(6, 18), Rgb([9, 9, 9]));
        assert_eq!(images_grid(&vec![rgb(4, 4, 0); 5]).unwrap().dimensions(), (18, 12));
    }

    #[test]
    fn empty_grid_is_error() {
        assert!(images_grid(&[]).is_err());
    }
}
