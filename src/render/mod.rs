// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 结果绘制 (Result Plotting)
///
/// 检测框 + 标签背景 + "<类别> <置信度>" + 中心点
pub mod font;

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;

use crate::config::ResultConfig;
use crate::detection::{Bbox, FrameResult};

/// font_scale = 1.0 对应的字号
const BASE_FONT_PX: f32 = 30.0;

/// Ultralytics 调色板
pub struct Colors {
    palette: Vec<Rgb<u8>>,
}

impl Default for Colors {
    fn default() -> Self {
        Self::new()
    }
}

impl Colors {
    const HEXS: [&'static str; 20] = [
        "FF3838", "FF9D97", "FF701F", "FFB21D", "CFD231", "48F90A", "92CC17", "3DDB86", "1A9334",
        "00D4BB", "2C99A8", "00C2FF", "344593", "6473FF", "0018EC", "8438FF", "520085", "CB38FF",
        "FF95C8", "FF37C7",
    ];

    pub fn new() -> Self {
        let palette = Self::HEXS.iter().map(|h| Self::hex2rgb(h)).collect();
        Self { palette }
    }

    fn hex2rgb(hex: &str) -> Rgb<u8> {
        let c = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0);
        Rgb([c(0), c(2), c(4)])
    }

    /// 按类别取色
    pub fn get(&self, id: usize) -> Rgb<u8> {
        self.palette[id % self.palette.len()]
    }
}

/// 背景色对应的文字颜色 (亮背景黑字, 暗背景白字)
pub fn text_color(background: Rgb<u8>) -> Rgb<u8> {
    let [r, g, b] = background.0;
    let luminance = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    if luminance > 150.0 {
        Rgb([0, 0, 0])
    } else {
        Rgb([255, 255, 255])
    }
}

/// 绘制检测框与标签
pub fn draw_box(
    img: &mut RgbImage,
    bbox: &Bbox,
    label: &str,
    color: Rgb<u8>,
    params: &ResultConfig,
    font: Option<&FontVec>,
) {
    let (x1, y1) = (bbox.xmin() as i32, bbox.ymin() as i32);
    let (w, h) = (bbox.width().max(1.) as u32, bbox.height().max(1.) as u32);
    for t in 0..params.border_thickness.max(1) as i32 {
        let (tw, th) = (w as i32 - 2 * t, h as i32 - 2 * t);
        if tw <= 0 || th <= 0 {
            break;
        }
        draw_hollow_rect_mut(
            img,
            Rect::at(x1 + t, y1 + t).of_size(tw as u32, th as u32),
            color,
        );
    }

    let Some(font) = font else {
        return;
    };
    let scale = PxScale::from(BASE_FONT_PX * params.font_scale);
    let (txt_w, txt_h) = text_size(scale, font, label);
    let bt = params.border_thickness as i32;
    let offsets = text_offsets(params.text_thickness);
    let txt_w = txt_w + offsets.end as u32 - 1;
    let bg_w = txt_w + 2 * params.border_thickness;
    let bg_h = txt_h + 2 * params.border_thickness;
    if bg_w == 0 || bg_h == 0 {
        return;
    }
    let top = y1 - txt_h as i32 - bt;
    draw_filled_rect_mut(img, Rect::at(x1 - bt, top).of_size(bg_w, bg_h), color);
    for dx in offsets {
        draw_text_mut(img, text_color(color), x1 + dx, top + bt, scale, font, label);
    }
}

/// 文字加粗: 按线宽逐像素右移重复绘制
pub fn text_offsets(thickness: u32) -> std::ops::Range<i32> {
    0..thickness.max(1) as i32
}

/// 绘制中心点
pub fn draw_center(img: &mut RgbImage, bbox: &Bbox, color: Rgb<u8>, params: &ResultConfig) {
    let c = bbox.center();
    draw_filled_circle_mut(img, (c.x, c.y), params.center_thickness as i32, color);
}

/// 绘制一帧结果 (全部检测框, 后检测的先画)
pub fn plot_result(
    img: &DynamicImage,
    result: &FrameResult,
    params: &ResultConfig,
    font: Option<&FontVec>,
) -> RgbImage {
    let colors = Colors::new();
    let mut out = img.to_rgb8();
    for bbox in result.all_boxes().iter().rev() {
        let color = colors.get(bbox.id());
        let label = format!("{} {:.2}", result.name(bbox.id()), bbox.confidence());
        draw_box(&mut out, bbox, &label, color, params, font);
        draw_center(&mut out, bbox, color, params);
    }
    out
}
