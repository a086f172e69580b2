// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 检测模型
// 包含: 模型加载、预处理、推理、后处理

use std::path::PathBuf;

use image::{DynamicImage, GenericImageView};
use ndarray::{s, Array, Axis, IxDyn};

use super::{Model, ModelTask, OrtBackend, OrtConfig, OrtEP};
use crate::detection::{Bbox, DetectionResult};
use crate::error::{Error, Result};
use crate::logging::time_me;
use crate::non_max_suppression;

/// letterbox 填充值
const PAD_VALUE: f32 = 144.0 / 255.0;
const CXYWH_OFFSET: usize = 4;

#[derive(Debug, Clone)]
pub struct YOLOv8Config {
    pub model: PathBuf,
    pub ep: OrtEP,
    /// 动态输入时的 (width, height)
    pub input_size: (u32, u32),
    pub conf: f32,
    pub iou: f32,
}

/// YOLOv8 检测模型
pub struct YOLOv8 {
    engine: OrtBackend,
    nc: u32,
    height: u32,
    width: u32,
    batch: u32,
    conf: f32,
    iou: f32,
    names: Vec<String>,
}

impl YOLOv8 {
    pub fn new(config: YOLOv8Config) -> Result<Self> {
        let engine = OrtBackend::build(OrtConfig {
            f: config.model,
            ep: config.ep,
            image_size: (config.input_size.1, config.input_size.0),
            task: Some(ModelTask::Detect),
        })?;

        let (batch, height, width) = (engine.batch(), engine.height(), engine.width());
        let names: Vec<String> = engine.names().map(<[String]>::to_vec).unwrap_or_default();
        let nc = match engine.nc() {
            Some(nc) if nc > 0 => nc,
            _ => {
                return Err(Error::Parse(
                    "failed to get the number of classes from the model metadata".into(),
                )
                .logged())
            }
        };

        Ok(Self {
            engine,
            nc,
            height,
            width,
            batch,
            conf: config.conf,
            iou: config.iou,
            names,
        })
    }

    pub fn summary(&self) {
        log::info!(
            "📋 YOLOv8 > EP: {:?}{} > Batch: {}, Height: {} ({}), Width: {} ({}) > nc: {}, conf: {}, iou: {}",
            self.engine.ep(),
            if let OrtEP::CPU = self.engine.ep() {
                ""
            } else {
                " (May still fall back to CPU)"
            },
            self.batch,
            self.height,
            if self.engine.is_height_dynamic() {
                "Dynamic"
            } else {
                "Const"
            },
            self.width,
            if self.engine.is_width_dynamic() {
                "Dynamic"
            } else {
                "Const"
            },
            self.nc,
            self.conf,
            self.iou,
        );
    }

    pub fn conf(&self) -> f32 {
        self.conf
    }

    pub fn set_conf(&mut self, val: f32) {
        self.conf = val;
    }

    pub fn iou(&self) -> f32 {
        self.iou
    }

    pub fn set_iou(&mut self, val: f32) {
        self.iou = val;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn nc(&self) -> u32 {
        self.nc
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
    let r = (w1 / w0).min(h1 / h0);
    (r, (w0 * r).round(), (h0 * r).round())
}

/// 保持宽高比缩放, 左上对齐放入灰色画布, 输出 NCHW [0, 1]
pub fn letterbox(xs: &[DynamicImage], width: u32, height: u32) -> Array<f32, IxDyn> {
    let mut ys = Array::ones((xs.len(), 3, height as usize, width as usize)).into_dyn();
    ys.fill(PAD_VALUE);
    for (idx, x) in xs.iter().enumerate() {
        let (w0, h0) = x.dimensions();
        let (_, w_new, h_new) = scale_wh(w0 as f32, h0 as f32, width as f32, height as f32);
        let img = x.resize_exact(
            (w_new as u32).max(1),
            (h_new as u32).max(1),
            image::imageops::FilterType::Triangle,
        );
        for (x, y, rgb) in img.pixels() {
            let (x, y) = (x as usize, y as usize);
            if x >= width as usize || y >= height as usize {
                continue;
            }
            let [r, g, b, _] = rgb.0;
            ys[[idx, 0, y, x]] = (r as f32) / 255.0;
            ys[[idx, 1, y, x]] = (g as f32) / 255.0;
            ys[[idx, 2, y, x]] = (b as f32) / 255.0;
        }
    }
    ys
}

/// 解码检测头输出 `[batch, 4 + nc, anchors]`
///
/// 每个 anchor 取最高分类别, 低于 `conf` 丢弃, 坐标还原到原图并截断, 最后做 NMS
pub fn decode_detections(
    preds: &Array<f32, IxDyn>,
    originals: &[(u32, u32)],
    input_size: (u32, u32),
    nc: usize,
    conf: f32,
    iou: f32,
) -> Result<Vec<DetectionResult>> {
    let preds = preds.view().into_dimensionality::<ndarray::Ix3>()?;
    let mut ys = Vec::with_capacity(originals.len());
    for (idx, anchor) in preds.axis_iter(Axis(0)).enumerate() {
        let Some(&(w0, h0)) = originals.get(idx) else {
            break;
        };
        let (width_original, height_original) = (w0 as f32, h0 as f32);
        let ratio =
            (input_size.0 as f32 / width_original).min(input_size.1 as f32 / height_original);

        let mut data: Vec<Bbox> = Vec::new();
        for pred in anchor.axis_iter(Axis(1)) {
            if pred.len() < CXYWH_OFFSET + nc {
                continue;
            }
            let bbox = pred.slice(s![0..CXYWH_OFFSET]);
            let clss = pred.slice(s![CXYWH_OFFSET..CXYWH_OFFSET + nc]);
            let Some((id, &confidence)) = clss
                .into_iter()
                .enumerate()
                .reduce(|max, x| if x.1 > max.1 { x } else { max })
            else {
                continue;
            };
            if confidence < conf {
                continue;
            }

            let cx = bbox[0] / ratio;
            let cy = bbox[1] / ratio;
            let w = bbox[2] / ratio;
            let h = bbox[3] / ratio;
            let x = (cx - w / 2.).max(0.0).min(width_original);
            let y = (cy - h / 2.).max(0.0).min(height_original);
            let w = w.min(width_original - x);
            let h = h.min(height_original - y);
            data.push(Bbox::new(x, y, w, h, id, confidence));
        }

        non_max_suppression(&mut data, iou);
        ys.push(DetectionResult::new(data));
    }
    Ok(ys)
}

impl Model for YOLOv8 {
    fn preprocess(&mut self, images: &[DynamicImage]) -> Result<Vec<Array<f32, IxDyn>>> {
        Ok(vec![time_me("preprocess", || {
            letterbox(images, self.width, self.height)
        })])
    }

    fn run(&mut self, xs: Vec<Array<f32, IxDyn>>) -> Result<Vec<Array<f32, IxDyn>>> {
        let Some(x) = xs.into_iter().next() else {
            return Ok(Vec::new());
        };
        time_me("inference", || self.engine.run(x))
    }

    fn postprocess(
        &self,
        xs: Vec<Array<f32, IxDyn>>,
        xs0: &[DynamicImage],
    ) -> Result<Vec<DetectionResult>> {
        let Some(preds) = xs.first() else {
            return Ok(Vec::new());
        };
        let originals: Vec<(u32, u32)> = xs0.iter().map(|x| x.dimensions()).collect();
        time_me("postprocess", || {
            decode_detections(
                preds,
                &originals,
                (self.width, self.height),
                self.nc as usize,
                self.conf,
                self.iou,
            )
        })
    }

    fn engine_mut(&mut self) -> &mut OrtBackend {
        &mut self.engine
    }

    fn summary(&self) {
        YOLOv8::summary(self)
    }

    fn supports_task(&self, task: ModelTask) -> bool {
        matches!(task, ModelTask::Detect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn letterbox_keeps_aspect_ratio() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 100, image::Rgb([255, 0, 0])));
        let ys = letterbox(&[img], 64, 64);
        assert_eq!(ys.shape(), &[1, 3, 64, 64]);
        // 图像占据上半部分, 其余为填充值
        assert!(ys[[0, 0, 10, 10]] > 0.99);
        assert!(ys[[0, 1, 10, 10]] < 0.01);
        assert_eq!(ys[[0, 0, 50, 10]], PAD_VALUE);
    }

    #[test]
    fn decode_rescales_and_filters() {
        // 1 张图, 2 类, 3 个 anchor
        let mut preds = Array::zeros((1, 6, 3)).into_dyn();
        let anchors = [
            [32.0, 32.0, 16.0, 16.0, 0.9, 0.1],
            [33.0, 32.0, 16.0, 16.0, 0.8, 0.1], // 与第一个重叠, NMS 去除
            [10.0, 10.0, 4.0, 4.0, 0.1, 0.2],   // 低于阈值
        ];
        for (a, values) in anchors.iter().enumerate() {
            for (c, v) in values.iter().enumerate() {
                preds[[0, c, a]] = *v;
            }
        }
        let ys = decode_detections(&preds, &[(128, 128)], (64, 64), 2, 0.25, 0.45).unwrap();
        assert_eq!(ys.len(), 1);
        let boxes = ys[0].bboxes();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].id(), 0);
        assert_eq!(boxes[0].xyxy(), [48.0, 48.0, 80.0, 80.0]);
    }

    #[test]
    fn decode_rejects_bad_rank() {
        let preds = Array::zeros((6, 3)).into_dyn();
        assert!(decode_detections(&preds, &[(1, 1)], (64, 64), 2, 0.25, 0.45).is_err());
    }
}
