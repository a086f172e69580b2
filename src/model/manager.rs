// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 模型目录 `<models>/<name>/` 的加载与逐帧推理

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use image::{DynamicImage, RgbImage};

use super::ultralytics::{is_valid_export, YoloCli};
use super::{Model, ModelMetadata, OrtEP, YOLOv8, YOLOv8Config};
use crate::config::ModelConfig;
use crate::detection::{FrameResult, ResultTracker};
use crate::error::{Error, Result};
use crate::filesystem::files::METADATA_FILE;
use crate::imaging::{apply_filters, images_grid, Filter};

/// 模型目录中的文件
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPaths {
    pub name: String,
    pub path: PathBuf,
    pub pt_model_path: PathBuf,
    pub metadata_path: PathBuf,
    pub onnx_model_path: PathBuf,
}

impl ModelPaths {
    /// 目录必须存在, 且包含 `<name>.pt` 与 `metadata.yaml`
    pub fn validate(models_dir: &Path, name: &str) -> Result<Self> {
        let path = models_dir.join(name);
        let pt_model_path = path.join(format!("{}.pt", name));
        let metadata_path = path.join(METADATA_FILE);
        if !path.is_dir() {
            return Err(Error::NotADirectory(path).logged());
        }
        if !pt_model_path.is_file() || !metadata_path.is_file() {
            return Err(Error::ModelStructure {
                path,
                pt: format!("{}.pt", name),
            }
            .logged());
        }
        Ok(Self {
            name: name.to_string(),
            onnx_model_path: pt_model_path.with_extension("onnx"),
            path,
            pt_model_path,
            metadata_path,
        })
    }
}

pub struct ModelManager {
    paths: ModelPaths,
    config: ModelConfig,
    filters: Vec<Filter>,
    detector: YOLOv8,
    tracker: ResultTracker,
    last_input: Option<DynamicImage>,
    last_processed: Option<DynamicImage>,
    last_result: Option<RgbImage>,
}

impl ModelManager {
    pub fn open(models_dir: &Path, name: &str, config: &ModelConfig) -> Result<Self> {
        Self::open_with(models_dir, name, config, &YoloCli::from_env(), OrtEP::CPU)
    }

    /// 校验目录 → 导出 ONNX (已有有效导出时跳过) → 加载检测器
    pub fn open_with(
        models_dir: &Path,
        name: &str,
        config: &ModelConfig,
        cli: &YoloCli,
        ep: OrtEP,
    ) -> Result<Self> {
        let paths = ModelPaths::validate(models_dir, name)?;
        if is_valid_export(&paths.onnx_model_path) {
            log::warn!("⚠️ 模型 \"{}\" 已有 ONNX 导出, 跳过导出", paths.name);
        } else {
            let imgsz = config
                .yolo_image_input_width
                .max(config.yolo_image_input_height);
            cli.export_onnx(&paths.pt_model_path, imgsz)?;
        }

        let metadata = ModelMetadata::read(&paths.metadata_path)?;
        let filters = metadata.dataset.filters()?;
        let detector = YOLOv8::new(YOLOv8Config {
            model: paths.onnx_model_path.clone(),
            ep,
            input_size: (config.yolo_image_input_width, config.yolo_image_input_height),
            conf: config.conf_threshold,
            iou: config.iou_threshold,
        })?;
        detector.summary();
        log::debug!("✅ 模型 \"{}\" 已加载", paths.name);

        Ok(Self {
            paths,
            config: config.clone(),
            filters,
            detector,
            tracker: ResultTracker::new(),
            last_input: None,
            last_processed: None,
            last_result: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.paths.name
    }

    pub fn path(&self) -> &Path {
        &self.paths.path
    }

    pub fn pt_model_path(&self) -> &Path {
        &self.paths.pt_model_path
    }

    pub fn metadata_path(&self) -> &Path {
        &self.paths.metadata_path
    }

    pub fn onnx_model_path(&self) -> &Path {
        &self.paths.onnx_model_path
    }

    /// 每次调用都重新读取文件
    pub fn metadata(&self) -> Result<ModelMetadata> {
        ModelMetadata::read(&self.paths.metadata_path)
    }

    pub fn camera_width(&self) -> Result<u32> {
        Ok(self.metadata()?.dataset.camera_width)
    }

    pub fn camera_height(&self) -> Result<u32> {
        Ok(self.metadata()?.dataset.camera_height)
    }

    pub fn camera_brightness(&self) -> Result<Option<f32>> {
        Ok(self.metadata()?.dataset.brightness)
    }

    pub fn camera_contrast(&self) -> Result<Option<f32>> {
        Ok(self.metadata()?.dataset.contrast)
    }

    pub fn camera_saturation(&self) -> Result<Option<f32>> {
        Ok(self.metadata()?.dataset.saturation)
    }

    pub fn camera_exposure(&self) -> Result<Option<f32>> {
        Ok(self.metadata()?.dataset.exposure)
    }

    pub fn camera_wb(&self) -> Result<Option<f32>> {
        Ok(self.metadata()?.dataset.wb)
    }

    pub fn date(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.metadata()?.dataset.date)
    }

    /// 训练数据采集时使用的滤镜
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn tracker(&self) -> &ResultTracker {
        &self.tracker
    }

    /// 滤镜 → 检测 → 绘制, 保存最近一次的输入/处理后/结果图像
    pub fn process_frame(&mut self, frame: &DynamicImage) -> Result<FrameResult> {
        let size = (
            self.config.yolo_image_input_width,
            self.config.yolo_image_input_height,
        );
        let processed = apply_filters(frame, &self.filters, size)?;
        let results = self.detector.forward(std::slice::from_ref(&processed))?;
        let detection = results.into_iter().next().unwrap_or_default();
        let result = FrameResult::new(
            &detection,
            processed.width(),
            processed.height(),
            self.detector.names(),
            &self.config.result,
        );
        self.tracker.add_new_result(result.clone());
        self.last_result = Some(self.tracker.plot(&processed, &self.config.result));
        self.last_input = Some(frame.clone());
        self.last_processed = Some(processed);
        Ok(result)
    }

    pub fn last_processed(&self) -> Option<&DynamicImage> {
        self.last_processed.as_ref()
    }

    /// `source` 为真时返回 [输入, 结果] 网格, 否则只返回结果
    pub fn last_result_image(&self, source: bool) -> Result<Option<RgbImage>> {
        let Some(result) = &self.last_result else {
            return Ok(None);
        };
        match (&self.last_input, source) {
            (Some(input), true) => Ok(Some(images_grid(&[
                input.clone(),
                DynamicImage::ImageRgb8(result.clone()),
            ])?)),
            _ => Ok(Some(result.clone())),
        }
    }
}
