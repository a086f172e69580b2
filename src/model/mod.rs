// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 模型管理 (Model Management)
///
/// ## 组成
/// - **OrtBackend**: ONNX Runtime 推理会话 (`backend.rs`)
/// - **YOLOv8**: 检测模型, 实现 `Model` trait (`yolov8.rs`)
/// - **YoloCli**: 外部 `yolo` 命令, 负责导出与训练 (`ultralytics.rs`)
/// - **ModelManager**: 模型目录 `<models>/<name>/` 的加载与逐帧推理 (`manager.rs`)
/// - **train_model**: 在划分好的数据集上训练并生成模型目录 (`trainer.rs`)
///
/// ## Model Trait
/// 统一的模型接口: preprocess → run → postprocess
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use image::DynamicImage;
use ndarray::{Array, IxDyn};
use serde::{Deserialize, Serialize};

use crate::detection::DetectionResult;
use crate::error::{Error, Result};
use crate::filesystem::DatasetMetadata;

pub mod backend;
pub mod manager;
pub mod trainer;
pub mod ultralytics;
pub mod yolov8;

pub use backend::{OrtBackend, OrtConfig, OrtEP};
pub use manager::ModelManager;
pub use trainer::{train_model, TrainOptions};
pub use ultralytics::YoloCli;
pub use yolov8::{YOLOv8, YOLOv8Config};

/// YOLO 任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelTask {
    #[default]
    Detect,
    Segment,
    Classify,
    Pose,
}

impl ModelTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTask::Detect => "detect",
            ModelTask::Segment => "segment",
            ModelTask::Classify => "classify",
            ModelTask::Pose => "pose",
        }
    }
}

impl fmt::Display for ModelTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelTask {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "detect" => Ok(ModelTask::Detect),
            "segment" => Ok(ModelTask::Segment),
            "classify" => Ok(ModelTask::Classify),
            "pose" => Ok(ModelTask::Pose),
            other => Err(Error::Parse(format!("unknown task \"{}\"", other))),
        }
    }
}

/// 模型元数据 (`<models>/<name>/metadata.yaml`)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelMetadata {
    #[serde(flatten)]
    pub dataset: DatasetMetadata,
    #[serde(default)]
    pub n_train: usize,
    #[serde(default)]
    pub n_val: usize,
    #[serde(default)]
    pub n_test: usize,
    #[serde(default)]
    pub names: BTreeMap<u32, String>,
}

impl ModelMetadata {
    pub fn read(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            log::error!("❌ 无法读取 {}: {}", path.display(), e);
            e
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn write(&self, path: &std::path::Path) -> Result<()> {
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        log::debug!("📝 模型元数据已写入 {}", path.display());
        Ok(())
    }
}

/// 统一的模型接口
///
/// ```text
/// 原始图片 → preprocess → ndarray张量
///          ↓
///     推理引擎 run
///          ↓
///     原始输出 → postprocess → 检测结果
/// ```
pub trait Model {
    /// 预处理: 图片 → NCHW 张量
    fn preprocess(&mut self, images: &[DynamicImage]) -> Result<Vec<Array<f32, IxDyn>>>;

    /// 推理: 执行模型前向传播
    fn run(&mut self, xs: Vec<Array<f32, IxDyn>>) -> Result<Vec<Array<f32, IxDyn>>>;

    /// 后处理: 原始输出 → 检测结果 (坐标还原到原图)
    fn postprocess(
        &self,
        xs: Vec<Array<f32, IxDyn>>,
        xs0: &[DynamicImage],
    ) -> Result<Vec<DetectionResult>>;

    /// 完整的推理流程: preprocess → run → postprocess
    fn forward(&mut self, images: &[DynamicImage]) -> Result<Vec<DetectionResult>> {
        let xs = self.preprocess(images)?;
        let ys = self.run(xs)?;
        self.postprocess(ys, images)
    }

    /// 获取底层推理引擎的可变引用
    fn engine_mut(&mut self) -> &mut OrtBackend;

    /// 打印模型信息
    fn summary(&self);

    fn supports_task(&self, task: ModelTask) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_names() {
        assert_eq!("Detect".parse::<ModelTask>().unwrap(), ModelTask::Detect);
        assert_eq!(ModelTask::Pose.to_string(), "pose");
        assert!("track".parse::<ModelTask>().is_err());
    }

    #[test]
    fn metadata_optional_fields() {
        let text = "date: 2024-05-01T10:00:00Z\ncamera_width: 1280\ncamera_height: 720\nfilters:\n- GREY\n";
        let meta: ModelMetadata = serde_yaml::from_str(text).unwrap();
        assert_eq!(meta.dataset.camera_width, 1280);
        assert_eq!(meta.dataset.brightness, None);
        assert_eq!(meta.n_train, 0);
        assert!(meta.names.is_empty());

        let text = "camera_width: 640\ncamera_height: 480\nfilters: []\nbrightness: 100\nn_train: 7\nnames:\n  0: screw\n";
        let meta: ModelMetadata = serde_yaml::from_str(text).unwrap();
        assert_eq!(meta.dataset.brightness, Some(100.0));
        assert_eq!(meta.n_train, 7);
        assert_eq!(meta.names.get(&0).map(String::as_str), Some("screw"));
    }
}
