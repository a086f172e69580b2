// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! ONNX Runtime 推理后端

use std::path::PathBuf;

use ndarray::{Array, IxDyn};
use once_cell::sync::Lazy;
use ort::{
    CPUExecutionProvider, CUDAExecutionProvider, GraphOptimizationLevel, Session,
    TensorRTExecutionProvider, ValueType,
};
use regex::Regex;

use super::ModelTask;
use crate::error::Result;

static NAMES_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(['"])([-()\w '"]+)(['"])"#).ok());

/// 执行设备
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrtEP {
    #[default]
    CPU,
    CUDA(i32),
    Trt(i32),
}

#[derive(Debug, Clone)]
pub struct OrtConfig {
    pub f: PathBuf,
    pub ep: OrtEP,
    /// 动态输入尺寸时使用的 (height, width)
    pub image_size: (u32, u32),
    pub task: Option<ModelTask>,
}

pub struct OrtBackend {
    session: Session,
    ep: OrtEP,
    batch: u32,
    height: u32,
    width: u32,
    is_height_dynamic: bool,
    is_width_dynamic: bool,
    task: ModelTask,
    names: Option<Vec<String>>,
    output_names: Vec<String>,
}

impl OrtBackend {
    pub fn build(config: OrtConfig) -> Result<Self> {
        let providers = match config.ep {
            OrtEP::Trt(device_id) => vec![
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ],
            OrtEP::CUDA(device_id) => vec![CUDAExecutionProvider::default()
                .with_device_id(device_id)
                .build()],
            OrtEP::CPU => vec![CPUExecutionProvider::default().build()],
        };

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_execution_providers(providers)?
            .commit_from_file(&config.f)?;

        // NCHW, 动态维度为 -1
        let dims: Vec<i64> = match &session.inputs[0].input_type {
            ValueType::Tensor { dimensions, .. } => dimensions.clone(),
            _ => Vec::new(),
        };
        let dim = |i: usize| dims.get(i).copied().filter(|d| *d > 0);
        let batch = dim(0).unwrap_or(1) as u32;
        let (height, is_height_dynamic) = match dim(2) {
            Some(h) => (h as u32, false),
            None => (config.image_size.0, true),
        };
        let (width, is_width_dynamic) = match dim(3) {
            Some(w) => (w as u32, false),
            None => (config.image_size.1, true),
        };

        let output_names = session.outputs.iter().map(|o| o.name.clone()).collect();

        let mut backend = Self {
            session,
            ep: config.ep,
            batch,
            height,
            width,
            is_height_dynamic,
            is_width_dynamic,
            task: ModelTask::Detect,
            names: None,
            output_names,
        };
        backend.names = backend.fetch_from_metadata("names").map(|s| parse_names(&s));
        backend.task = match config.task {
            Some(task) => task,
            None => backend
                .fetch_from_metadata("task")
                .and_then(|t| t.parse().ok())
                .unwrap_or_default(),
        };
        log::info!(
            "🧠 模型已加载: {} ({:?}, {}x{}, {})",
            config.f.display(),
            backend.ep,
            backend.width,
            backend.height,
            backend.task
        );
        Ok(backend)
    }

    pub fn run(&mut self, xs: Array<f32, IxDyn>) -> Result<Vec<Array<f32, IxDyn>>> {
        let outputs = self.session.run(ort::inputs![xs.view()]?)?;
        let mut ys = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let y = outputs[name.as_str()]
                .try_extract_tensor::<f32>()?
                .into_owned();
            ys.push(y);
        }
        Ok(ys)
    }

    pub fn fetch_from_metadata(&self, key: &str) -> Option<String> {
        self.session.metadata().ok()?.custom(key).ok()?
    }

    pub fn names(&self) -> Option<&[String]> {
        self.names.as_deref()
    }

    pub fn nc(&self) -> Option<u32> {
        self.names.as_ref().map(|n| n.len() as u32)
    }

    pub fn ep(&self) -> OrtEP {
        self.ep
    }

    pub fn batch(&self) -> u32 {
        self.batch
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn is_height_dynamic(&self) -> bool {
        self.is_height_dynamic
    }

    pub fn is_width_dynamic(&self) -> bool {
        self.is_width_dynamic
    }

    pub fn task(&self) -> ModelTask {
        self.task
    }
}

/// 解析导出时写入的类别表: `{0: 'person', 1: 'bicycle'}`
pub fn parse_names(raw: &str) -> Vec<String> {
    let Some(re) = NAMES_RE.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(raw)
        .filter_map(|cap| cap.get(2).map(|m| m.as_str().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_from_metadata() {
        let names = parse_names("{0: 'screw', 1: 'hex nut', 2: \"washer (m6)\"}");
        assert_eq!(names, vec!["screw", "hex nut", "washer (m6)"]);
        assert!(parse_names("{}").is_empty());
    }
}
