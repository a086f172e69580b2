// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 错误类型 (Error types)

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("\"{0}\" does not exist")]
    NotADirectory(PathBuf),

    #[error("{path} structure error. The directory must contain \"{pt}\" and \"metadata.yaml\"")]
    ModelStructure { path: PathBuf, pt: String },

    #[error("cameras not found")]
    CameraNotFound,

    #[error("no camera for index {0} was found")]
    InvalidCameraIndex(u32),

    #[error("can't connect to the camera \"{0}\"")]
    CameraConnection(String),

    #[error("can't read frame from camera \"{0}\"")]
    FrameRead(String),

    #[error("failed to save image to \"{0}\"")]
    ImageWrite(PathBuf),

    #[error("\"{program} {args}\" failed ({status}): {stderr}")]
    Command {
        program: String,
        args: String,
        status: String,
        stderr: String,
    },

    #[error("invalid split ratio: {0}")]
    SplitRatio(String),

    #[error("unknown filter \"{0}\"")]
    UnknownFilter(String),

    #[error("{0} is not supported on this platform")]
    Unsupported(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("resize error: {0}")]
    Resize(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("ONNX Runtime error: {0}")]
    Ort(#[from] ort::Error),

    #[error("tensor shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl Error {
    /// 记录错误日志并返回自身, 用法: `return Err(Error::X.logged())`
    pub fn logged(self) -> Self {
        log::error!("❌ {}", self);
        self
    }
}
