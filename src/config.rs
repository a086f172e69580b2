// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 应用配置 - 通过TOML文件调整参数, 路径通过环境变量覆盖

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::Result;

static CONFIG: OnceCell<AppConfig> = OnceCell::new();
static PATHS: OnceCell<Paths> = OnceCell::new();

/// 环境变量名
pub struct EnvVars;

impl EnvVars {
    pub const APP_PATH: &'static str = "YMM_APP_PATH";
    pub const CONFIG: &'static str = "YMM_CONFIG";
    pub const IMAGES_PATH: &'static str = "IMAGES_PATH";
    pub const MODELS_PATH: &'static str = "MODELS_PATH";
    pub const DATASETS_PATH: &'static str = "DATASETS_PATH";
    pub const LOGGING_LVL: &'static str = "LOGGING_LVL";
    pub const ULTRALYTICS_LOGGING_LVL: &'static str = "ULTRALYTICS_LOGGING_LVL";
    pub const YOLO_BIN: &'static str = "YOLO_BIN";
}

/// 摄像头默认参数
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub exposure: f32,
    pub wb: f32,         // 白平衡色温
    pub auto_exposure: f32,
    pub auto_wb: f32,
    pub max_to_check: u32, // 探测的最大设备索引
    pub name_filter: Option<String>,
    pub framerate: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            brightness: 128.0,
            contrast: 128.0,
            saturation: 128.0,
            exposure: 156.0,
            wb: 4600.0,
            auto_exposure: 1.0,
            auto_wb: 0.0,
            max_to_check: 5,
            name_filter: None,
            framerate: 30,
        }
    }
}

/// 检测结果绘制与过滤参数
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResultConfig {
    pub x_tolerance: i32, // 距图像左右边缘小于该值的框视为不完整
    pub y_tolerance: i32, // 距图像上下边缘小于该值的框视为不完整
    pub border_thickness: u32,
    pub font_scale: f32, // 1.0 ≈ 30px
    pub text_thickness: u32, // 标签文字线宽 (px)
    pub center_thickness: u32, // 中心点半径
    pub duplicate_distance: f32, // 中心点距离小于等于该值视为重复框
}

impl Default for ResultConfig {
    fn default() -> Self {
        Self {
            x_tolerance: 5,
            y_tolerance: 5,
            border_thickness: 2,
            font_scale: 0.5,
            text_thickness: 1,
            center_thickness: 10,
            duplicate_distance: 20.0,
        }
    }
}

/// 模型输入与推理参数
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub yolo_image_input_width: u32,
    pub yolo_image_input_height: u32,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub result: ResultConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            yolo_image_input_width: 640,
            yolo_image_input_height: 640,
            conf_threshold: 0.25,
            iou_threshold: 0.45,
            result: ResultConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub model: ModelConfig,
}

impl AppConfig {
    /// 从TOML文件加载配置, 文件不存在时使用默认值
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!("⚠️ 配置文件 {} 不存在, 使用默认值", path.display());
                Ok(Self::default())
            }
            Err(e) => {
                log::error!("❌ 无法读取配置文件 {}: {}", path.display(), e);
                Err(e.into())
            }
            Ok(content) => {
                let config: AppConfig = toml::from_str(&content).map_err(|e| {
                    log::error!("❌ 配置文件解析失败: {}: {}", path.display(), e);
                    e
                })?;
                log::debug!("✅ 配置已从 {} 加载", path.display());
                Ok(config)
            }
        }
    }

    /// 保存配置到TOML文件
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Parse(e.to_string()))?;
        fs::write(path, content)?;
        log::info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        log::info!(
            "🎛️ 摄像头: brightness={} contrast={} saturation={} exposure={} wb={}",
            self.camera.brightness,
            self.camera.contrast,
            self.camera.saturation,
            self.camera.exposure,
            self.camera.wb,
        );
        log::info!(
            "🎛️ 模型输入: {}x{} conf={:.2} iou={:.2} 去重距离={}px",
            self.model.yolo_image_input_width,
            self.model.yolo_image_input_height,
            self.model.conf_threshold,
            self.model.iou_threshold,
            self.model.result.duplicate_distance,
        );
    }
}

/// 进程级配置: 首次访问时从 `Paths::config_file` 加载, 之后只读
pub fn global() -> &'static AppConfig {
    CONFIG.get_or_init(|| {
        AppConfig::load(&paths().config_file).unwrap_or_else(|e| {
            log::warn!("⚠️ 配置加载失败, 使用默认值: {}", e);
            AppConfig::default()
        })
    })
}

/// 在首次访问前设置进程级配置, 已设置时返回 false
pub fn set_global(config: AppConfig) -> bool {
    CONFIG.set(config).is_ok()
}

/// 进程级路径 (环境变量覆盖)
pub fn paths() -> &'static Paths {
    PATHS.get_or_init(Paths::from_env)
}

/// 加载 `.env` 文件, 已存在的环境变量保持不变
///
/// 返回是否加载了文件; 文件不存在不算错误
pub fn load_dotenv(path: &Path) -> bool {
    match dotenvy::from_path(path) {
        Ok(()) => {
            log::debug!("✅ 环境变量已从 {} 加载", path.display());
            true
        }
        Err(e) if e.not_found() => false,
        Err(e) => {
            log::warn!("⚠️ 无法加载 {}: {}", path.display(), e);
            false
        }
    }
}

/// 项目路径
#[derive(Clone, Debug, PartialEq)]
pub struct Paths {
    pub app: PathBuf,
    pub dist: PathBuf,
    pub config_file: PathBuf,
    pub images: PathBuf,
    pub models: PathBuf,
    pub datasets: PathBuf,
}

impl Paths {
    /// 以 `app` 为根目录的默认路径 (不读取环境变量)
    pub fn under(app: impl Into<PathBuf>) -> Self {
        let app = app.into();
        let dist = app.join("dist");
        Self {
            config_file: dist.join("config").join("config.toml"),
            images: dist.join("images"),
            models: dist.join("models"),
            datasets: dist.join("datasets"),
            dist,
            app,
        }
    }

    pub fn dotenv_file(&self) -> PathBuf {
        self.dist.join(".env")
    }

    /// 默认路径 + 环境变量覆盖
    ///
    /// 先加载 `<app>/dist/.env` (不覆盖已有变量), 再读取环境变量
    pub fn from_env() -> Self {
        let app = env::var_os(EnvVars::APP_PATH)
            .map(PathBuf::from)
            .or_else(|| env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let mut paths = Self::under(app);
        load_dotenv(&paths.dotenv_file());
        if let Some(p) = env::var_os(EnvVars::CONFIG) {
            paths.config_file = p.into();
        }
        if let Some(p) = env::var_os(EnvVars::IMAGES_PATH) {
            paths.images = p.into();
        }
        if let Some(p) = env::var_os(EnvVars::MODELS_PATH) {
            paths.models = p.into();
        }
        if let Some(p) = env::var_os(EnvVars::DATASETS_PATH) {
            paths.datasets = p.into();
        }
        paths
    }
}
