// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 摄像头 (Camera)
///
/// ## 组成
/// - **CameraBackend**: 按平台枚举设备 (Linux: `v4l2-ctl`, Windows/macOS: FFmpeg 设备列表)
/// - **CameraControl**: 读写亮度、对比度等参数
/// - **FrameSource**: FFmpeg 采集线程, 只保留最新帧 (`capture.rs`)
/// - **CameraManager**: 采集会话, 保存图像与元数据 (`manager.rs`)
///
/// ```text
/// platform_backend → get_cameras → select_camera → CameraManager
///                                                    ├─ FrameSource (worker)
///                                                    └─ CameraControl
/// ```
use std::collections::BTreeMap;
use std::fmt;
use std::io::BufRead;

use serde::Serialize;

use crate::config::CameraConfig;
use crate::error::{Error, Result};

pub mod capture;
pub mod ffmpeg_devices;
pub mod linux;
pub mod manager;

pub use capture::{CaptureInput, FrameSource};
pub use ffmpeg_devices::FfmpegDevices;
pub use linux::{V4l2Backend, V4l2Control};
pub use manager::{camera_manager_factory, CameraManager};

/// 平台枚举得到的设备
#[derive(Debug, Clone, PartialEq)]
pub struct CameraDevice {
    pub index: u32,
    pub name: String,
    /// `/dev/videoN` 或 dshow 设备名
    pub device: String,
    pub details: Option<CameraDetails>,
}

/// `v4l2-ctl -D` 中的一个段落
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailSection {
    pub values: BTreeMap<String, String>,
    /// 键下方缩进的标志行, 如 `Device Caps` 下的 `Video Capture`
    pub flags: BTreeMap<String, Vec<String>>,
}

/// 设备详情, 按段落名索引
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraDetails {
    pub sections: BTreeMap<String, DetailSection>,
}

impl CameraDetails {
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|s| s.values.get(key))
            .map(String::as_str)
    }

    /// `Device Caps` 标志, 缺失时退回 `Capabilities`
    pub fn device_caps(&self) -> &[String] {
        let Some(section) = self.sections.get("Driver Info") else {
            return &[];
        };
        section
            .flags
            .get("Device Caps")
            .or_else(|| section.flags.get("Capabilities"))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_capture_device(&self) -> bool {
        self.device_caps().iter().any(|c| c == "Video Capture")
    }
}

/// 选中摄像头的当前状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraInfo {
    pub index: u32,
    pub name: String,
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub exposure: f32,
    pub wb: f32,
}

impl CameraInfo {
    /// 新枚举的摄像头: 分辨率未知 (0), 参数取配置默认值
    pub fn new(device: &CameraDevice, config: &CameraConfig) -> Self {
        Self {
            index: device.index,
            name: device.name.clone(),
            device: device.device.clone(),
            width: 0,
            height: 0,
            brightness: config.brightness,
            contrast: config.contrast,
            saturation: config.saturation,
            exposure: config.exposure,
            wb: config.wb,
        }
    }
}

impl fmt::Display for CameraInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.index, self.name, self.device)
    }
}

/// 可调的摄像头参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraProperty {
    Brightness,
    Contrast,
    Saturation,
    Exposure,
    AutoExposure,
    WhiteBalance,
    AutoWhiteBalance,
}

impl CameraProperty {
    pub const ALL: [CameraProperty; 7] = [
        CameraProperty::Brightness,
        CameraProperty::Contrast,
        CameraProperty::Saturation,
        CameraProperty::Exposure,
        CameraProperty::AutoExposure,
        CameraProperty::WhiteBalance,
        CameraProperty::AutoWhiteBalance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CameraProperty::Brightness => "brightness",
            CameraProperty::Contrast => "contrast",
            CameraProperty::Saturation => "saturation",
            CameraProperty::Exposure => "exposure",
            CameraProperty::AutoExposure => "auto_exposure",
            CameraProperty::WhiteBalance => "wb",
            CameraProperty::AutoWhiteBalance => "auto_wb",
        }
    }
}

impl fmt::Display for CameraProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 参数读写
pub trait CameraControl {
    fn get(&self, prop: CameraProperty) -> Result<f32>;
    fn set(&self, prop: CameraProperty, value: f32) -> Result<()>;
}

/// 不支持参数控制的平台
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopControl;

impl CameraControl for NoopControl {
    fn get(&self, prop: CameraProperty) -> Result<f32> {
        Err(Error::Unsupported(format!("reading \"{}\"", prop)))
    }

    fn set(&self, prop: CameraProperty, _value: f32) -> Result<()> {
        Err(Error::Unsupported(format!("setting \"{}\"", prop)))
    }
}

/// 平台相关的设备枚举与打开方式
pub trait CameraBackend {
    fn list_devices(&self) -> Result<Vec<CameraDevice>>;

    /// 设备能否采集视频
    fn is_working(&self, device: &CameraDevice) -> bool;

    fn control(&self, camera: &CameraInfo) -> Box<dyn CameraControl>;

    /// FFmpeg 输入格式与地址
    fn input(&self, camera: &CameraInfo) -> CaptureInput;
}

/// 按当前操作系统选择后端
pub fn platform_backend(config: &CameraConfig) -> Result<Box<dyn CameraBackend>> {
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(V4l2Backend::new(config.name_filter.clone())))
    }
    #[cfg(target_os = "windows")]
    {
        let _ = config;
        Ok(Box::new(FfmpegDevices::dshow()))
    }
    #[cfg(target_os = "macos")]
    {
        let _ = config;
        Ok(Box::new(FfmpegDevices::avfoundation()))
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        let _ = config;
        Err(Error::Unsupported("camera capture".into()).logged())
    }
}

/// 可用摄像头: index → CameraInfo, 只探测 `0..max_to_check`
///
/// 没有可用设备时返回 `CameraNotFound`
pub fn get_cameras(
    backend: &dyn CameraBackend,
    config: &CameraConfig,
) -> Result<BTreeMap<u32, CameraInfo>> {
    let devices = backend.list_devices()?;
    let cameras: BTreeMap<u32, CameraInfo> =
        detect_working_cameras(backend, &devices, config.max_to_check)
            .into_iter()
            .filter_map(|index| devices.iter().find(|d| d.index == index))
            .map(|d| (d.index, CameraInfo::new(d, config)))
            .collect();
    if cameras.is_empty() {
        return Err(Error::CameraNotFound.logged());
    }
    log::debug!("📷 找到 {} 个摄像头", cameras.len());
    Ok(cameras)
}

/// `devices` 中存在索引为 `index` 且能采集的设备
pub fn camera_exists(backend: &dyn CameraBackend, devices: &[CameraDevice], index: u32) -> bool {
    devices
        .iter()
        .any(|d| d.index == index && backend.is_working(d))
}

/// 检查 `0..max_to_check` 中可用的索引
pub fn detect_working_cameras(
    backend: &dyn CameraBackend,
    devices: &[CameraDevice],
    max_to_check: u32,
) -> Vec<u32> {
    (0..max_to_check)
        .filter(|i| camera_exists(backend, devices, *i))
        .collect()
}

/// 选择摄像头: 指定索引直接查找, 否则列出后从输入读取
pub fn select_camera(
    cameras: &BTreeMap<u32, CameraInfo>,
    id: Option<u32>,
    mut input: impl BufRead,
) -> Result<CameraInfo> {
    let id = match id {
        Some(id) => id,
        None => {
            println!("📷 可用摄像头:");
            for camera in cameras.values() {
                println!("   {}", camera);
            }
            println!("请输入摄像头索引:");
            let mut line = String::new();
            input.read_line(&mut line)?;
            line.trim()
                .parse::<u32>()
                .map_err(|_| Error::Parse(format!("invalid camera index \"{}\"", line.trim())).logged())?
        }
    };
    let camera = cameras
        .get(&id)
        .cloned()
        .ok_or_else(|| Error::InvalidCameraIndex(id).logged())?;
    log::info!("✅ 已选择摄像头 {}", camera);
    Ok(camera)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeBackend(Vec<CameraDevice>);

    impl CameraBackend for FakeBackend {
        fn list_devices(&self) -> Result<Vec<CameraDevice>> {
            Ok(self.0.clone())
        }

        fn is_working(&self, device: &CameraDevice) -> bool {
            device.name != "broken"
        }

        fn control(&self, _camera: &CameraInfo) -> Box<dyn CameraControl> {
            Box::new(NoopControl)
        }

        fn input(&self, camera: &CameraInfo) -> CaptureInput {
            CaptureInput::new("v4l2", camera.device.clone())
        }
    }

    fn device(index: u32, name: &str) -> CameraDevice {
        CameraDevice {
            index,
            name: name.into(),
            device: format!("/dev/video{}", index),
            details: None,
        }
    }

    #[test]
    fn only_working_cameras_are_listed() {
        let backend = FakeBackend(vec![device(0, "webcam"), device(2, "broken"), device(4, "usb")]);
        let config = CameraConfig::default();
        let cameras = get_cameras(&backend, &config).unwrap();
        assert_eq!(cameras.keys().copied().collect::<Vec<_>>(), vec![0, 4]);
        assert_eq!(cameras[&4].width, 0);
        assert_eq!(cameras[&4].brightness, config.brightness);

        let devices = backend.list_devices().unwrap();
        assert!(camera_exists(&backend, &devices, 0));
        assert!(!camera_exists(&backend, &devices, 2));
        assert_eq!(detect_working_cameras(&backend, &devices, 3), vec![0]);
    }

    #[test]
    fn indices_beyond_max_to_check_are_skipped() {
        let backend = FakeBackend(vec![device(0, "webcam"), device(7, "usb")]);
        let config = CameraConfig {
            max_to_check: 5,
            ..Default::default()
        };
        let cameras = get_cameras(&backend, &config).unwrap();
        assert_eq!(cameras.keys().copied().collect::<Vec<_>>(), vec![0]);

        let config = CameraConfig {
            max_to_check: 8,
            ..Default::default()
        };
        assert_eq!(get_cameras(&backend, &config).unwrap().len(), 2);

        let only_high = FakeBackend(vec![device(7, "usb")]);
        assert!(matches!(
            get_cameras(&only_high, &CameraConfig::default()),
            Err(Error::CameraNotFound)
        ));
    }

    #[test]
    fn no_cameras_is_an_error() {
        let backend = FakeBackend(vec![device(0, "broken")]);
        assert!(matches!(
            get_cameras(&backend, &CameraConfig::default()),
            Err(Error::CameraNotFound)
        ));
    }

    #[test]
    fn select_by_id_or_prompt() {
        let backend = FakeBackend(vec![device(0, "webcam"), device(1, "usb")]);
        let cameras = get_cameras(&backend, &CameraConfig::default()).unwrap();

        assert_eq!(select_camera(&cameras, Some(1), &b""[..]).unwrap().name, "usb");
        assert!(matches!(
            select_camera(&cameras, Some(7), &b""[..]),
            Err(Error::InvalidCameraIndex(7))
        ));
        assert_eq!(select_camera(&cameras, None, &b"0\n"[..]).unwrap().name, "webcam");
        assert!(matches!(
            select_camera(&cameras, None, &b"abc\n"[..]),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn noop_control_is_unsupported() {
        assert!(matches!(
            NoopControl.set(CameraProperty::Brightness, 10.0),
            Err(Error::Unsupported(_))
        ));
    }
}
