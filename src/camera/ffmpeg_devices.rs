// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Windows (dshow) / macOS (avfoundation): 通过 FFmpeg 设备列表枚举摄像头

use super::{CameraBackend, CameraControl, CameraDevice, CameraInfo, CaptureInput, NoopControl};
use crate::error::Result;

/// FFmpeg 输入设备格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFormat {
    /// DirectShow, 地址为 `video=<设备名>`
    Dshow,
    /// AVFoundation, 地址为设备索引
    AvFoundation,
}

#[derive(Debug, Clone)]
pub struct FfmpegDevices {
    format: DeviceFormat,
}

impl FfmpegDevices {
    pub fn dshow() -> Self {
        Self {
            format: DeviceFormat::Dshow,
        }
    }

    pub fn avfoundation() -> Self {
        Self {
            format: DeviceFormat::AvFoundation,
        }
    }

    pub fn format(&self) -> DeviceFormat {
        self.format
    }
}

/// 设备名列表 → 设备 (索引为列表位置)
pub fn devices_from_names(names: Vec<String>) -> Vec<CameraDevice> {
    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| CameraDevice {
            index: i as u32,
            device: name.clone(),
            name,
            details: None,
        })
        .collect()
}

impl CameraBackend for FfmpegDevices {
    fn list_devices(&self) -> Result<Vec<CameraDevice>> {
        match ez_ffmpeg::device::get_input_video_devices() {
            Ok(names) => Ok(devices_from_names(names)),
            Err(e) => {
                log::warn!("⚠️ 获取摄像头列表失败: {}", e);
                Ok(Vec::new())
            }
        }
    }

    fn is_working(&self, _device: &CameraDevice) -> bool {
        true
    }

    fn control(&self, _camera: &CameraInfo) -> Box<dyn CameraControl> {
        Box::new(NoopControl)
    }

    fn input(&self, camera: &CameraInfo) -> CaptureInput {
        match self.format {
            DeviceFormat::Dshow => CaptureInput::new("dshow", format!("video={}", camera.device)),
            DeviceFormat::AvFoundation => {
                CaptureInput::new("avfoundation", camera.index.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraConfig;

    #[test]
    fn input_urls() {
        let devices = devices_from_names(vec!["Integrated Camera".into(), "OBS Virtual".into()]);
        assert_eq!(devices[1].index, 1);
        let camera = CameraInfo::new(&devices[0], &CameraConfig::default());

        let input = FfmpegDevices::dshow().input(&camera);
        assert_eq!((input.format.as_str(), input.url.as_str()), ("dshow", "video=Integrated Camera"));

        let input = FfmpegDevices::avfoundation().input(&camera);
        assert_eq!((input.format.as_str(), input.url.as_str()), ("avfoundation", "0"));
    }
}
