// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Linux: 通过 `v4l2-ctl` 枚举设备与读写参数

use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    CameraBackend, CameraControl, CameraDetails, CameraDevice, CameraInfo, CameraProperty,
    CaptureInput, DetailSection,
};
use crate::error::{Error, Result};
use crate::utils::{run_command, try_command};

const V4L2_CTL: &str = "v4l2-ctl";

static VIDEO_NODE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^/dev/video(\d+)$").ok());
static CTRL_VALUE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\s*(\w+)\s*:\s*(-?\d+)").ok());

/// 解析 `v4l2-ctl --list-devices`
///
/// ```text
/// HD Webcam: HD Webcam (usb-0000:00:14.0-5):
///         /dev/video0
///         /dev/video1
///         /dev/media0
/// ```
pub fn parse_device_list(output: &str) -> Vec<CameraDevice> {
    let mut devices = Vec::new();
    let mut name: Option<String> = None;
    for line in output.lines() {
        if line.trim().is_empty() {
            name = None;
            continue;
        }
        if !line.starts_with(char::is_whitespace) {
            let header = line.trim().trim_end_matches(':');
            // 去掉末尾的 " (bus info)"
            let header = match header.rfind(" (") {
                Some(pos) if header.ends_with(')') => &header[..pos],
                _ => header,
            };
            name = Some(header.to_string());
            continue;
        }
        let node = line.trim();
        let Some(caps) = VIDEO_NODE.as_ref().and_then(|re| re.captures(node)) else {
            continue;
        };
        let Ok(index) = caps[1].parse::<u32>() else {
            continue;
        };
        devices.push(CameraDevice {
            index,
            name: name.clone().unwrap_or_else(|| node.to_string()),
            device: node.to_string(),
            details: None,
        });
    }
    devices
}

/// 解析 `v4l2-ctl --device=<dev> -D`
///
/// 顶格的 `Section:` 行开始新段落, 含冒号的缩进行是键值,
/// 其余缩进行是上一个键的标志
pub fn parse_device_details(output: &str) -> CameraDetails {
    let mut details = CameraDetails::default();
    let mut section = String::new();
    let mut key: Option<String> = None;
    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if !line.starts_with(char::is_whitespace) {
            section = line.trim().trim_end_matches(':').trim().to_string();
            details.sections.entry(section.clone()).or_default();
            key = None;
            continue;
        }
        let entry: &mut DetailSection = details.sections.entry(section.clone()).or_default();
        match line.split_once(':') {
            Some((k, v)) => {
                let k = k.trim().to_string();
                entry.values.insert(k.clone(), v.trim().to_string());
                key = Some(k);
            }
            None => {
                if let Some(k) = &key {
                    entry
                        .flags
                        .entry(k.clone())
                        .or_default()
                        .push(line.trim().to_string());
                }
            }
        }
    }
    details
}

/// 当前与旧版内核的控件名
pub fn control_names(prop: CameraProperty) -> &'static [&'static str] {
    match prop {
        CameraProperty::Brightness => &["brightness"],
        CameraProperty::Contrast => &["contrast"],
        CameraProperty::Saturation => &["saturation"],
        CameraProperty::Exposure => &["exposure_time_absolute", "exposure_absolute"],
        CameraProperty::AutoExposure => &["auto_exposure", "exposure_auto"],
        CameraProperty::WhiteBalance => &["white_balance_temperature"],
        CameraProperty::AutoWhiteBalance => {
            &["white_balance_automatic", "white_balance_temperature_auto"]
        }
    }
}

/// 解析 `--get-ctrl` 输出, 如 `brightness: 128`
pub fn parse_ctrl_value(output: &str) -> Option<f32> {
    let caps = CTRL_VALUE.as_ref()?.captures(output)?;
    caps[2].parse::<f32>().ok()
}

/// `v4l2-ctl` 设备枚举
#[derive(Debug, Clone, Default)]
pub struct V4l2Backend {
    name_filter: Option<String>,
}

impl V4l2Backend {
    pub fn new(name_filter: Option<String>) -> Self {
        Self { name_filter }
    }

    fn matches_filter(&self, name: &str) -> bool {
        match &self.name_filter {
            Some(filter) => name.to_lowercase().contains(&filter.to_lowercase()),
            None => true,
        }
    }

    pub fn device_details(device: &str) -> Result<CameraDetails> {
        let output = run_command(V4L2_CTL, &[format!("--device={}", device), "-D".to_string()])?;
        Ok(parse_device_details(&output))
    }
}

impl CameraBackend for V4l2Backend {
    fn list_devices(&self) -> Result<Vec<CameraDevice>> {
        let output = run_command(V4L2_CTL, &["--list-devices"])?;
        let devices = parse_device_list(&output)
            .into_iter()
            .filter(|d| self.matches_filter(&d.name))
            .map(|mut d| {
                d.details = Self::device_details(&d.device).ok();
                d
            })
            .collect();
        Ok(devices)
    }

    fn is_working(&self, device: &CameraDevice) -> bool {
        device
            .details
            .as_ref()
            .map(CameraDetails::is_capture_device)
            .unwrap_or(false)
    }

    fn control(&self, camera: &CameraInfo) -> Box<dyn CameraControl> {
        Box::new(V4l2Control::new(camera.device.clone()))
    }

    fn input(&self, camera: &CameraInfo) -> CaptureInput {
        CaptureInput::new("v4l2", camera.device.clone())
    }
}

/// `v4l2-ctl --get-ctrl / --set-ctrl`
#[derive(Debug, Clone)]
pub struct V4l2Control {
    device: String,
}

impl V4l2Control {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }

    fn device_arg(&self) -> String {
        format!("--device={}", self.device)
    }
}

impl CameraControl for V4l2Control {
    fn get(&self, prop: CameraProperty) -> Result<f32> {
        let mut last_err = None;
        for name in control_names(prop) {
            match try_command(V4L2_CTL, &[self.device_arg(), format!("--get-ctrl={}", name)]) {
                Ok(output) => {
                    return parse_ctrl_value(&output).ok_or_else(|| {
                        Error::Parse(format!("unexpected v4l2-ctl output \"{}\"", output.trim()))
                            .logged()
                    })
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| Error::Unsupported(prop.to_string()))
            .logged())
    }

    fn set(&self, prop: CameraProperty, value: f32) -> Result<()> {
        let mut last_err = None;
        for name in control_names(prop) {
            let arg = format!("--set-ctrl={}={}", name, value.round() as i64);
            match try_command(V4L2_CTL, &[self.device_arg(), arg]) {
                Ok(_) => {
                    log::debug!("🎛️ {} {} = {}", self.device, name, value);
                    return Ok(());
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| Error::Unsupported(prop.to_string()))
            .logged())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_DEVICES: &str = "\
HD Webcam: HD Webcam (usb-0000:00:14.0-5):
\t/dev/video0
\t/dev/video1
\t/dev/media0

USB Camera (usb-0000:00:14.0-2):
\t/dev/video2
\t/dev/video3
";

    const DETAILS: &str = "\
Driver Info:
\tDriver name      : uvcvideo
\tCard type        : HD Webcam: HD Webcam
\tBus info         : usb-0000:00:14.0-5
\tCapabilities     : 0x84a00001
\t\tVideo Capture
\t\tMetadata Capture
\t\tStreaming
\tDevice Caps      : 0x04200001
\t\tVideo Capture
\t\tStreaming
Media Driver Info:
\tDriver name      : uvcvideo
\tModel            : HD Webcam: HD Webcam
";

    const METADATA_NODE: &str = "\
Driver Info:
\tDriver name      : uvcvideo
\tCapabilities     : 0x84a00001
\t\tVideo Capture
\t\tMetadata Capture
\tDevice Caps      : 0x04a00000
\t\tMetadata Capture
\t\tStreaming
";

    #[test]
    fn device_list_blocks() {
        let devices = parse_device_list(LIST_DEVICES);
        let summary: Vec<(u32, &str, &str)> = devices
            .iter()
            .map(|d| (d.index, d.name.as_str(), d.device.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (0, "HD Webcam: HD Webcam", "/dev/video0"),
                (1, "HD Webcam: HD Webcam", "/dev/video1"),
                (2, "USB Camera", "/dev/video2"),
                (3, "USB Camera", "/dev/video3"),
            ]
        );
    }

    #[test]
    fn details_sections_and_flags() {
        let details = parse_device_details(DETAILS);
        assert_eq!(details.get("Driver Info", "Driver name"), Some("uvcvideo"));
        assert_eq!(details.get("Driver Info", "Card type"), Some("HD Webcam: HD Webcam"));
        assert_eq!(details.get("Media Driver Info", "Model"), Some("HD Webcam: HD Webcam"));
        assert_eq!(details.device_caps(), &["Video Capture", "Streaming"]);
        assert!(details.is_capture_device());
    }

    #[test]
    fn metadata_node_is_not_a_camera() {
        let details = parse_device_details(METADATA_NODE);
        assert!(!details.is_capture_device());
        assert!(!parse_device_details("").is_capture_device());
    }

    #[test]
    fn name_filter_is_case_insensitive() {
        let backend = V4l2Backend::new(Some("usb".into()));
        assert!(backend.matches_filter("USB Camera"));
        assert!(!backend.matches_filter("HD Webcam"));
        assert!(V4l2Backend::default().matches_filter("anything"));
    }

    #[test]
    fn ctrl_values() {
        assert_eq!(parse_ctrl_value("brightness: 128\n"), Some(128.0));
        assert_eq!(parse_ctrl_value("exposure_time_absolute: -3"), Some(-3.0));
        assert_eq!(parse_ctrl_value("garbage"), None);
        assert_eq!(
            control_names(CameraProperty::AutoWhiteBalance),
            &["white_balance_automatic", "white_balance_temperature_auto"]
        );
    }
}
