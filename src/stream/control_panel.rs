// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use egui_macroquad::egui;

use crate::camera::{CameraManager, CameraProperty};

/// 参数滑条上限
const PROPERTY_MAX: f32 = 255.0;
/// 白平衡色温上限 (K)
const TEMPERATURE_MAX: f32 = 6500.0;

/// 摄像头参数面板状态
pub struct ControlPanel {
    pub visible: bool,
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub exposure: f32,
    pub wb: f32,
    /// 保存后显示的最近一个文件名
    pub last_saved: Option<String>,
}

impl ControlPanel {
    pub fn new(manager: &CameraManager) -> Self {
        let mut panel = Self {
            visible: true,
            brightness: 0.0,
            contrast: 0.0,
            saturation: 0.0,
            exposure: 0.0,
            wb: 0.0,
            last_saved: None,
        };
        panel.sync(manager);
        panel
    }

    /// 用摄像头回读值刷新滑条
    pub fn sync(&mut self, manager: &CameraManager) {
        self.brightness = manager.brightness();
        self.contrast = manager.contrast();
        self.saturation = manager.saturation();
        self.exposure = manager.exposure();
        self.wb = manager.wb();
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    /// 绘制面板, 返回本帧被拖动的参数
    pub fn show(
        &mut self,
        ctx: &egui::Context,
        title: &str,
        saved: usize,
    ) -> Vec<(CameraProperty, f32)> {
        let mut changes = Vec::new();
        if !self.visible {
            return changes;
        }
        egui::Window::new(format!("🎛️ {}", title))
            .default_pos(egui::pos2(10.0, 10.0))
            .resizable(false)
            .show(ctx, |ui| {
                let sliders = [
                    (CameraProperty::Brightness, &mut self.brightness, "亮度", PROPERTY_MAX),
                    (CameraProperty::Contrast, &mut self.contrast, "对比度", PROPERTY_MAX),
                    (CameraProperty::Saturation, &mut self.saturation, "饱和度", PROPERTY_MAX),
                    (CameraProperty::Exposure, &mut self.exposure, "曝光", PROPERTY_MAX),
                    (CameraProperty::WhiteBalance, &mut self.wb, "色温", TEMPERATURE_MAX),
                ];
                for (prop, value, label, max) in sliders {
                    if ui
                        .add(egui::Slider::new(&mut *value, 0.0..=max).step_by(1.0).text(label))
                        .changed()
                    {
                        changes.push((prop, *value));
                    }
                }

                ui.separator();
                ui.label(format!("已保存: {}", saved));
                if let Some(name) = &self.last_saved {
                    ui.label(name);
                }
                ui.label("Space/Enter 保存 | 1-9 保存到子目录 | Tab 面板 | Esc 退出");
            });
        changes
    }
}
