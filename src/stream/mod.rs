// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 实时画面 (Live Stream)
///
/// macroquad 窗口显示 [最新帧, 显示滤镜输出..., 模型结果] 网格,
/// egui 面板调整摄像头参数
///
/// ## 按键
/// - `Esc`: 写入元数据并退出
/// - `Space` / `Enter`: 保存最新帧
/// - `1`-`9`: 保存到对应子目录
/// - `Tab`: 显示/隐藏参数面板
pub mod control_panel;

use std::cell::RefCell;
use std::rc::Rc;

use egui_macroquad::egui;
use image::{DynamicImage, RgbImage};
use macroquad::prelude::*;

use crate::camera::CameraManager;
use crate::error::{Error, Result};
use crate::imaging::images_grid;

pub use control_panel::ControlPanel;

/// 窗口最大尺寸, 网格更大时等比缩小
const MAX_WINDOW: (f32, f32) = (1920.0, 1080.0);

/// 按键对应的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Exit,
    Save,
    SaveTo(u8),
    TogglePanel,
}

impl KeyAction {
    pub fn from_key(key: KeyCode) -> Option<Self> {
        match key {
            KeyCode::Escape => Some(KeyAction::Exit),
            KeyCode::Space | KeyCode::Enter | KeyCode::KpEnter => Some(KeyAction::Save),
            KeyCode::Tab => Some(KeyAction::TogglePanel),
            KeyCode::Key1 | KeyCode::Kp1 => Some(KeyAction::SaveTo(1)),
            KeyCode::Key2 | KeyCode::Kp2 => Some(KeyAction::SaveTo(2)),
            KeyCode::Key3 | KeyCode::Kp3 => Some(KeyAction::SaveTo(3)),
            KeyCode::Key4 | KeyCode::Kp4 => Some(KeyAction::SaveTo(4)),
            KeyCode::Key5 | KeyCode::Kp5 => Some(KeyAction::SaveTo(5)),
            KeyCode::Key6 | KeyCode::Kp6 => Some(KeyAction::SaveTo(6)),
            KeyCode::Key7 | KeyCode::Kp7 => Some(KeyAction::SaveTo(7)),
            KeyCode::Key8 | KeyCode::Kp8 => Some(KeyAction::SaveTo(8)),
            KeyCode::Key9 | KeyCode::Kp9 => Some(KeyAction::SaveTo(9)),
            _ => None,
        }
    }
}

/// 等比缩小到 `max` 以内
pub fn fit_window(width: u32, height: u32, max: (f32, f32)) -> (f32, f32) {
    let (w, h) = (width.max(1) as f32, height.max(1) as f32);
    let scale = (max.0 / w).min(max.1 / h).min(1.0);
    (w * scale, h * scale)
}

pub struct VideoStream {
    manager: CameraManager,
    panel: ControlPanel,
    texture: Option<Texture2D>,
    window_size: Option<(u32, u32)>,
}

impl VideoStream {
    pub fn new(manager: CameraManager) -> Self {
        let panel = ControlPanel::new(&manager);
        Self {
            manager,
            panel,
            texture: None,
            window_size: None,
        }
    }

    /// 打开窗口并运行到退出, 循环中的错误在窗口关闭后返回
    pub fn run(self) -> Result<()> {
        let camera = self.manager.camera();
        let (w, h) = fit_window(camera.width.max(640), camera.height.max(480), MAX_WINDOW);
        let conf = macroquad::window::Conf {
            window_title: camera.name.clone(),
            window_width: w as i32,
            window_height: h as i32,
            ..Default::default()
        };

        let outcome: Rc<RefCell<Option<Error>>> = Rc::new(RefCell::new(None));
        let slot = outcome.clone();
        let mut stream = self;
        macroquad::Window::from_config(conf, async move {
            if let Err(e) = stream.main_loop().await {
                *slot.borrow_mut() = Some(e);
            }
        });
        let result = outcome.borrow_mut().take();
        match result {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn main_loop(&mut self) -> Result<()> {
        self.manager.apply_all()?;
        self.panel.sync(&self.manager);
        prevent_quit();
        log::debug!("▶️ 开始实时画面");

        while self.manager.is_running() {
            if is_quit_requested() {
                self.manager.exit()?;
                break;
            }
            self.manager.capture_frame()?;
            let frames = self.manager.frames_for_display()?;
            let grid = images_grid(&frames)?;
            self.resize_window(&grid);
            self.update_texture(grid);

            self.draw();
            self.draw_egui()?;
            self.handle_input()?;
            next_frame().await;
        }
        Ok(())
    }

    /// 网格尺寸变化时调整窗口
    fn resize_window(&mut self, grid: &RgbImage) {
        let size = grid.dimensions();
        if self.window_size != Some(size) {
            let (w, h) = fit_window(size.0, size.1, MAX_WINDOW);
            request_new_screen_size(w, h);
            self.window_size = Some(size);
        }
    }

    fn update_texture(&mut self, grid: RgbImage) {
        let (width, height) = grid.dimensions();
        let rgba = DynamicImage::ImageRgb8(grid).to_rgba8().into_raw();
        // 只在分辨率变化时重建纹理, 否则更新像素数据
        let needs_rebuild = match &self.texture {
            Some(tex) => tex.width() != width as f32 || tex.height() != height as f32,
            None => true,
        };
        if needs_rebuild {
            let texture = Texture2D::from_rgba8(width as u16, height as u16, &rgba);
            texture.set_filter(FilterMode::Linear);
            self.texture = Some(texture);
        } else if let Some(tex) = &self.texture {
            tex.update(&Image {
                bytes: rgba,
                width: width as u16,
                height: height as u16,
            });
        }
    }

    fn draw(&self) {
        clear_background(BLACK);
        if let Some(texture) = &self.texture {
            draw_texture_ex(
                texture,
                0.0,
                0.0,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(vec2(screen_width(), screen_height())),
                    ..Default::default()
                },
            );
        }
    }

    fn draw_egui(&mut self) -> Result<()> {
        let title = self.manager.camera().name.clone();
        let saved = self.manager.saved_count();
        let mut changes = Vec::new();
        egui_macroquad::ui(|ctx: &egui::Context| {
            changes = self.panel.show(ctx, &title, saved);
        });
        egui_macroquad::draw();

        if !changes.is_empty() {
            for (prop, value) in changes {
                self.manager.set_property(prop, value)?;
            }
            self.panel.sync(&self.manager);
        }
        Ok(())
    }

    fn handle_input(&mut self) -> Result<()> {
        for key in get_keys_pressed() {
            match KeyAction::from_key(key) {
                Some(KeyAction::Exit) => {
                    self.manager.exit()?;
                    return Ok(());
                }
                Some(KeyAction::Save) => self.save(None),
                Some(KeyAction::SaveTo(n)) => self.save(Some(n.to_string())),
                Some(KeyAction::TogglePanel) => self.panel.toggle(),
                None => log::debug!("⌨️ 按键: {:?}", key),
            }
        }
        Ok(())
    }

    /// 保存失败只记录, 不中断画面
    fn save(&mut self, subfolder: Option<String>) {
        match self.manager.save_last_frame(subfolder.as_deref()) {
            Ok(path) => {
                self.panel.last_saved = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned());
            }
            Err(e) => log::warn!("⚠️ 保存失败: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_bindings() {
        assert_eq!(KeyAction::from_key(KeyCode::Escape), Some(KeyAction::Exit));
        assert_eq!(KeyAction::from_key(KeyCode::Space), Some(KeyAction::Save));
        assert_eq!(KeyAction::from_key(KeyCode::Enter), Some(KeyAction::Save));
        assert_eq!(KeyAction::from_key(KeyCode::Key3), Some(KeyAction::SaveTo(3)));
        assert_eq!(KeyAction::from_key(KeyCode::Kp9), Some(KeyAction::SaveTo(9)));
        assert_eq!(KeyAction::from_key(KeyCode::Tab), Some(KeyAction::TogglePanel));
        assert_eq!(KeyAction::from_key(KeyCode::Key0), None);
        assert_eq!(KeyAction::from_key(KeyCode::A), None);
    }

    #[test]
    fn window_fits_screen() {
        assert_eq!(fit_window(1280, 720, MAX_WINDOW), (1280.0, 720.0));
        assert_eq!(fit_window(3840, 1080, MAX_WINDOW), (1920.0, 540.0));
        assert_eq!(fit_window(0, 0, (100.0, 100.0)), (1.0, 1.0));
    }
}
