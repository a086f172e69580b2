// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 采集会话: 摄像头参数、滤镜、图像保存与数据集元数据

use std::io;
use std::path::{Path, PathBuf};

use image::DynamicImage;

use super::{
    get_cameras, platform_backend, select_camera, CameraBackend, CameraControl, CameraInfo,
    CameraProperty, FrameSource,
};
use crate::config::{AppConfig, CameraConfig, ModelConfig};
use crate::error::{Error, Result};
use crate::filesystem::{check_dir_path, save_image, write_dataset_metadata, DatasetMetadata};
use crate::imaging::{apply_filters, Filter};
use crate::model::ModelManager;

pub struct CameraManager {
    camera: CameraInfo,
    control: Box<dyn CameraControl>,
    source: FrameSource,
    camera_config: CameraConfig,
    model_config: ModelConfig,
    show_filters: Vec<Filter>,
    save_filters: Vec<Filter>,
    save_dir: PathBuf,
    model: Option<ModelManager>,
    last_frame: Option<DynamicImage>,
    saved: usize,
    running: bool,
}

impl CameraManager {
    /// 打开摄像头, 保存目录默认为 `IMAGES_PATH`
    pub fn new(
        camera: CameraInfo,
        backend: &dyn CameraBackend,
        config: &AppConfig,
        images_dir: &Path,
    ) -> Result<Self> {
        let source = FrameSource::open(
            camera.name.clone(),
            backend.input(&camera),
            camera.width,
            camera.height,
            config.camera.framerate,
        )?;
        Ok(Self {
            control: backend.control(&camera),
            camera,
            source,
            camera_config: config.camera.clone(),
            model_config: config.model.clone(),
            show_filters: Vec::new(),
            save_filters: Vec::new(),
            save_dir: images_dir.to_path_buf(),
            model: None,
            last_frame: None,
            saved: 0,
            running: true,
        })
    }

    pub fn camera(&self) -> &CameraInfo {
        &self.camera
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// 模型输入尺寸, 用于 RESIZE / CUT 滤镜
    fn filter_size(&self) -> (u32, u32) {
        (
            self.model_config.yolo_image_input_width,
            self.model_config.yolo_image_input_height,
        )
    }

    // ---------------- 参数 ----------------

    /// 写入设备后回读; 平台不支持时保留请求值
    pub fn set_property(&mut self, prop: CameraProperty, value: f32) -> Result<f32> {
        let actual = match self.control.set(prop, value) {
            Ok(()) => self.control.get(prop).unwrap_or(value),
            Err(Error::Unsupported(what)) => {
                log::warn!("⚠️ 当前平台不支持 {}, 保留 {} = {}", what, prop, value);
                value
            }
            Err(e) => return Err(e),
        };
        match prop {
            CameraProperty::Brightness => self.camera.brightness = actual,
            CameraProperty::Contrast => self.camera.contrast = actual,
            CameraProperty::Saturation => self.camera.saturation = actual,
            CameraProperty::Exposure => self.camera.exposure = actual,
            CameraProperty::WhiteBalance => self.camera.wb = actual,
            CameraProperty::AutoExposure | CameraProperty::AutoWhiteBalance => {}
        }
        log::debug!("🎛️ {} = {}", prop, actual);
        Ok(actual)
    }

    pub fn brightness(&self) -> f32 {
        self.camera.brightness
    }

    pub fn set_brightness(&mut self, value: f32) -> Result<f32> {
        self.set_property(CameraProperty::Brightness, value)
    }

    pub fn contrast(&self) -> f32 {
        self.camera.contrast
    }

    pub fn set_contrast(&mut self, value: f32) -> Result<f32> {
        self.set_property(CameraProperty::Contrast, value)
    }

    pub fn saturation(&self) -> f32 {
        self.camera.saturation
    }

    pub fn set_saturation(&mut self, value: f32) -> Result<f32> {
        self.set_property(CameraProperty::Saturation, value)
    }

    pub fn exposure(&self) -> f32 {
        self.camera.exposure
    }

    pub fn set_exposure(&mut self, value: f32) -> Result<f32> {
        self.set_property(CameraProperty::Exposure, value)
    }

    pub fn wb(&self) -> f32 {
        self.camera.wb
    }

    pub fn set_wb(&mut self, value: f32) -> Result<f32> {
        self.set_property(CameraProperty::WhiteBalance, value)
    }

    pub fn set_auto_exposure(&mut self, value: f32) -> Result<f32> {
        self.set_property(CameraProperty::AutoExposure, value)
    }

    pub fn set_auto_wb(&mut self, value: f32) -> Result<f32> {
        self.set_property(CameraProperty::AutoWhiteBalance, value)
    }

    pub fn width(&self) -> u32 {
        self.camera.width
    }

    pub fn height(&self) -> u32 {
        self.camera.height
    }

    /// 以新分辨率重启采集
    pub fn set_resolution(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        if (width, height) != (self.source.width(), self.source.height()) {
            self.source.restart(width, height)?;
        }
        self.camera.width = width;
        self.camera.height = height;
        log::info!("📐 分辨率 {}x{}", width, height);
        Ok(())
    }

    /// 启动时: 自动曝光/白平衡 → 全部参数 → 分辨率
    pub fn apply_all(&mut self) -> Result<()> {
        self.set_auto_exposure(self.camera_config.auto_exposure)?;
        self.set_auto_wb(self.camera_config.auto_wb)?;
        for (prop, value) in [
            (CameraProperty::Brightness, self.camera.brightness),
            (CameraProperty::Contrast, self.camera.contrast),
            (CameraProperty::Saturation, self.camera.saturation),
            (CameraProperty::Exposure, self.camera.exposure),
            (CameraProperty::WhiteBalance, self.camera.wb),
        ] {
            self.set_property(prop, value)?;
        }
        self.set_resolution(self.camera.width, self.camera.height)
    }

    /// 分辨率、参数与保存滤镜取自模型元数据, 缺失的参数使用配置默认值
    pub fn load_params_from_model(&mut self, model: &ModelManager) -> Result<()> {
        let metadata = model.metadata()?.dataset;
        self.save_filters = model.filters().to_vec();
        let defaults = &self.camera_config;
        self.camera.width = metadata.camera_width;
        self.camera.height = metadata.camera_height;
        self.camera.brightness = metadata.brightness.unwrap_or(defaults.brightness);
        self.camera.contrast = metadata.contrast.unwrap_or(defaults.contrast);
        self.camera.saturation = metadata.saturation.unwrap_or(defaults.saturation);
        self.camera.exposure = metadata.exposure.unwrap_or(defaults.exposure);
        self.camera.wb = metadata.wb.unwrap_or(defaults.wb);
        log::info!("📥 已从模型 \"{}\" 加载摄像头参数", model.name());
        Ok(())
    }

    // ---------------- 滤镜与保存 ----------------

    pub fn show_filters(&self) -> &[Filter] {
        &self.show_filters
    }

    pub fn set_show_filters(&mut self, filters: Vec<Filter>) {
        self.show_filters = filters;
    }

    pub fn save_filters(&self) -> &[Filter] {
        &self.save_filters
    }

    pub fn set_save_filters(&mut self, filters: Vec<Filter>) {
        self.save_filters = filters;
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// 设置保存目录 (不存在时创建)
    pub fn set_save_dir(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.save_dir = check_dir_path(path, true)?;
        Ok(())
    }

    pub fn model(&self) -> Option<&ModelManager> {
        self.model.as_ref()
    }

    /// 每帧送入模型推理
    pub fn attach_model(&mut self, model: ModelManager) {
        self.model = Some(model);
    }

    pub fn last_frame(&self) -> Option<&DynamicImage> {
        self.last_frame.as_ref()
    }

    /// 读取最新帧, 有模型时同时推理
    pub fn capture_frame(&mut self) -> Result<&DynamicImage> {
        let frame = DynamicImage::ImageRgb8(self.source.capture_frame()?);
        if self.camera.width == 0 || self.camera.height == 0 {
            self.camera.width = frame.width();
            self.camera.height = frame.height();
            log::debug!("📐 摄像头分辨率 {}x{}", frame.width(), frame.height());
        }
        if let Some(model) = self.model.as_mut() {
            model.process_frame(&frame)?;
        }
        Ok(self.last_frame.insert(frame))
    }

    /// 显示内容: [最新帧, 各显示滤镜输出..., 模型结果]
    pub fn frames_for_display(&self) -> Result<Vec<DynamicImage>> {
        let Some(frame) = &self.last_frame else {
            return Ok(Vec::new());
        };
        let mut frames = vec![frame.clone()];
        for filter in &self.show_filters {
            frames.push(filter.apply(frame, self.filter_size())?);
        }
        if let Some(result) = self
            .model
            .as_ref()
            .map(|m| m.last_result_image(false))
            .transpose()?
            .flatten()
        {
            frames.push(DynamicImage::ImageRgb8(result));
        }
        Ok(frames)
    }

    /// 保存最新帧 (应用保存滤镜), `subfolder` 为保存目录下的子目录
    pub fn save_last_frame(&mut self, subfolder: Option<&str>) -> Result<PathBuf> {
        let Some(frame) = &self.last_frame else {
            return Err(Error::FrameRead(self.camera.name.clone()).logged());
        };
        let image = apply_filters(frame, &self.save_filters, self.filter_size())?;
        let dir = match subfolder {
            Some(sub) => self.save_dir.join(sub),
            None => self.save_dir.clone(),
        };
        let path = save_image(&image, &dir)?;
        self.saved += 1;
        log::debug!("📸 本次已保存 {} 张", self.saved);
        Ok(path)
    }

    pub fn saved_count(&self) -> usize {
        self.saved
    }

    /// 当前会话的数据集元数据
    pub fn dataset_metadata(&self) -> DatasetMetadata {
        DatasetMetadata {
            date: None,
            camera_width: self.camera.width,
            camera_height: self.camera.height,
            filters: self.save_filters.iter().map(|f| f.name().to_string()).collect(),
            brightness: Some(self.camera.brightness),
            contrast: Some(self.camera.contrast),
            saturation: Some(self.camera.saturation),
            exposure: Some(self.camera.exposure),
            wb: Some(self.camera.wb),
        }
    }

    /// 写入元数据并停止采集
    pub fn exit(&mut self) -> Result<()> {
        if !self.running {
            return Ok(());
        }
        self.running = false;
        let dir = check_dir_path(&self.save_dir, true)?;
        write_dataset_metadata(&dir, &self.dataset_metadata())?;
        self.source.stop();
        log::info!("👋 采集结束, 本次保存 {} 张图像", self.saved);
        Ok(())
    }

    /// 打开实时窗口, 阻塞到窗口关闭
    pub fn video_stream(self) -> Result<()> {
        crate::stream::VideoStream::new(self).run()
    }
}

/// 枚举 → 选择 (命令行参数或标准输入) → 打开
pub fn camera_manager_factory(
    camera_id: Option<u32>,
    config: &AppConfig,
    images_dir: &Path,
) -> Result<CameraManager> {
    let backend = platform_backend(&config.camera)?;
    let cameras = get_cameras(backend.as_ref(), &config.camera)?;
    let camera = select_camera(&cameras, camera_id, io::stdin().lock())?;
    CameraManager::new(camera, backend.as_ref(), config, images_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraDevice, CaptureInput};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    /// 记录写入值, 回读时亮度被设备限制在 200 以内
    #[derive(Clone, Default)]
    struct FakeControl(Rc<RefCell<HashMap<CameraProperty, f32>>>);

    impl CameraControl for FakeControl {
        fn get(&self, prop: CameraProperty) -> Result<f32> {
            let value = self.0.borrow().get(&prop).copied().unwrap_or(0.0);
            Ok(match prop {
                CameraProperty::Brightness => value.min(200.0),
                _ => value,
            })
        }

        fn set(&self, prop: CameraProperty, value: f32) -> Result<()> {
            if prop == CameraProperty::WhiteBalance {
                return Err(Error::Unsupported("wb".into()));
            }
            self.0.borrow_mut().insert(prop, value);
            Ok(())
        }
    }

    struct FakeBackend(FakeControl);

    impl CameraBackend for FakeBackend {
        fn list_devices(&self) -> Result<Vec<CameraDevice>> {
            Ok(Vec::new())
        }

        fn is_working(&self, _device: &CameraDevice) -> bool {
            true
        }

        fn control(&self, _camera: &CameraInfo) -> Box<dyn CameraControl> {
            Box::new(self.0.clone())
        }

        fn input(&self, _camera: &CameraInfo) -> CaptureInput {
            CaptureInput::new("v4l2", "/nonexistent/video99")
        }
    }

    fn manager(dir: &Path) -> (CameraManager, FakeControl) {
        let control = FakeControl::default();
        let backend = FakeBackend(control.clone());
        let device = CameraDevice {
            index: 99,
            name: "fake".into(),
            device: "/nonexistent/video99".into(),
            details: None,
        };
        let config = AppConfig::default();
        let camera = CameraInfo::new(&device, &config.camera);
        (CameraManager::new(camera, &backend, &config, dir).unwrap(), control)
    }

    #[test]
    fn setters_write_then_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut manager, control) = manager(tmp.path());

        assert_eq!(manager.set_contrast(90.0).unwrap(), 90.0);
        assert_eq!(manager.contrast(), 90.0);
        assert_eq!(manager.set_brightness(250.0).unwrap(), 200.0);
        assert_eq!(manager.brightness(), 200.0);
        assert_eq!(control.0.borrow()[&CameraProperty::Brightness], 250.0);

        // 不支持的参数保留请求值
        assert_eq!(manager.set_wb(5000.0).unwrap(), 5000.0);
        assert_eq!(manager.wb(), 5000.0);
    }

    #[test]
    fn save_requires_a_frame() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut manager, _) = manager(tmp.path());
        assert!(matches!(
            manager.save_last_frame(None),
            Err(Error::FrameRead(_))
        ));
        assert!(manager.frames_for_display().unwrap().is_empty());
    }

    #[test]
    fn exit_writes_metadata_once() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut manager, _) = manager(tmp.path());
        manager.set_save_filters(vec![Filter::Grey, Filter::Resize]);
        manager.set_save_dir(tmp.path().join("session")).unwrap();
        manager.exit().unwrap();
        assert!(!manager.is_running());

        let meta = DatasetMetadata::read(&tmp.path().join("session").join("metadata.yaml")).unwrap();
        assert_eq!(meta.filters, vec!["GREY", "RESIZE"]);
        assert_eq!(meta.brightness, Some(AppConfig::default().camera.brightness));
        assert!(meta.date.is_some());
        manager.exit().unwrap();
    }
}
