// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! FFmpeg 采集 - 独立线程解码摄像头, 只保留最新帧
//!
//! ```text
//! 摄像头 → FFmpeg (format=yuv420p) → DecodeFilter → bounded(2) → capture_frame
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Frame, Input};
use image::RgbImage;

use crate::error::{Error, Result};

/// AV_PIX_FMT_YUV420P / AV_PIX_FMT_YUVJ420P
const YUV420P: i32 = 0;
const YUVJ420P: i32 = 12;
const MAX_DIMENSION: u32 = 8192;
const STOP_WAIT: Duration = Duration::from_secs(1);

/// FFmpeg 输入: 格式 (`v4l2` / `dshow` / `avfoundation`) 与地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureInput {
    pub format: String,
    pub url: String,
}

impl CaptureInput {
    pub fn new(format: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            url: url.into(),
        }
    }
}

/// YUV420P 平面 → RGB (BT.601 整数近似)
pub fn yuv420p_to_rgb(
    y_plane: &[u8],
    u_plane: &[u8],
    v_plane: &[u8],
    y_stride: usize,
    uv_stride: usize,
    width: u32,
    height: u32,
) -> Option<RgbImage> {
    let (w, h) = (width as usize, height as usize);
    if y_stride < w
        || uv_stride < w.div_ceil(2)
        || y_plane.len() < y_stride * h
        || u_plane.len() < uv_stride * h.div_ceil(2)
        || v_plane.len() < uv_stride * h.div_ceil(2)
    {
        return None;
    }
    let mut buffer = vec![0u8; w * h * 3];
    let mut out_idx = 0;
    for y in 0..h {
        let y_row = y * y_stride;
        let uv_row = (y >> 1) * uv_stride;
        for x in 0..w {
            let y_val = y_plane[y_row + x] as i32;
            let u_val = u_plane[uv_row + (x >> 1)] as i32 - 128;
            let v_val = v_plane[uv_row + (x >> 1)] as i32 - 128;

            buffer[out_idx] = (y_val + ((v_val * 179) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 1] =
                (y_val - ((u_val * 44) >> 7) - ((v_val * 91) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 2] = (y_val + ((u_val * 227) >> 7)).clamp(0, 255) as u8;
            out_idx += 3;
        }
    }
    RgbImage::from_raw(width, height, buffer)
}

/// 放入最新帧, 队列满时先丢弃最旧的一帧
///
/// 接收端全部断开时返回 false
pub fn push_latest<T>(tx: &Sender<T>, oldest: &Receiver<T>, mut item: T) -> bool {
    loop {
        match tx.try_send(item) {
            Ok(()) => return true,
            Err(TrySendError::Full(back)) => {
                let _ = oldest.try_recv();
                item = back;
            }
            Err(TrySendError::Disconnected(_)) => return false,
        }
    }
}

/// FFmpeg 解码过滤器: YUV420P 帧 → RgbImage → 通道
struct DecodeFilter {
    tx: Sender<RgbImage>,
    /// 与读取端共享的接收端, 用于丢弃最旧帧
    oldest: Receiver<RgbImage>,
    running: Arc<AtomicBool>,
    count: usize,
    dropped: usize,
    last: Instant,
}

impl DecodeFilter {
    fn new(tx: Sender<RgbImage>, oldest: Receiver<RgbImage>, running: Arc<AtomicBool>) -> Self {
        Self {
            tx,
            oldest,
            running,
            count: 0,
            dropped: 0,
            last: Instant::now(),
        }
    }

    fn to_rgb(frame: &Frame) -> Option<RgbImage> {
        // SAFETY: 指针非空, 平面长度由 linesize 与高度决定, 帧在本函数内有效
        unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                return None;
            }
            let raw = &*frame.as_ptr();
            if raw.format != YUV420P && raw.format != YUVJ420P {
                return None;
            }
            let (w, h) = (raw.width, raw.height);
            if w <= 0 || h <= 0 || w as u32 > MAX_DIMENSION || h as u32 > MAX_DIMENSION {
                return None;
            }
            let (y_stride, uv_stride) = (raw.linesize[0], raw.linesize[1]);
            if y_stride <= 0 || uv_stride <= 0 || raw.linesize[2] != uv_stride {
                return None;
            }
            if raw.data[0].is_null() || raw.data[1].is_null() || raw.data[2].is_null() {
                return None;
            }
            let (y_stride, uv_stride, h) = (y_stride as usize, uv_stride as usize, h as usize);
            let uv_len = uv_stride * h.div_ceil(2);
            let y_plane = std::slice::from_raw_parts(raw.data[0], y_stride * h);
            let u_plane = std::slice::from_raw_parts(raw.data[1], uv_len);
            let v_plane = std::slice::from_raw_parts(raw.data[2], uv_len);
            yuv420p_to_rgb(y_plane, u_plane, v_plane, y_stride, uv_stride, w as u32, h as u32)
        }
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> std::result::Result<(), String> {
        log::debug!("✅ 解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> std::result::Result<Option<Frame>, String> {
        if !self.running.load(Ordering::Relaxed) {
            return Err("capture stopped".to_string());
        }

        let Some(image) = Self::to_rgb(&frame) else {
            self.dropped += 1;
            if self.dropped <= 10 {
                log::warn!("⚠️ 丢弃帧 #{}: 空帧/损坏帧/不支持的像素格式", self.dropped);
            }
            return Ok(None);
        };

        if !push_latest(&self.tx, &self.oldest, image) {
            return Err("receiver dropped".to_string());
        }

        self.count += 1;
        let elapsed = self.last.elapsed().as_secs_f64();
        if elapsed >= 5.0 {
            log::trace!("📺 解码 {:.1}fps, 丢弃 {}", self.count as f64 / elapsed, self.dropped);
            self.count = 0;
            self.last = Instant::now();
        }
        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        log::debug!("✅ 解码线程退出");
    }
}

/// 摄像头采集源
pub struct FrameSource {
    name: String,
    input: CaptureInput,
    width: u32,
    height: u32,
    framerate: u32,
    timeout: Duration,
    rx: Receiver<RgbImage>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl FrameSource {
    /// 打开摄像头并启动采集线程, `width`/`height` 为 0 时由设备协商
    pub fn open(
        name: impl Into<String>,
        input: CaptureInput,
        width: u32,
        height: u32,
        framerate: u32,
    ) -> Result<Self> {
        let (_, rx) = crossbeam_channel::bounded(2);
        let mut source = Self {
            name: name.into(),
            input,
            width,
            height,
            framerate,
            timeout: Duration::from_secs(5),
            rx,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        };
        source.start()?;
        Ok(source)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input(&self) -> &CaptureInput {
        &self.input
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().map(|w| !w.is_finished()).unwrap_or(false)
    }

    fn input_opts(&self) -> HashMap<String, String> {
        let mut opts = HashMap::new();
        if self.framerate > 0 {
            opts.insert("framerate".to_string(), self.framerate.to_string());
        }
        if self.width > 0 && self.height > 0 {
            opts.insert(
                "video_size".to_string(),
                format!("{}x{}", self.width, self.height),
            );
        }
        opts
    }

    fn start(&mut self) -> Result<()> {
        let (tx, rx) = crossbeam_channel::bounded(2);
        let running = Arc::new(AtomicBool::new(true));
        let filter = DecodeFilter::new(tx, rx.clone(), running.clone());
        let (name, input, opts) = (self.name.clone(), self.input.clone(), self.input_opts());

        log::info!("🔗 打开摄像头 \"{}\": {} ({})", name, input.url, input.format);
        // 构建失败时 filter 随线程释放, 读取端得到 Disconnected
        let worker = std::thread::Builder::new()
            .name("camera-capture".into())
            .spawn(move || {
                let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
                let pipe = pipe.filter("decode", Box::new(filter));
                let out = create_null_output().add_frame_pipeline(pipe);
                let ffmpeg_input = Input::new(input.url.as_str())
                    .set_format(input.format.as_str())
                    .set_input_opts(opts);

                let ctx = match FfmpegContext::builder()
                    .input(ffmpeg_input)
                    .filter_descs(["format=yuv420p"].into())
                    .output(out)
                    .build()
                {
                    Ok(c) => c,
                    Err(e) => {
                        log::error!("❌ 摄像头 \"{}\" 构建失败: {}", name, e);
                        return;
                    }
                };
                let sch = match ctx.start() {
                    Ok(s) => s,
                    Err(e) => {
                        log::error!("❌ 摄像头 \"{}\" 启动失败: {}", name, e);
                        return;
                    }
                };
                log::debug!("✅ 摄像头 \"{}\" 开始解码", name);
                if let Err(e) = sch.wait() {
                    log::debug!("📹 摄像头 \"{}\" 解码结束: {}", name, e);
                }
            })?;

        self.rx = rx;
        self.running = running;
        self.worker = Some(worker);
        Ok(())
    }

    /// 通知采集线程退出, 最多等待 1 秒
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        let Some(worker) = self.worker.take() else {
            return;
        };
        let deadline = Instant::now() + STOP_WAIT;
        while !worker.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        if worker.is_finished() {
            let _ = worker.join();
            log::debug!("🛑 摄像头 \"{}\" 已关闭", self.name);
        } else {
            log::warn!("⚠️ 摄像头 \"{}\" 采集线程未及时退出", self.name);
        }
    }

    /// 以新分辨率重新打开
    pub fn restart(&mut self, width: u32, height: u32) -> Result<()> {
        self.stop();
        self.width = width;
        self.height = height;
        self.start()
    }

    /// 最新一帧: 队列中有帧时取最后一个, 否则最多等待 `timeout`
    pub fn capture_frame(&mut self) -> Result<RgbImage> {
        if let Some(frame) = self.rx.try_iter().last() {
            return Ok(frame);
        }
        match self.rx.recv_timeout(self.timeout) {
            Ok(frame) => Ok(frame),
            Err(RecvTimeoutError::Timeout) => Err(Error::FrameRead(self.name.clone()).logged()),
            Err(RecvTimeoutError::Disconnected) => {
                Err(Error::CameraConnection(self.name.clone()).logged())
            }
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}
