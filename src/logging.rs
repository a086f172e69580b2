// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 日志 (Logging)
//!
//! 日志级别来自环境变量 `LOGGING_LVL`, 接受级别名或数字级别 (10/20/30/40/50)

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::LevelFilter;

use crate::config::EnvVars;
use crate::error::Result;

/// 默认日志文件名
pub const LOG_FILE_NAME: &str = "yoloModelManager.log";

/// 解析日志级别: "debug" / "INFO" / "warning" / "30" ...
pub fn parse_level(value: &str) -> Option<LevelFilter> {
    let value = value.trim();
    if let Ok(n) = value.parse::<u32>() {
        return Some(match n {
            0 => LevelFilter::Trace,
            1..=10 => LevelFilter::Debug,
            11..=20 => LevelFilter::Info,
            21..=30 => LevelFilter::Warn,
            31..=50 => LevelFilter::Error,
            _ => LevelFilter::Off,
        });
    }
    match value.to_lowercase().as_str() {
        "trace" | "notset" => Some(LevelFilter::Trace),
        "debug" => Some(LevelFilter::Debug),
        "info" => Some(LevelFilter::Info),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "error" | "critical" | "fatal" => Some(LevelFilter::Error),
        "off" => Some(LevelFilter::Off),
        _ => None,
    }
}

/// 从环境变量读取日志级别, 未设置或无法解析时为 Warn
pub fn level_from_env(var: &str) -> LevelFilter {
    std::env::var(var)
        .ok()
        .and_then(|v| parse_level(&v))
        .unwrap_or(LevelFilter::Warn)
}

/// 外部训练框架是否输出详细日志
pub fn ultralytics_verbose() -> bool {
    level_from_env(EnvVars::ULTRALYTICS_LOGGING_LVL) >= LevelFilter::Info
}

/// stderr + 日志文件
struct Tee {
    file: Arc<Mutex<File>>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Ok(mut file) = self.file.lock() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Ok(mut file) = self.file.lock() {
            file.flush()?;
        }
        Ok(())
    }
}

/// 初始化日志系统
///
/// 本crate的日志按 `level` 输出, 其余依赖只输出 Warn 以上。
/// `log_file` 不为空时同时追加写入该文件。重复初始化会被忽略。
pub fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(LevelFilter::Warn)
        .filter_module("yolo_model_manager", level)
        .filter_module("yolo_manager", level)
        .format_timestamp_millis();

    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(Tee {
            file: Arc::new(Mutex::new(file)),
        })));
    }

    if builder.try_init().is_err() {
        log::debug!("日志系统已初始化, 忽略重复初始化");
    }
    Ok(())
}

/// 执行 `f` 并以 debug 级别记录耗时
pub fn time_me<T>(label: &str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let out = f();
    log::debug!("⏱️ {}: {:?}", label, start.elapsed());
    out
}
