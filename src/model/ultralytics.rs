// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 外部 `yolo` 命令: 导出 ONNX 与训练

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::EnvVars;
use crate::error::{Error, Result};
use crate::logging::ultralytics_verbose;
use crate::utils::run_command;

#[derive(Debug, Clone, PartialEq)]
pub struct YoloCli {
    program: String,
    verbose: bool,
}

impl YoloCli {
    pub fn new(program: impl Into<String>, verbose: bool) -> Self {
        Self {
            program: program.into(),
            verbose,
        }
    }

    /// `YOLO_BIN` (默认 `yolo`), 详细输出跟随 `ULTRALYTICS_LOGGING_LVL`
    pub fn from_env() -> Self {
        let program = env::var(EnvVars::YOLO_BIN).unwrap_or_else(|_| "yolo".to_string());
        Self::new(program, ultralytics_verbose())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn verbose_arg(&self) -> String {
        format!("verbose={}", if self.verbose { "True" } else { "False" })
    }

    /// 导出 `<name>.pt` 为同目录下的 `<name>.onnx`
    pub fn export_onnx(&self, pt: &Path, imgsz: u32) -> Result<PathBuf> {
        let args = vec![
            "export".to_string(),
            format!("model={}", pt.display()),
            "format=onnx".to_string(),
            format!("imgsz={}", imgsz),
            self.verbose_arg(),
        ];
        run_command(&self.program, &args)?;
        let onnx = pt.with_extension("onnx");
        if !is_valid_export(&onnx) {
            return Err(Error::Parse(format!("export did not produce {}", onnx.display())).logged());
        }
        log::debug!("✅ 模型 \"{}\" 已导出为 ONNX", onnx.display());
        Ok(onnx)
    }

    /// `yolo detect train`, 返回 `<project>/<name>/weights/best.pt`
    pub fn train(
        &self,
        data: &Path,
        model: &str,
        epochs: u32,
        imgsz: u32,
        project: &Path,
        name: &str,
    ) -> Result<PathBuf> {
        let args = vec![
            "detect".to_string(),
            "train".to_string(),
            format!("data={}", data.display()),
            format!("model={}", model),
            format!("epochs={}", epochs),
            format!("imgsz={}", imgsz),
            format!("project={}", project.display()),
            format!("name={}", name),
            "exist_ok=True".to_string(),
            self.verbose_arg(),
        ];
        log::info!("🏋️ 开始训练: {} epochs={} imgsz={}", model, epochs, imgsz);
        run_command(&self.program, &args)?;
        let best = project.join(name).join("weights").join("best.pt");
        if !best.is_file() {
            return Err(Error::Parse(format!("training did not produce {}", best.display())).logged());
        }
        Ok(best)
    }
}

/// 导出文件存在且非空
pub fn is_valid_export(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_validity() {
        let tmp = tempfile::tempdir().unwrap();
        let onnx = tmp.path().join("m.onnx");
        assert!(!is_valid_export(&onnx));
        fs::write(&onnx, b"").unwrap();
        assert!(!is_valid_export(&onnx));
        fs::write(&onnx, b"onnx").unwrap();
        assert!(is_valid_export(&onnx));
    }

    #[cfg(unix)]
    #[test]
    fn failing_program_is_command_error() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = YoloCli::new("false", false);
        assert!(matches!(
            cli.export_onnx(&tmp.path().join("m.pt"), 640),
            Err(Error::Command { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn missing_output_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = YoloCli::new("true", false);
        assert!(matches!(
            cli.export_onnx(&tmp.path().join("m.pt"), 640),
            Err(Error::Parse(_))
        ));
    }
}
