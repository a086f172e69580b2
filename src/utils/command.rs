// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 外部命令调用 (v4l2-ctl / yolo)

use std::process::Command;

use crate::error::{Error, Result};

/// 执行命令并返回 stdout, 非零退出码转为 `Error::Command`
pub fn run_command<S: AsRef<str>>(program: &str, args: &[S]) -> Result<String> {
    try_command(program, args).map_err(Error::logged)
}

/// 同 `run_command`, 失败时不记录日志 (由调用方决定是否重试)
pub fn try_command<S: AsRef<str>>(program: &str, args: &[S]) -> Result<String> {
    let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
    log::debug!("▶️ {} {}", program, args.join(" "));
    let output = Command::new(program).args(&args).output()?;
    if !output.status.success() {
        return Err(Error::Command {
            program: program.to_string(),
            args: args.join(" "),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn stdout_and_failures() {
        assert_eq!(run_command("echo", &["hi"]).unwrap().trim(), "hi");
        assert!(matches!(
            run_command::<&str>("false", &[]),
            Err(Error::Command { .. })
        ));
        assert!(matches!(
            run_command::<&str>("definitely-not-a-program-ymm", &[]),
            Err(Error::Io(_))
        ));
    }
}
