// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 工具模块
/// Utility modules
pub mod command;

pub use command::{run_command, try_command};
