// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// yolo-manager 命令行入口
///
/// 日志级别: `LOGGING_LVL`, 路径: `YMM_APP_PATH` / `IMAGES_PATH` / `MODELS_PATH` / `DATASETS_PATH`
use clap::Parser;
use mimalloc::MiMalloc;

use yolo_model_manager::cli::{self, Cli};
use yolo_model_manager::config::{self, EnvVars};
use yolo_model_manager::logging::{init_logging, level_from_env};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let paths = config::paths();
    init_logging(
        level_from_env(EnvVars::LOGGING_LVL),
        args.log_file(paths).as_deref(),
    )?;

    let config = config::global();
    config.print_summary();
    cli::run(args, config, paths)?;
    Ok(())
}
