// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 命令行 (Command Line)
//!
//! - `image-acquisition`: 采集图像
//! - `split-dataset`: 划分训练/验证/测试集
//! - `test-model`: 实时测试模型
//! - `train-model`: 训练模型
//! - `list-cameras`: 列出摄像头

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::camera::{camera_manager_factory, get_cameras, platform_backend};
use crate::config::{AppConfig, Paths};
use crate::error::{Error, Result};
use crate::filesystem::{resolve, validate_split_ratios, DatasetDir, TrainingDatasetDir};
use crate::imaging::Filter;
use crate::logging::LOG_FILE_NAME;
use crate::model::{train_model, ModelManager, TrainOptions, YoloCli};

#[derive(Parser, Debug)]
#[command(author, version, about = "YOLO 模型管理: 图像采集、数据集划分、训练与测试", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 打开摄像头采集图像 (Space/Enter 保存, 1-9 保存到子目录, Esc 退出)
    ImageAcquisition {
        /// 摄像头索引, 不指定时交互选择
        #[arg(short, long)]
        camera: Option<u32>,

        /// 显示滤镜 (可多次指定): GREY / COLOR / RESIZE / CUT
        #[arg(short = 'f', long = "show-filter", value_parser = parse_filter)]
        show_filters: Vec<Filter>,

        /// 保存滤镜 (可多次指定)
        #[arg(short = 's', long = "save-filter", value_parser = parse_filter)]
        save_filters: Vec<Filter>,

        /// 保存目录, 默认 IMAGES_PATH
        #[arg(short = 'p', long)]
        save_path: Option<PathBuf>,
    },

    /// 将 label-studio 导出的数据集划分到 <data_source>_split
    SplitDataset {
        /// 导出的数据集目录 (相对路径基于 DATASETS_PATH)
        #[arg(short, long)]
        data_source: PathBuf,

        /// 额外的图像目录 (相对路径基于 IMAGES_PATH)
        #[arg(short, long)]
        images: Option<PathBuf>,

        /// 验证集比例
        #[arg(short, long, default_value_t = 0.2, value_parser = parse_ratio)]
        validation: f64,

        /// 测试集比例
        #[arg(short, long, default_value_t = 0.1, value_parser = parse_ratio)]
        test: f64,
    },

    /// 用摄像头实时测试模型
    TestModel {
        /// 模型名 (MODELS_PATH 下的目录)
        #[arg(short, long)]
        model: String,

        #[arg(short, long)]
        camera: Option<u32>,

        #[arg(short = 'p', long)]
        save_path: Option<PathBuf>,
    },

    /// 在划分好的数据集上训练模型
    TrainModel {
        /// 基础模型, 如 yolov8n.pt
        #[arg(short, long)]
        model: String,

        /// 划分后的数据集目录 (相对路径基于 DATASETS_PATH)
        #[arg(short, long)]
        dataset: PathBuf,

        #[arg(short, long, default_value_t = 100)]
        epochs: u32,

        /// 输入尺寸
        #[arg(short = 's', long, default_value_t = 640)]
        imgsz: u32,

        /// 模型名, 默认为数据集名
        #[arg(short, long)]
        name: Option<String>,
    },

    /// 列出可用摄像头
    ListCameras {
        /// 以 JSON 输出
        #[arg(long)]
        json: bool,
    },
}

/// 滤镜名 (不区分大小写)
pub fn parse_filter(s: &str) -> std::result::Result<Filter, String> {
    s.parse::<Filter>()
        .map_err(|_| format!("valid filters: {}", Filter::names().join(", ")))
}

/// 开区间 (0, 1) 内的比例
pub fn parse_ratio(s: &str) -> std::result::Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("\"{}\" is not a number", s))?;
    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(format!("{} is not in the range (0, 1)", value))
    }
}

impl Cli {
    /// `split-dataset` 同时写入日志文件
    pub fn log_file(&self, paths: &Paths) -> Option<PathBuf> {
        match self.command {
            Command::SplitDataset { .. } => Some(paths.app.join(LOG_FILE_NAME)),
            _ => None,
        }
    }
}

pub fn run(cli: Cli, config: &AppConfig, paths: &Paths) -> Result<()> {
    log::debug!("▶️ 执行: {:?}", cli.command);
    match cli.command {
        Command::ImageAcquisition {
            camera,
            show_filters,
            save_filters,
            save_path,
        } => image_acquisition(camera, show_filters, save_filters, save_path, config, paths),
        Command::SplitDataset {
            data_source,
            images,
            validation,
            test,
        } => split_dataset(&data_source, images.as_deref(), validation, test, paths),
        Command::TestModel {
            model,
            camera,
            save_path,
        } => test_model(&model, camera, save_path, config, paths),
        Command::TrainModel {
            model,
            dataset,
            epochs,
            imgsz,
            name,
        } => {
            let options = TrainOptions {
                base_model: model,
                epochs,
                imgsz,
                name,
            };
            let split = TrainingDatasetDir::open(&dataset, &paths.datasets)?;
            let dir = train_model(&YoloCli::from_env(), &split, &options, &paths.models)?;
            println!("{}", dir.display());
            Ok(())
        }
        Command::ListCameras { json } => list_cameras(json, config),
    }
}

pub fn image_acquisition(
    camera: Option<u32>,
    show_filters: Vec<Filter>,
    save_filters: Vec<Filter>,
    save_path: Option<PathBuf>,
    config: &AppConfig,
    paths: &Paths,
) -> Result<()> {
    let mut manager = camera_manager_factory(camera, config, &paths.images)?;
    manager.set_show_filters(show_filters);
    manager.set_save_filters(save_filters);
    manager.set_save_dir(save_path.unwrap_or_else(|| paths.images.clone()))?;
    manager.video_stream()
}

pub fn split_dataset(
    data_source: &Path,
    images: Option<&Path>,
    validation: f64,
    test: f64,
    paths: &Paths,
) -> Result<()> {
    validate_split_ratios(validation, test)?;
    let source = DatasetDir::open(resolve(data_source, &paths.datasets), false)?;
    if let Some(images) = images {
        let added = source.add_images(images, &paths.images)?;
        log::info!("🖼️ 已添加 {} 张图像", added);
    }
    let split = TrainingDatasetDir::create_from(&source)?;
    let counts = split.split(validation, test)?;
    println!(
        "{}: train={} validation={} test={}",
        split.path.display(),
        counts.train,
        counts.validation,
        counts.test
    );
    Ok(())
}

pub fn test_model(
    name: &str,
    camera: Option<u32>,
    save_path: Option<PathBuf>,
    config: &AppConfig,
    paths: &Paths,
) -> Result<()> {
    let model = ModelManager::open(&paths.models, name, &config.model)?;
    let mut manager = camera_manager_factory(camera, config, &paths.images)?;
    manager.load_params_from_model(&model)?;
    if let Some(path) = save_path {
        manager.set_save_dir(path)?;
    }
    manager.attach_model(model);
    manager.video_stream()
}

pub fn list_cameras(json: bool, config: &AppConfig) -> Result<()> {
    let backend = platform_backend(&config.camera)?;
    let cameras = get_cameras(backend.as_ref(), &config.camera)?;
    if json {
        let list: Vec<_> = cameras.values().collect();
        let text =
            serde_json::to_string_pretty(&list).map_err(|e| Error::Parse(e.to_string()))?;
        println!("{}", text);
    } else {
        for camera in cameras.values() {
            println!("{}", camera);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn acquisition_filters() {
        let cli = Cli::try_parse_from([
            "yolo-manager",
            "image-acquisition",
            "-c",
            "1",
            "-f",
            "grey",
            "-f",
            "CUT",
            "-s",
            "Resize",
        ])
        .unwrap();
        match cli.command {
            Command::ImageAcquisition {
                camera,
                show_filters,
                save_filters,
                save_path,
            } => {
                assert_eq!(camera, Some(1));
                assert_eq!(show_filters, vec![Filter::Grey, Filter::Cut]);
                assert_eq!(save_filters, vec![Filter::Resize]);
                assert_eq!(save_path, None);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(Cli::try_parse_from(["yolo-manager", "image-acquisition", "-f", "blur"]).is_err());
    }

    #[test]
    fn split_defaults_and_ranges() {
        let cli = Cli::try_parse_from(["yolo-manager", "split-dataset", "-d", "parts"]).unwrap();
        match cli.command {
            Command::SplitDataset {
                validation, test, ..
            } => {
                assert_eq!(validation, 0.2);
                assert_eq!(test, 0.1);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(
            Cli::try_parse_from(["yolo-manager", "split-dataset", "-d", "p", "-v", "1.0"]).is_err()
        );
        assert!(parse_ratio("0").is_err());
        assert!(parse_ratio("abc").is_err());
    }

    #[test]
    fn only_split_writes_a_log_file() {
        let paths = Paths::under("/opt/app");
        let split = Cli::try_parse_from(["yolo-manager", "split-dataset", "-d", "p"]).unwrap();
        assert_eq!(
            split.log_file(&paths),
            Some(PathBuf::from("/opt/app").join(LOG_FILE_NAME))
        );
        let list = Cli::try_parse_from(["yolo-manager", "list-cameras", "--json"]).unwrap();
        assert_eq!(list.log_file(&paths), None);
    }

    #[test]
    fn split_rejects_large_ratios() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Paths::under(tmp.path());
        assert!(matches!(
            split_dataset(Path::new("parts"), None, 0.4, 0.2, &paths),
            Err(Error::SplitRatio(_))
        ));
    }

    #[test]
    fn train_model_defaults() {
        let cli = Cli::try_parse_from([
            "yolo-manager",
            "train-model",
            "-m",
            "yolov8n.pt",
            "-d",
            "parts_split",
        ])
        .unwrap();
        match cli.command {
            Command::TrainModel {
                epochs, imgsz, name, ..
            } => assert_eq!((epochs, imgsz, name), (100, 640, None)),
            other => panic!("unexpected {:?}", other),
        }
    }
}
