// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 训练: 划分好的数据集 → `<models>/<name>/{<name>.pt, metadata.yaml}`

use std::fs;
use std::path::{Path, PathBuf};

use super::{ModelMetadata, YoloCli};
use crate::error::Result;
use crate::filesystem::files::METADATA_FILE;
use crate::filesystem::{check_dir_path, TrainingDatasetDir};

#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// 基础模型, 如 `yolov8n.pt`
    pub base_model: String,
    pub epochs: u32,
    pub imgsz: u32,
    /// 模型名, 默认为数据集目录名
    pub name: Option<String>,
}

/// 训练后的模型名
pub fn model_name(options: &TrainOptions, dataset: &TrainingDatasetDir) -> String {
    options.name.clone().unwrap_or_else(|| {
        dataset
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.trim_end_matches("_split").to_string())
            .unwrap_or_else(|| "model".to_string())
    })
}

/// 由数据集元数据、划分计数和类别组成模型元数据
pub fn build_metadata(dataset: &TrainingDatasetDir) -> Result<ModelMetadata> {
    let data = dataset.data()?;
    let base = if dataset.metadata_path().is_file() {
        dataset.metadata()?
    } else {
        log::warn!(
            "⚠️ 数据集 {} 没有 {}, 相机参数留空",
            dataset.path.display(),
            METADATA_FILE
        );
        Default::default()
    };
    Ok(ModelMetadata {
        dataset: base,
        n_train: dataset.n_train()?,
        n_val: dataset.n_val()?,
        n_test: dataset.n_test()?,
        names: data.names,
    })
}

/// 训练并写入模型目录, 返回该目录
pub fn train_model(
    cli: &YoloCli,
    dataset: &TrainingDatasetDir,
    options: &TrainOptions,
    models_dir: &Path,
) -> Result<PathBuf> {
    let name = model_name(options, dataset);
    let metadata = build_metadata(dataset)?;

    let best = cli.train(
        &dataset.data_path(),
        &options.base_model,
        options.epochs,
        options.imgsz,
        &models_dir.join("runs"),
        &name,
    )?;

    let model_dir = check_dir_path(models_dir.join(&name), true)?;
    fs::copy(&best, model_dir.join(format!("{}.pt", name)))?;
    metadata.write(&model_dir.join(METADATA_FILE))?;
    log::info!("🎉 模型 \"{}\" 已保存到 {}", name, model_dir.display());
    Ok(model_dir)
}
