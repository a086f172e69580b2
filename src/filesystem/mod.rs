// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 文件系统 (Filesystem)
///
/// - files:   目录检查、文件复制、图像保存、元数据
/// - dataset: 数据集目录与训练集划分
pub mod dataset;
pub mod files;

pub use dataset::{
    read_classes, validate_split_ratios, DatasetDir, SplitCounts, TrainingData,
    TrainingDatasetDir,
};
pub use files::{
    check_dir_path, copy_files, resolve, save_image, write_dataset_metadata, DatasetMetadata,
    ALLOWED_IMAGE_EXTENSIONS,
};
