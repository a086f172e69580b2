// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 数据集目录与训练集划分

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::files::{
    check_dir_path, copy_files, is_image_file, list_files, resolve, DatasetMetadata, METADATA_FILE,
};
use crate::error::{Error, Result};

pub const CLASSES_FILE: &str = "classes.txt";
pub const DATA_FILE: &str = "data.yaml";

/// 数据集目录: `<path>/images`, `<path>/labels`
#[derive(Clone, Debug, PartialEq)]
pub struct DatasetDir {
    pub path: PathBuf,
    pub images: PathBuf,
    pub labels: PathBuf,
}

impl DatasetDir {
    pub fn open(path: impl AsRef<Path>, create: bool) -> Result<Self> {
        let path = check_dir_path(path, create)?;
        let images = check_dir_path(path.join("images"), create)?;
        let labels = check_dir_path(path.join("labels"), create)?;
        Ok(Self {
            path,
            images,
            labels,
        })
    }

    /// 图像文件 (递归, 仅允许的扩展名)
    pub fn images_list(&self) -> Result<Vec<PathBuf>> {
        Ok(list_files(&self.images, true)?
            .into_iter()
            .filter(|p| is_image_file(p))
            .collect())
    }

    /// 标注文件 (递归)
    pub fn labels_list(&self) -> Result<Vec<PathBuf>> {
        list_files(&self.labels, true)
    }

    pub fn n_images(&self) -> Result<usize> {
        Ok(self.images_list()?.len())
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.path.join(METADATA_FILE)
    }

    pub fn classes_path(&self) -> PathBuf {
        self.path.join(CLASSES_FILE)
    }

    /// 复制图像及其标注, 标注重命名为 `<图像名>.txt`
    pub fn add_data(&self, images: &[PathBuf], labels: &[PathBuf]) -> Result<()> {
        copy_files(images, &self.images, None)?;

        let mut matched = Vec::new();
        let mut names = Vec::new();
        for image in images {
            let Some(stem) = file_stem(image) else {
                continue;
            };
            if let Some(label) = find_label(&stem, labels) {
                matched.push(label.clone());
                names.push(format!("{}.txt", stem));
            } else {
                log::debug!("🏷️ 图像 {} 没有对应的标注", image.display());
            }
        }
        copy_files(&matched, &self.labels, Some(&names))?;
        Ok(())
    }

    /// 从目录导入图像, 相对路径基于 `images_root` 解析
    ///
    /// 源目录中的 `metadata.yaml` 会复制到数据集根目录
    pub fn add_images(&self, dir: impl AsRef<Path>, images_root: &Path) -> Result<usize> {
        let dir = check_dir_path(resolve(dir, images_root), false)?;
        let images: Vec<PathBuf> = list_files(&dir, false)?
            .into_iter()
            .filter(|p| is_image_file(p))
            .collect();
        let copied = copy_files(&images, &self.images, None)?;

        let metadata = dir.join(METADATA_FILE);
        if metadata.is_file() {
            fs::copy(&metadata, self.metadata_path())?;
        }
        log::info!("🖼️ 已从 {} 导入 {} 张图像", dir.display(), copied.len());
        Ok(copied.len())
    }
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
}

/// 同名标注优先, 否则取 `<前缀>-<图像名>` 或 `<前缀>_<图像名>` 形式的标注
fn find_label<'a>(stem: &str, labels: &'a [PathBuf]) -> Option<&'a PathBuf> {
    labels
        .iter()
        .find(|l| file_stem(l).as_deref() == Some(stem))
        .or_else(|| {
            labels
                .iter()
                .find(|l| file_stem(l).is_some_and(|s| is_prefixed_stem(&s, stem)))
        })
}

fn is_prefixed_stem(label: &str, stem: &str) -> bool {
    label
        .strip_suffix(stem)
        .is_some_and(|prefix| prefix.ends_with('-') || prefix.ends_with('_'))
}

/// 检查划分比例: 各自在 (0, 1) 内, 且 validation + test <= 0.5
pub fn validate_split_ratios(validation: f64, test: f64) -> Result<()> {
    for (name, ratio) in [("validation", validation), ("test", test)] {
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(Error::SplitRatio(format!(
                "{} ratio {} must be between 0 and 1",
                name, ratio
            ))
            .logged());
        }
    }
    if validation + test > 0.5 {
        return Err(Error::SplitRatio(format!(
            "validation + test = {} must not exceed 0.5",
            validation + test
        ))
        .logged());
    }
    Ok(())
}

/// 读取类别文件, 每行一个类别, 忽略空行
pub fn read_classes(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| {
        log::error!("❌ 无法读取类别文件 {}: {}", path.display(), e);
        e
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// 训练配置 (`data.yaml`)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrainingData {
    pub path: PathBuf,
    pub task: String,
    pub train: String,
    pub val: String,
    pub test: String,
    pub nc: usize,
    pub names: BTreeMap<u32, String>,
}

impl TrainingData {
    pub fn new(path: PathBuf, classes: &[String]) -> Self {
        Self {
            path,
            task: "detect".into(),
            train: "train/images".into(),
            val: "validation/images".into(),
            test: "test/images".into(),
            nc: classes.len(),
            names: classes
                .iter()
                .enumerate()
                .map(|(i, c)| (i as u32, c.clone()))
                .collect(),
        }
    }
}

/// 划分结果计数
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SplitCounts {
    pub train: usize,
    pub validation: usize,
    pub test: usize,
}

/// 划分后的训练数据集: `<path>/{train,validation,test}`
#[derive(Clone, Debug)]
pub struct TrainingDatasetDir {
    pub path: PathBuf,
    pub train: DatasetDir,
    pub validation: DatasetDir,
    pub test: DatasetDir,
    source: Option<DatasetDir>,
}

impl TrainingDatasetDir {
    /// 打开已有的划分数据集, 相对路径基于 `datasets_root`
    pub fn open(path: impl AsRef<Path>, datasets_root: &Path) -> Result<Self> {
        let path = check_dir_path(resolve(path, datasets_root), false)?;
        Ok(Self {
            train: DatasetDir::open(path.join("train"), false)?,
            validation: DatasetDir::open(path.join("validation"), false)?,
            test: DatasetDir::open(path.join("test"), false)?,
            path,
            source: None,
        })
    }

    /// 在源数据集旁创建 `<name>_split`
    pub fn create_from(source: &DatasetDir) -> Result<Self> {
        let name = source
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::NotADirectory(source.path.clone()).logged())?;
        let path = source.path.with_file_name(format!("{}_split", name));
        let path = check_dir_path(path, true)?;
        Ok(Self {
            train: DatasetDir::open(path.join("train"), true)?,
            validation: DatasetDir::open(path.join("validation"), true)?,
            test: DatasetDir::open(path.join("test"), true)?,
            path,
            source: Some(source.clone()),
        })
    }

    pub fn source(&self) -> Option<&DatasetDir> {
        self.source.as_ref()
    }

    pub fn data_path(&self) -> PathBuf {
        self.path.join(DATA_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.path.join(METADATA_FILE)
    }

    pub fn split(&self, validation: f64, test: f64) -> Result<SplitCounts> {
        self.split_with_rng(validation, test, &mut rand::thread_rng())
    }

    /// 随机划分: 前 n_val 张为验证集, 其后 n_test 张为测试集, 其余为训练集
    pub fn split_with_rng<R: Rng + ?Sized>(
        &self,
        validation: f64,
        test: f64,
        rng: &mut R,
    ) -> Result<SplitCounts> {
        validate_split_ratios(validation, test)?;
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| Error::Parse(format!("{} has no source dataset", self.path.display())).logged())?;

        // 先读类别, 缺少 classes.txt 时不留下半成品
        let classes = read_classes(&source.classes_path())?;
        let mut images = source.images_list()?;
        let labels = source.labels_list()?;
        images.shuffle(rng);

        let n = images.len();
        let n_val = (n as f64 * validation).floor() as usize;
        let n_test = (n as f64 * test).floor() as usize;
        let (val_images, rest) = images.split_at(n_val);
        let (test_images, train_images) = rest.split_at(n_test);

        self.validation.add_data(val_images, &labels)?;
        self.test.add_data(test_images, &labels)?;
        self.train.add_data(train_images, &labels)?;

        let metadata = source.metadata_path();
        if metadata.is_file() {
            fs::copy(&metadata, self.metadata_path())?;
        }
        self.write_training_data(&classes)?;

        let counts = SplitCounts {
            train: train_images.len(),
            validation: val_images.len(),
            test: test_images.len(),
        };
        log::info!(
            "✂️ 数据集已划分: train={} validation={} test={} → {}",
            counts.train,
            counts.validation,
            counts.test,
            self.path.display()
        );
        Ok(counts)
    }

    /// 根据类别文件写入 `data.yaml`
    pub fn write_data_yaml(&self, classes_file: &Path) -> Result<TrainingData> {
        self.write_training_data(&read_classes(classes_file)?)
    }

    fn write_training_data(&self, classes: &[String]) -> Result<TrainingData> {
        let data = TrainingData::new(self.path.clone(), classes);
        fs::write(self.data_path(), serde_yaml::to_string(&data)?)?;
        log::debug!("📝 {} 已写入, {} 个类别", DATA_FILE, data.nc);
        Ok(data)
    }

    pub fn data(&self) -> Result<TrainingData> {
        Ok(serde_yaml::from_str(&fs::read_to_string(self.data_path())?)?)
    }

    pub fn metadata(&self) -> Result<DatasetMetadata> {
        DatasetMetadata::read(&self.metadata_path())
    }

    pub fn n_train(&self) -> Result<usize> {
        self.train.n_images()
    }

    pub fn n_val(&self) -> Result<usize> {
        self.validation.n_images()
    }

    pub fn n_test(&self) -> Result<usize> {
        self.test.n_images()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_bounds() {
        assert!(validate_split_ratios(0.2, 0.1).is_ok());
        assert!(validate_split_ratios(0.25, 0.25).is_ok());
        assert!(validate_split_ratios(0.4, 0.2).is_err());
        assert!(validate_split_ratios(0.0, 0.1).is_err());
        assert!(validate_split_ratios(0.2, 1.0).is_err());
        assert!(validate_split_ratios(f64::NAN, 0.1).is_err());
    }

    #[test]
    fn label_lookup_prefers_exact_stem() {
        let labels = vec![PathBuf::from("l/x_11.txt"), PathBuf::from("l/1.txt")];
        assert_eq!(find_label("1", &labels), Some(&labels[1]));
        assert_eq!(find_label("11", &labels), Some(&labels[0]));
        assert_eq!(find_label("2", &labels), None);

        // 只有分隔符后的完整图像名才算匹配
        let labels = vec![PathBuf::from("l/x-21.txt"), PathBuf::from("l/task_1.txt")];
        assert_eq!(find_label("1", &labels), Some(&labels[1]));
        assert_eq!(find_label("21", &labels), Some(&labels[0]));
        assert_eq!(find_label("x", &[PathBuf::from("l/xx.txt")]), None);
    }

    #[test]
    fn add_images_from_relative_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let images_root = tmp.path().join("images");
        let shots = images_root.join("session1");
        fs::create_dir_all(&shots).unwrap();
        fs::write(shots.join("a.png"), b"png").unwrap();
        fs::write(shots.join("b.JPG"), b"jpg").unwrap();
        fs::write(shots.join("notes.txt"), b"txt").unwrap();
        fs::write(shots.join(METADATA_FILE), "camera_width: 640\n").unwrap();

        let dataset = DatasetDir::open(tmp.path().join("parts"), true).unwrap();
        assert_eq!(dataset.add_images("session1", &images_root).unwrap(), 2);
        assert!(dataset.images.join("a.png").is_file());
        assert!(dataset.images.join("b.JPG").is_file());
        assert!(!dataset.images.join("notes.txt").exists());
        assert!(!dataset.images.join(METADATA_FILE).exists());
        assert_eq!(
            fs::read_to_string(dataset.metadata_path()).unwrap(),
            "camera_width: 640\n"
        );

        assert!(matches!(
            dataset.add_images("missing", &images_root),
            Err(Error::NotADirectory(_))
        ));
    }

    #[test]
    fn open_requires_every_split_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        for part in ["train", "validation"] {
            DatasetDir::open(root.join("parts_split").join(part), true).unwrap();
        }
        assert!(matches!(
            TrainingDatasetDir::open("parts_split", root),
            Err(Error::NotADirectory(_))
        ));

        DatasetDir::open(root.join("parts_split").join("test"), true).unwrap();
        let split = TrainingDatasetDir::open("parts_split", root).unwrap();
        assert_eq!(split.path, root.join("parts_split"));
        assert!(split.source().is_none());
        assert!(TrainingDatasetDir::open("nope", root).is_err());
    }

    #[test]
    fn split_without_classes_copies_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let source = DatasetDir::open(tmp.path().join("parts"), true).unwrap();
        for i in 0..4 {
            fs::write(source.images.join(format!("{}.png", i)), b"img").unwrap();
            fs::write(source.labels.join(format!("{}.txt", i)), b"0 0.5 0.5 0.1 0.1").unwrap();
        }
        let split = TrainingDatasetDir::create_from(&source).unwrap();
        assert!(matches!(split.split(0.25, 0.25), Err(Error::Io(_))));
        assert_eq!(split.n_train().unwrap(), 0);
        assert_eq!(split.n_val().unwrap(), 0);
        assert_eq!(split.n_test().unwrap(), 0);
        assert!(!split.data_path().exists());
    }

    #[test]
    fn classes_skip_blank_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CLASSES_FILE);
        fs::write(&path, "screw\n\n nut \n").unwrap();
        assert_eq!(read_classes(&path).unwrap(), vec!["screw", "nut"]);
    }

    #[test]
    fn split_copies_images_labels_and_metadata() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let tmp = tempfile::tempdir().unwrap();
        let source = DatasetDir::open(tmp.path().join("parts"), true).unwrap();
        fs::write(source.classes_path(), "screw\nnut\n").unwrap();
        fs::write(source.metadata_path(), "camera_width: 640\ncamera_height: 480\n").unwrap();
        for i in 0..10 {
            fs::write(source.images.join(format!("{}.jpg", i)), b"img").unwrap();
            // label-studio 导出的标注带前缀
            fs::write(source.labels.join(format!("task-{}.txt", i)), b"0 0.5 0.5 0.2 0.2").unwrap();
        }
        fs::write(source.images.join("notes.txt"), b"skip").unwrap();

        let split = TrainingDatasetDir::create_from(&source).unwrap();
        assert_eq!(split.path, tmp.path().join("parts_split"));
        let counts = split
            .split_with_rng(0.2, 0.1, &mut StdRng::seed_from_u64(7))
            .unwrap();
        assert_eq!(
            counts,
            SplitCounts {
                train: 7,
                validation: 2,
                test: 1
            }
        );
        assert_eq!(split.n_val().unwrap(), 2);
        assert_eq!(split.train.labels_list().unwrap().len(), 7);
        for image in split.test.images_list().unwrap() {
            let stem = image.file_stem().unwrap().to_str().unwrap().to_string();
            assert!(split.test.labels.join(format!("{}.txt", stem)).is_file());
        }
        assert!(split.metadata_path().is_file());
        assert_eq!(split.data().unwrap().nc, 2);
    }

    #[test]
    fn data_yaml_layout() {
        let data = TrainingData::new("/d".into(), &["a".into(), "b".into()]);
        let text = serde_yaml::to_string(&data).unwrap();
        assert!(text.contains("task: detect"));
        assert!(text.contains("val: validation/images"));
        assert!(text.contains("nc: 2"));
        assert!(text.contains("1: b"));
    }
}
