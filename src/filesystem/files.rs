// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 文件与目录工具, 数据集元数据

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::imaging::Filter;

/// 允许的图像扩展名 (不区分大小写)
pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "gif", "tiff"];

pub const METADATA_FILE: &str = "metadata.yaml";

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_lowercase();
            ALLOWED_IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// 相对路径基于 `root` 解析
pub fn resolve(path: impl AsRef<Path>, root: &Path) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// 检查目录是否存在, `create` 为真时自动创建 (含父目录)
pub fn check_dir_path(path: impl AsRef<Path>, create: bool) -> Result<PathBuf> {
    let path = path.as_ref();
    if !path.is_dir() {
        if !create {
            return Err(Error::NotADirectory(path.to_path_buf()).logged());
        }
        fs::create_dir_all(path)?;
        log::info!("📁 已创建目录 {}", path.display());
    }
    Ok(path.to_path_buf())
}

/// 列出目录下的文件 (按路径排序)
pub fn list_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if recursive {
                files.extend(list_files(&path, true)?);
            }
        } else {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// 复制文件到 `dest`, `new_names` 为空时沿用原文件名
///
/// 源文件不存在时跳过并记录警告
pub fn copy_files(
    files: &[PathBuf],
    dest: &Path,
    new_names: Option<&[String]>,
) -> Result<Vec<PathBuf>> {
    let dest = check_dir_path(dest, false)?;
    let mut copied = Vec::with_capacity(files.len());
    for (i, src) in files.iter().enumerate() {
        if !src.is_file() {
            log::warn!("⚠️ 文件不存在, 跳过: {}", src.display());
            continue;
        }
        let name = match new_names.and_then(|names| names.get(i)) {
            Some(name) => PathBuf::from(name),
            None => match src.file_name() {
                Some(name) => PathBuf::from(name),
                None => continue,
            },
        };
        let target = dest.join(name);
        fs::copy(src, &target)?;
        copied.push(target);
    }
    log::debug!("📄 已复制 {} 个文件到 {}", copied.len(), dest.display());
    Ok(copied)
}

/// 保存图像为 `<uuid>.png`, 返回文件路径
pub fn save_image(img: &DynamicImage, dir: &Path) -> Result<PathBuf> {
    let dir = check_dir_path(dir, true)?;
    let path = dir.join(format!("{}.png", Uuid::new_v4()));
    img.save(&path).map_err(|e| {
        log::error!("❌ {}: {}", path.display(), e);
        Error::ImageWrite(path.clone())
    })?;
    log::info!("💾 图像已保存: {}", path.display());
    Ok(path)
}

/// 图像采集/数据集元数据 (`metadata.yaml`)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct DatasetMetadata {
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub camera_width: u32,
    #[serde(default)]
    pub camera_height: u32,
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrast: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturation: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wb: Option<f32>,
}

impl DatasetMetadata {
    /// 滤镜名 → 滤镜
    pub fn filters(&self) -> Result<Vec<Filter>> {
        self.filters.iter().map(|name| Filter::from_name(name)).collect()
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            log::error!("❌ 无法读取 {}: {}", path.display(), e);
            e
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

/// 写入 `<dir>/metadata.yaml`, `date` 设为当前UTC时间
pub fn write_dataset_metadata(dir: &Path, data: &DatasetMetadata) -> Result<PathBuf> {
    let dir = check_dir_path(dir, true)?;
    let mut data = data.clone();
    data.date = Some(Utc::now());
    let path = dir.join(METADATA_FILE);
    fs::write(&path, serde_yaml::to_string(&data)?)?;
    log::info!("📝 元数据已写入 {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_extensions() {
        assert!(is_image_file(Path::new("a/b.PNG")));
        assert!(is_image_file(Path::new("c.jpeg")));
        assert!(!is_image_file(Path::new("c.txt")));
        assert!(!is_image_file(Path::new("noext")));
    }

    #[test]
    fn check_dir_creates_or_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("a").join("b");
        assert!(matches!(
            check_dir_path(&dir, false),
            Err(Error::NotADirectory(_))
        ));
        check_dir_path(&dir, true).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn copy_skips_missing_and_renames() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("x.txt");
        fs::write(&src, "1").unwrap();
        let dest = check_dir_path(tmp.path().join("out"), true).unwrap();
        let copied = copy_files(
            &[src, tmp.path().join("missing.txt")],
            &dest,
            Some(&["y.txt".to_string()]),
        )
        .unwrap();
        assert_eq!(copied, vec![dest.join("y.txt")]);
        assert_eq!(fs::read_to_string(dest.join("y.txt")).unwrap(), "1");
    }

    #[test]
    fn save_image_uses_uuid_name() {
        let tmp = tempfile::tempdir().unwrap();
        let img = DynamicImage::ImageRgb8(image::RgbImage::new(4, 4));
        let path = save_image(&img, &tmp.path().join("shots")).unwrap();
        assert!(path.is_file());
        let stem = path.file_stem().unwrap().to_str().unwrap();
        assert!(Uuid::parse_str(stem).is_ok());
        assert_eq!(path.extension().unwrap(), "png");
    }

    #[test]
    fn metadata_yaml_keeps_key_order() {
        let tmp = tempfile::tempdir().unwrap();
        let data = DatasetMetadata {
            camera_width: 1280,
            camera_height: 720,
            filters: vec!["GREY".into(), "RESIZE".into()],
            brightness: Some(100.0),
            contrast: Some(90.0),
            saturation: Some(80.0),
            exposure: Some(156.0),
            wb: Some(4600.0),
            ..Default::default()
        };
        let path = write_dataset_metadata(tmp.path(), &data).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let keys: Vec<&str> = text
            .lines()
            .filter(|l| !l.starts_with(' ') && !l.starts_with('-'))
            .filter_map(|l| l.split(':').next())
            .collect();
        assert_eq!(
            keys,
            [
                "date",
                "camera_width",
                "camera_height",
                "filters",
                "brightness",
                "contrast",
                "saturation",
                "exposure",
                "wb"
            ]
        );

        let back = DatasetMetadata::read(&path).unwrap();
        assert!(back.date.is_some());
        assert_eq!(back.filters().unwrap(), vec![Filter::Grey, Filter::Resize]);
        assert_eq!(back.wb, Some(4600.0));
    }
}
