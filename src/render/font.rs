// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 标注字体: `<config dir>/Ultralytics/Arial.ttf`, 首次使用时下载

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use ab_glyph::FontVec;
use once_cell::sync::Lazy;

use crate::error::{Error, Result};

pub const FONT_URL: &str = "https://ultralytics.com/assets/Arial.ttf";
pub const FONT_NAME: &str = "Arial.ttf";

static FONT: Lazy<Option<FontVec>> = Lazy::new(|| {
    let path = font_path()?;
    let font = if path.is_file() {
        load_font(&path)
    } else {
        download(FONT_URL, &path).and_then(|_| load_font(&path))
    };
    match font {
        Ok(font) => Some(font),
        Err(e) => {
            log::warn!("⚠️ 字体不可用, 不绘制标签文字: {}", e);
            None
        }
    }
});

/// 进程内缓存的默认字体
pub fn default_font() -> Option<&'static FontVec> {
    FONT.as_ref()
}

pub fn font_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("Ultralytics").join(FONT_NAME))
}

pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = fs::read(path)?;
    FontVec::try_from_vec(bytes)
        .map_err(|e| Error::Parse(format!("{}: {}", path.display(), e)).logged())
}

fn download(url: &str, path: &Path) -> Result<()> {
    log::info!("⬇️ 下载字体 {} → {}", url, path.display());
    let response = ureq::get(url)
        .call()
        .map_err(|e| io::Error::other(e.to_string()))?;
    let mut buf = Vec::new();
    response.into_reader().read_to_end(&mut buf)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_font_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(FONT_NAME);
        fs::write(&path, b"not a font").unwrap();
        assert!(matches!(load_font(&path), Err(Error::Parse(_))));
        assert!(load_font(&tmp.path().join("missing.ttf")).is_err());
    }
}
