//! 图片目录帧源

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::RgbImage;

use super::FrameSource;

pub struct DirectorySource {
    files: Vec<PathBuf>,
    next: usize,
}

impl DirectorySource {
    /// 枚举目录下的 `*.jpg`, 按文件名排序
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            bail!("帧目录不存在: {}", dir.display());
        }

        let mut files = Vec::new();
        for entry in
            fs::read_dir(dir).with_context(|| format!("读取帧目录失败: {}", dir.display()))?
        {
            let path = entry?.path();
            let is_jpg = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg"));
            if is_jpg && path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            log::warn!("⚠️ 帧目录中没有 jpg 图片: {}", dir.display());
        } else {
            log::info!("📂 帧目录: {} ({} 帧)", dir.display(), files.len());
        }
        Ok(Self { files, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for DirectorySource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        let frame = image::open(path)
            .with_context(|| format!("解码图片失败: {}", path.display()))?
            .to_rgb8();
        Ok(Some(frame))
    }
}
