//! 输出目录布局 (Output Layout)
//!
//! 每个输入序列一个目录, 目录内 `NNNNNN.jpg` / `NNNNNN.txt` 成对出现,
//! 外加一份重命名为 `<输入文件名>.names` 的类别文件

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};

/// 帧文件名位数
pub const FRAME_ID_WIDTH: usize = 6;

#[derive(Debug, Clone)]
pub struct OutputLayout {
    dir: PathBuf,
    stem: String,
}

impl OutputLayout {
    /// `output_dir / <输入路径的父目录> / <输入文件名(无扩展名)>`
    ///
    /// 只保留父目录中的普通组件, 绝对路径和 `./`、`../` 不会跳出 `output_dir`
    pub fn resolve(output_dir: &Path, input_path: &Path) -> Result<Self> {
        let stem = input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .with_context(|| format!("无法从输入路径取得文件名: {}", input_path.display()))?
            .to_string();

        let mut dir = output_dir.to_path_buf();
        if let Some(parent) = input_path.parent() {
            for component in parent.components() {
                if let Component::Normal(part) = component {
                    dir.push(part);
                }
            }
        }
        dir.push(&stem);

        Ok(Self { dir, stem })
    }

    /// 直接使用已知目录 (测试或已有数据集)
    pub fn at<P: Into<PathBuf>>(dir: P, stem: &str) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    pub fn frame_stem(frame_id: u32) -> String {
        format!("{:0width$}", frame_id, width = FRAME_ID_WIDTH)
    }

    pub fn image_path(&self, frame_id: u32) -> PathBuf {
        self.dir.join(format!("{}.jpg", Self::frame_stem(frame_id)))
    }

    pub fn label_path(&self, frame_id: u32) -> PathBuf {
        self.dir.join(format!("{}.txt", Self::frame_stem(frame_id)))
    }

    pub fn class_file_path(&self) -> PathBuf {
        self.dir.join(format!("{}.names", self.stem))
    }

    /// 创建目录, 返回目录在调用前是否已经存在
    pub fn prepare(&self) -> Result<bool> {
        let existed = self.exists();
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("创建输出目录失败: {}", self.dir.display()))?;
        Ok(existed)
    }

    /// 删除标注审核工具 (如 DarkMark) 自动生成的 json 文件
    pub fn remove_json_files(&self) -> Result<usize> {
        let mut removed = 0;
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("读取输出目录失败: {}", self.dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            let is_json = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(".json"));
            if is_json && path.is_file() {
                fs::remove_file(&path)
                    .with_context(|| format!("删除失败: {}", path.display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// 复制类别文件到输出目录, 覆盖旧副本
    pub fn install_class_file(&self, classes_file: &Path) -> Result<PathBuf> {
        let target = self.class_file_path();
        if target.exists() {
            fs::remove_file(&target)
                .with_context(|| format!("删除旧类别文件失败: {}", target.display()))?;
        }
        fs::copy(classes_file, &target).with_context(|| {
            format!(
                "复制类别文件失败: {} → {}",
                classes_file.display(),
                target.display()
            )
        })?;
        Ok(target)
    }
}
