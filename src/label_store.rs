//! 标签存储 (Label Store)
//!
//! 每帧一个 `NNNNNN.txt`, 每行 `<class_id> <cx> <cy> <w> <h>`.
//! 追加写入不去重; 重写通过临时文件 + rename 完成, 进程中断不会留下半写文件.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tempfile::NamedTempFile;

use crate::geometry::{normalized_to_extent, Extent, YoloBox};
use crate::layout::OutputLayout;

/// 标签行
#[derive(Debug, Clone, PartialEq)]
pub struct LabelLine {
    pub class_id: usize,
    pub bbox: YoloBox,
    // 文件中的原始文本 (不含换行), 重写时原样保留
    raw: String,
}

impl LabelLine {
    pub fn new(class_id: usize, bbox: YoloBox) -> Self {
        let raw = format!(
            "{} {:?} {:?} {:?} {:?}",
            class_id, bbox.cx, bbox.cy, bbox.w, bbox.h
        );
        Self {
            class_id,
            bbox,
            raw,
        }
    }

    pub fn parse(line: &str) -> Result<Self> {
        let raw = line.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = raw.split_whitespace().collect();
        if fields.len() != 5 {
            bail!("标签行需要5个字段, 实际 {}: `{}`", fields.len(), raw);
        }
        let class_id = fields[0]
            .parse::<usize>()
            .with_context(|| format!("类别ID无效: `{}`", fields[0]))?;
        let mut values = [0.0f64; 4];
        for (value, field) in values.iter_mut().zip(&fields[1..]) {
            *value = field
                .parse::<f64>()
                .with_context(|| format!("坐标无效: `{}`", field))?;
        }
        Ok(Self {
            class_id,
            bbox: YoloBox::new(values[0], values[1], values[2], values[3]),
            raw: raw.to_string(),
        })
    }

    pub fn text(&self) -> &str {
        &self.raw
    }

    pub fn extent(&self, frame_w: u32, frame_h: u32) -> Extent {
        normalized_to_extent(&self.bbox, frame_w, frame_h)
    }
}

pub struct LabelStore {
    layout: OutputLayout,
}

impl LabelStore {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// 读取标签, 文件不存在或为空时返回空列表
    pub fn read(&self, frame_id: u32) -> Result<Vec<LabelLine>> {
        let path = self.layout.label_path(frame_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("读取标签文件失败: {}", path.display()))?;
        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                LabelLine::parse(line)
                    .with_context(|| format!("{} 第{}行格式错误", path.display(), i + 1))
            })
            .collect()
    }

    /// 载入帧时的维护: 删除零字节标签文件, 再读取
    pub fn load_frame(&self, frame_id: u32) -> Result<Vec<LabelLine>> {
        let path = self.layout.label_path(frame_id);
        if let Ok(meta) = fs::metadata(&path) {
            if meta.len() == 0 {
                fs::remove_file(&path)
                    .with_context(|| format!("删除空标签文件失败: {}", path.display()))?;
                log::debug!("🧹 删除空标签文件: {}", path.display());
                return Ok(Vec::new());
            }
        }
        self.read(frame_id)
    }

    /// 追加一行, 文件不存在时创建
    pub fn append(&self, frame_id: u32, class_id: usize, bbox: &YoloBox) -> Result<LabelLine> {
        let path = self.layout.label_path(frame_id);
        let line = LabelLine::new(class_id, *bbox);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("打开标签文件失败: {}", path.display()))?;
        file.write_all(format!("{}\n", line.text()).as_bytes())
            .with_context(|| format!("写入标签文件失败: {}", path.display()))?;
        Ok(line)
    }

    /// 用保留行原子替换文件内容; 没有保留行时删除文件
    pub fn rewrite_or_delete(&self, frame_id: u32, surviving: &[LabelLine]) -> Result<()> {
        let path = self.layout.label_path(frame_id);
        if surviving.is_empty() {
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("删除标签文件失败: {}", path.display()))?;
            }
            return Ok(());
        }
        write_atomic(&path, surviving)
    }
}

fn write_atomic(path: &Path, lines: &[LabelLine]) -> Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("标签路径没有父目录: {}", path.display()))?;
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("创建临时文件失败: {}", dir.display()))?;
    // 临时文件默认 0600, 沿用原文件权限
    if let Ok(meta) = fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .with_context(|| format!("设置文件权限失败: {}", path.display()))?;
    }
    for line in lines {
        writeln!(tmp, "{}", line.text())?;
    }
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("替换标签文件失败: {}", path.display()))?;
    Ok(())
}
