//! IOU 删除策略 (IOU Deletion Policy)
//!
//! 与删除框有任何重叠 (iou > 0) 的已存标签都会被删除, 不设阈值;
//! 启用类别过滤时只删除对应类别.

use anyhow::Result;

use crate::classes::ClassList;
use crate::geometry::Extent;
use crate::label_store::{LabelLine, LabelStore};

/// 单次删除的查询条件
#[derive(Debug, Clone, Copy)]
pub struct DeleteQuery<'a> {
    /// 删除框 (已裁剪到画面内)
    pub region: Extent,
    /// 类别过滤 (`delete_one_class` 启用时)
    pub class_filter: Option<&'a str>,
}

/// 判断一行标签是否应被删除
pub fn should_remove(
    line: &LabelLine,
    query: &DeleteQuery<'_>,
    classes: &ClassList,
    frame_w: u32,
    frame_h: u32,
) -> bool {
    let iou = query.region.iou(&line.extent(frame_w, frame_h));
    if iou <= 0.0 {
        return false;
    }
    match query.class_filter {
        Some(name) => classes.name_of(line.class_id) == Some(name),
        None => true,
    }
}

/// 返回保留的标签行 (保持原顺序) 与被删除的行数
pub fn surviving_lines(
    lines: &[LabelLine],
    query: &DeleteQuery<'_>,
    classes: &ClassList,
    frame_w: u32,
    frame_h: u32,
) -> (Vec<LabelLine>, usize) {
    let survivors: Vec<LabelLine> = lines
        .iter()
        .filter(|line| !should_remove(line, query, classes, frame_w, frame_h))
        .cloned()
        .collect();
    let removed = lines.len() - survivors.len();
    (survivors, removed)
}

/// 对一帧执行删除, 返回删除行数
///
/// 没有标签文件或没有命中时不改动文件
pub fn apply(
    store: &LabelStore,
    frame_id: u32,
    query: &DeleteQuery<'_>,
    classes: &ClassList,
    frame_w: u32,
    frame_h: u32,
) -> Result<usize> {
    if !store.layout().label_path(frame_id).exists() {
        return Ok(0);
    }
    let lines = store.read(frame_id)?;
    let (survivors, removed) = surviving_lines(&lines, query, classes, frame_w, frame_h);
    if removed > 0 {
        store.rewrite_or_delete(frame_id, &survivors)?;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{extent_to_normalized, YoloBox};
    use crate::layout::OutputLayout;
    use std::fs;

    const W: u32 = 1366;
    const H: u32 = 768;

    fn classes() -> ClassList {
        ClassList::from_names(["car", "person"]).unwrap()
    }

    fn boxed(xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> YoloBox {
        extent_to_normalized(&Extent::new(xmin, ymin, xmax, ymax), W, H)
    }

    fn seeded_store() -> (tempfile::TempDir, LabelStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LabelStore::new(OutputLayout::at(dir.path(), "seq"));
        store.append(5, 0, &boxed(100, 100, 150, 150)).unwrap();
        store.append(5, 1, &boxed(600, 300, 700, 500)).unwrap();
        (dir, store)
    }

    #[test]
    fn test_delete_only_touched_box() {
        let (_dir, store) = seeded_store();
        let query = DeleteQuery {
            region: Extent::new(90, 90, 160, 160),
            class_filter: None,
        };
        assert_eq!(apply(&store, 5, &query, &classes(), W, H).unwrap(), 1);

        let lines = store.read(5).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].class_id, 1);
    }

    #[test]
    fn test_partial_overlap_removes() {
        let (_dir, store) = seeded_store();
        // 只擦到一个角
        let query = DeleteQuery {
            region: Extent::new(140, 140, 400, 400),
            class_filter: None,
        };
        assert_eq!(apply(&store, 5, &query, &classes(), W, H).unwrap(), 1);
    }

    #[test]
    fn test_no_overlap_keeps_file_byte_identical() {
        let (_dir, store) = seeded_store();
        let path = store.layout().label_path(5);
        let before = fs::read(&path).unwrap();

        let query = DeleteQuery {
            region: Extent::new(1000, 600, 1100, 700),
            class_filter: None,
        };
        assert_eq!(apply(&store, 5, &query, &classes(), W, H).unwrap(), 0);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_cover_all_removes_file() {
        let (_dir, store) = seeded_store();
        let query = DeleteQuery {
            region: Extent::new(0, 0, W as i32 - 1, H as i32 - 1),
            class_filter: None,
        };
        assert_eq!(apply(&store, 5, &query, &classes(), W, H).unwrap(), 2);
        assert!(!store.layout().label_path(5).exists());
    }

    #[test]
    fn test_class_filter() {
        let (_dir, store) = seeded_store();
        let query = DeleteQuery {
            region: Extent::new(0, 0, W as i32 - 1, H as i32 - 1),
            class_filter: Some("person"),
        };
        assert_eq!(apply(&store, 5, &query, &classes(), W, H).unwrap(), 1);
        let lines = store.read(5).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].class_id, 0);
    }

    #[test]
    fn test_missing_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = LabelStore::new(OutputLayout::at(dir.path(), "seq"));
        let query = DeleteQuery {
            region: Extent::new(0, 0, 10, 10),
            class_filter: None,
        };
        assert_eq!(apply(&store, 1, &query, &classes(), W, H).unwrap(), 0);
        assert!(!store.layout().label_path(1).exists());
    }
}
