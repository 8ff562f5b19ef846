//! 类别列表 (Class List)
//!
//! 每行一个类别名, 行号即类别ID, 会话期间不可变

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassListError {
    #[error("`classes_file` 不存在: {0}")]
    Missing(PathBuf),
    #[error("读取类别文件失败 {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("类别文件为空: {0}")]
    Empty(PathBuf),
    #[error("类别名重复: `{0}`")]
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassList {
    names: Vec<String>,
}

impl ClassList {
    /// 从文件加载类别列表
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ClassListError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ClassListError::Missing(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(|source| ClassListError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|e| match e {
            ClassListError::Empty(_) => ClassListError::Empty(path.to_path_buf()),
            other => other,
        })
    }

    /// 解析文本: 去掉首尾空白, 跳过空行
    pub fn parse(text: &str) -> Result<Self, ClassListError> {
        let names: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self::from_names(names)
    }

    pub fn from_names<I, S>(names: I) -> Result<Self, ClassListError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if list.contains(&name) {
                return Err(ClassListError::Duplicate(name));
            }
            list.push(name);
        }
        if list.is_empty() {
            return Err(ClassListError::Empty(PathBuf::new()));
        }
        Ok(Self { names: list })
    }

    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn name_of(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.id_of(name).is_some()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl fmt::Display for ClassList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_blank_lines() {
        let list = ClassList::parse("car\n\n  person \r\nbike\n").unwrap();
        assert_eq!(list.names(), &["car", "person", "bike"]);
        assert_eq!(list.id_of("person"), Some(1));
        assert_eq!(list.name_of(2), Some("bike"));
        assert_eq!(list.id_of("truck"), None);
        assert_eq!(list.to_string(), "car person bike");
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = ClassList::parse("car\nperson\ncar\n").unwrap_err();
        assert!(matches!(err, ClassListError::Duplicate(name) if name == "car"));
    }

    #[test]
    fn test_load_missing_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.names");
        assert!(matches!(
            ClassList::load(&missing),
            Err(ClassListError::Missing(_))
        ));

        let empty = dir.path().join("empty.names");
        fs::write(&empty, "\n  \n").unwrap();
        assert!(matches!(ClassList::load(&empty), Err(ClassListError::Empty(_))));
    }
}
