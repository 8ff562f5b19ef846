/// 帧输入系统 (Frame Input)
///
/// 标注引擎只依赖 [`FrameSource`]:
/// - DirectorySource: 已抽好帧的图片目录 (`*.jpg`, 按文件名排序)
/// - VideoSource:     视频容器解码 (ffmpeg 工作线程, 需要 `video` 功能)
/// - VecSource:       内存帧序列
/// - resize:          缩放到工作分辨率
pub mod directory;
pub mod resize;
#[cfg(feature = "video")]
pub mod video;

pub use directory::DirectorySource;
pub use resize::resize_frame;
#[cfg(feature = "video")]
pub use video::VideoSource;

use std::collections::VecDeque;

use anyhow::Result;
use image::RgbImage;

/// 帧源 Trait
pub trait FrameSource: Send {
    /// 取下一帧, 序列结束时返回 `None`
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

/// 内存帧序列
#[derive(Default)]
pub struct VecSource {
    frames: VecDeque<RgbImage>,
}

impl VecSource {
    pub fn new<I: IntoIterator<Item = RgbImage>>(frames: I) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for VecSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.frames.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_source_order() {
        let mut source = VecSource::new((1..=3).map(|w| RgbImage::new(w, 1)));
        assert_eq!(source.remaining(), 3);
        for w in 1..=3 {
            assert_eq!(source.next_frame().unwrap().unwrap().width(), w);
        }
        assert!(source.next_frame().unwrap().is_none());
    }
}
