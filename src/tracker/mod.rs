/// 单目标跟踪器 (Single Object Tracker)
///
/// 跟踪算法本身是可替换的能力, 标注引擎只依赖 [`Tracker`] 接口:
/// - init:   用首帧和选区初始化
/// - update: 在新帧中定位目标, 返回 `None` 表示丢失
///
/// 跟踪器内部状态没有可靠的重置语义, 所以每次开始新的跟踪
/// 都通过 [`TrackerFactory`] 创建新实例.
pub mod template;

pub use template::TemplateTracker;

use anyhow::Result;
use image::RgbImage;

use crate::geometry::Roi;

/// 单目标跟踪器 Trait
pub trait Tracker: Send {
    /// 用当前帧和选区初始化跟踪
    fn init(&mut self, frame: &RgbImage, roi: &Roi) -> Result<()>;

    /// 更新跟踪器
    ///
    /// # 返回
    /// 目标的新位置, 丢失时为 `None`
    fn update(&mut self, frame: &RgbImage) -> Option<Roi>;
}

/// 跟踪器工厂, 每次调用返回全新实例
pub type TrackerFactory = Box<dyn Fn() -> Box<dyn Tracker> + Send>;

/// 模板匹配跟踪器工厂
pub fn template_factory(search_scale: f32, max_error: f32) -> TrackerFactory {
    Box::new(move || Box::new(TemplateTracker::new(search_scale, max_error)))
}
