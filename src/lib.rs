#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod app; // 启动流程
pub mod classes; // 类别列表
pub mod config; // 配置文件与命令行参数
pub mod controller; // 播放与帧范围控制
pub mod deletion; // IOU 删除策略
pub mod geometry; // 坐标转换
pub mod input; // 帧输入系统
pub mod label_store; // 标签文件读写
pub mod layout; // 输出目录布局
pub mod renderer; // 显示与交互
pub mod session; // 跟踪会话状态机
pub mod tracker; // 单目标跟踪器

pub use crate::classes::{ClassList, ClassListError};
pub use crate::config::{Args, LabelerConfig};
pub use crate::controller::{Controller, FrameRange, FrameRangeError, PlaybackOptions, RunSummary};
pub use crate::geometry::{Extent, Roi, YoloBox};
pub use crate::label_store::{LabelLine, LabelStore};
pub use crate::layout::OutputLayout;
pub use crate::renderer::{Command, Interaction};
pub use crate::session::{Mode, Purpose, TrackingSession};
pub use crate::tracker::{Tracker, TrackerFactory};
