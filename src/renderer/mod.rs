/// 显示与交互系统 (Display & Interaction)
///
/// 标注引擎只通过 [`Interaction`] 与用户打交道:
/// - WindowUi:  macroquad 窗口, 引擎在工作线程, 窗口在主线程
/// - ConsoleUi: 无窗口模式, 选区与类别名从终端输入
/// - Overlay:   在帧上绘制已有标签、跟踪框与帧号
pub mod console;
pub mod overlay;
pub mod window;

pub use console::ConsoleUi;
pub use overlay::Overlay;
pub use window::{WindowHandle, WindowUi};

use std::time::Duration;

use anyhow::Result;
use image::RgbImage;

use crate::geometry::Roi;

/// 交互命令, 按键只在边界处解码一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    Pause,
    Add,
    Delete,
    Cancel,
    SlowDown,
    Normal,
    SpeedUp,
}

impl Command {
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'q' => Some(Command::Quit),
            ' ' => Some(Command::Pause),
            'a' => Some(Command::Add),
            'r' => Some(Command::Delete),
            'c' => Some(Command::Cancel),
            '1' => Some(Command::SlowDown),
            '2' => Some(Command::Normal),
            '3' => Some(Command::SpeedUp),
            _ => None,
        }
    }
}

/// 显示/输入协作方接口
pub trait Interaction {
    /// 显示一帧 (已绘制标注)
    fn show(&mut self, frame: &RgbImage) -> Result<()>;

    /// 等待按键命令, 超时返回 `None`
    fn poll_command(&mut self, timeout: Duration) -> Option<Command>;

    /// 暂停, 直到任意按键
    fn wait_key(&mut self);

    /// 交互式框选, 用户取消时返回空选区
    fn select_roi(&mut self, frame: &RgbImage) -> Result<Roi>;

    /// 同步请求一行文本 (类别名)
    fn ask_line(&mut self, message: &str) -> Result<String>;
}
