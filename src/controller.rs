//! 播放与帧范围控制 (Playback / Frame-Range Controller)
//!
//! 外层循环: 逐帧读取 → 保存原始帧 → 帧范围判断 → 缩放到工作分辨率
//! → 绘制已有标签 → 分发命令 → 跟踪会话更新 → 显示.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use image::RgbImage;
use thiserror::Error;

use crate::classes::ClassList;
use crate::input::{resize_frame, FrameSource};
use crate::label_store::LabelStore;
use crate::renderer::{Command, Interaction, Overlay};
use crate::session::{FrameContext, Purpose, StepOutcome, TrackingSession};

const RANGE_HELP: &str = "支持: 起始帧 >= 2, 结束帧 -1 表示到结尾\n\
                          示例: [2, 100]\n\
                          示例: [2, -1]\n\
                          示例: [10, -1]";

/// 帧范围校验错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameRangeError {
    #[error("frame_range 无效: 起始帧 {0} < 2\n{}", RANGE_HELP)]
    StartTooSmall(i64),
    #[error("frame_range 无效: 结束帧 {end} 不大于起始帧 {start}\n{}", RANGE_HELP)]
    EndNotAfterStart { start: i64, end: i64 },
    #[error("frame_range 无效: 结束帧 {0} <= 2\n{}", RANGE_HELP)]
    EndTooSmall(i64),
    #[error("frame_range 无效: 帧号 {0} 超出范围\n{}", RANGE_HELP)]
    OutOfRange(i64),
}

/// 帧在范围中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePosition {
    /// 起始帧之前, 跳过
    Before,
    /// 起始帧前一帧, 预览并等待按键
    Preview,
    /// 起始帧, 应用启动模式
    Start,
    Inside,
    /// 超过结束帧, 结束会话
    After,
}

/// 标注帧范围, `end = None` 表示到序列结尾
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRange {
    pub start: u32,
    pub end: Option<u32>,
}

impl FrameRange {
    /// 校验配置中的 `[start, end]`, `end = -1` 表示不限
    pub fn validate(start: i64, end: i64) -> Result<Self, FrameRangeError> {
        if start < 2 {
            return Err(FrameRangeError::StartTooSmall(start));
        }
        if end != -1 {
            if start >= end {
                return Err(FrameRangeError::EndNotAfterStart { start, end });
            }
            if end <= 2 {
                return Err(FrameRangeError::EndTooSmall(end));
            }
        }
        let start = u32::try_from(start).map_err(|_| FrameRangeError::OutOfRange(start))?;
        let end = match end {
            -1 => None,
            end => Some(u32::try_from(end).map_err(|_| FrameRangeError::OutOfRange(end))?),
        };
        Ok(Self { start, end })
    }

    pub fn classify(&self, frame_id: u32) -> RangePosition {
        if frame_id + 1 == self.start {
            RangePosition::Preview
        } else if frame_id < self.start {
            RangePosition::Before
        } else if self.end.is_some_and(|end| frame_id > end) {
            RangePosition::After
        } else if frame_id == self.start {
            RangePosition::Start
        } else {
            RangePosition::Inside
        }
    }
}

/// 每帧等待按键的时长, 同时决定播放速度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSpeed {
    wait_ms: u64,
}

impl PlaybackSpeed {
    pub const MIN_MS: u64 = 1;
    pub const MAX_MS: u64 = 1000;

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    pub fn wait_ms(&self) -> u64 {
        self.wait_ms
    }

    /// 处理速度命令, 其他命令返回 `false`
    pub fn apply(&mut self, command: Command) -> bool {
        self.wait_ms = match command {
            Command::SlowDown => (self.wait_ms * 10).min(Self::MAX_MS),
            Command::Normal => Self::MIN_MS,
            Command::SpeedUp => (self.wait_ms / 10).max(Self::MIN_MS),
            _ => return false,
        };
        true
    }
}

impl Default for PlaybackSpeed {
    fn default() -> Self {
        Self {
            wait_ms: Self::MIN_MS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackOptions {
    pub frame_range: Option<FrameRange>,
    /// 起始帧自动执行的命令 (Add / Delete / Pause)
    pub start_mode: Option<Command>,
    /// 把读到的原始帧保存为 `NNNNNN.jpg` (已存在则跳过)
    pub save_frames: bool,
    pub working_size: (u32, u32),
    pub font_path: Option<PathBuf>,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            frame_range: None,
            start_mode: None,
            save_frames: true,
            working_size: (1366, 768),
            font_path: None,
        }
    }
}

/// 运行统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// 读取的帧数 (含跳过的帧)
    pub frames_read: u32,
    /// 实际处理 (显示/跟踪) 的帧数
    pub frames_processed: u32,
    pub lines_written: usize,
    pub lines_removed: usize,
    /// 用户按 q 退出
    pub quit: bool,
}

pub struct Controller<'a> {
    source: &'a mut dyn FrameSource,
    ui: &'a mut dyn Interaction,
    store: LabelStore,
    classes: ClassList,
    session: TrackingSession,
    overlay: Overlay,
    options: PlaybackOptions,
    speed: PlaybackSpeed,
}

impl<'a> Controller<'a> {
    pub fn new(
        source: &'a mut dyn FrameSource,
        ui: &'a mut dyn Interaction,
        store: LabelStore,
        classes: ClassList,
        session: TrackingSession,
        options: PlaybackOptions,
    ) -> Self {
        let overlay = Overlay::new(options.font_path.as_deref());
        Self {
            source,
            ui,
            store,
            classes,
            session,
            overlay,
            options,
            speed: PlaybackSpeed::default(),
        }
    }

    pub fn speed(&self) -> PlaybackSpeed {
        self.speed
    }

    pub fn session(&self) -> &TrackingSession {
        &self.session
    }

    /// 运行到序列结束, 超出结束帧或用户退出
    pub fn run(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let mut frame_id = 0u32;

        while let Some(raw) = self.source.next_frame()? {
            frame_id += 1;
            summary.frames_read = frame_id;

            if self.options.save_frames {
                self.save_frame(frame_id, &raw)?;
            }

            let position = match self.options.frame_range {
                Some(range) => range.classify(frame_id),
                None => RangePosition::Inside,
            };
            match position {
                RangePosition::Before => continue,
                RangePosition::After => {
                    log::info!("🏁 已超过结束帧, 停止于帧 {}", frame_id);
                    break;
                }
                _ => {}
            }

            let (w, h) = self.options.working_size;
            let frame = resize_frame(&raw, w, h)?;

            if position == RangePosition::Preview {
                let mut preview = frame.clone();
                self.overlay.draw_frame_id(&mut preview, frame_id);
                self.ui.show(&preview)?;
                log::info!("⏸️ 预览帧 {}, 按任意键开始", frame_id);
                self.ui.wait_key();
            }

            summary.frames_processed += 1;
            if !self.process_frame(frame_id, &frame, position, &mut summary)? {
                log::info!("👋 用户退出, 帧 {}", frame_id);
                summary.quit = true;
                break;
            }
        }

        log::info!(
            "✅ 结束: 读取 {} 帧, 处理 {} 帧, 写入 {} 行, 删除 {} 行",
            summary.frames_read,
            summary.frames_processed,
            summary.lines_written,
            summary.lines_removed
        );
        Ok(summary)
    }

    fn save_frame(&self, frame_id: u32, raw: &RgbImage) -> Result<()> {
        let path = self.store.layout().image_path(frame_id);
        if !path.exists() {
            raw.save(&path)
                .with_context(|| format!("保存帧失败: {}", path.display()))?;
        }
        Ok(())
    }

    /// 处理一帧, 返回 `false` 表示退出
    fn process_frame(
        &mut self,
        frame_id: u32,
        frame: &RgbImage,
        position: RangePosition,
        summary: &mut RunSummary,
    ) -> Result<bool> {
        let labels = self.store.load_frame(frame_id)?;
        let mut canvas = frame.clone();
        self.overlay.draw_frame_id(&mut canvas, frame_id);
        self.overlay.draw_labels(&mut canvas, &labels, &self.classes);

        // 启动模式只在起始帧生效一次
        let start_command = if position == RangePosition::Start {
            self.options.start_mode.take()
        } else {
            None
        };
        let polled = self.ui.poll_command(self.speed.wait());
        let command = resolve_command(polled, start_command);

        match command {
            Some(Command::Quit) => return Ok(false),
            Some(Command::Pause) => self.ui.wait_key(),
            Some(Command::Add) => {
                self.session
                    .begin(Purpose::Add, frame, &canvas, &self.classes, &mut *self.ui)?;
            }
            Some(Command::Delete) => {
                self.session
                    .begin(Purpose::Delete, frame, &canvas, &self.classes, &mut *self.ui)?;
            }
            Some(Command::Cancel) => self.session.cancel(),
            Some(speed @ (Command::SlowDown | Command::Normal | Command::SpeedUp)) => {
                self.speed.apply(speed);
                log::info!("⏱️ 每帧等待 {} ms", self.speed.wait_ms());
            }
            None => {}
        }

        let outcome = self.session.step(&FrameContext {
            frame_id,
            frame,
            store: &self.store,
            classes: &self.classes,
        })?;
        match &outcome {
            StepOutcome::Added { extent, line } => {
                self.overlay
                    .draw_track(&mut canvas, extent, self.session.caption());
                if line.is_some() {
                    summary.lines_written += 1;
                }
            }
            StepOutcome::Deleted { extent, removed } => {
                self.overlay
                    .draw_track(&mut canvas, extent, self.session.caption());
                summary.lines_removed += removed;
            }
            StepOutcome::Idle | StepOutcome::Lost | StepOutcome::Degenerate(_) => {}
        }

        self.ui.show(&canvas)?;
        if start_command == Some(Command::Pause) {
            self.ui.wait_key();
        }
        Ok(true)
    }
}

/// 合并按键与启动模式
///
/// 优先级: q / 空格 → a (按键或启动模式) → c / 1 / 2 / 3 → r (按键或启动模式).
/// 空格启动模式不在这里处理, 显示之后才暂停.
fn resolve_command(polled: Option<Command>, start: Option<Command>) -> Option<Command> {
    match (polled, start) {
        (Some(Command::Quit | Command::Pause | Command::Add), _) => polled,
        (_, Some(Command::Add)) => Some(Command::Add),
        (Some(_), _) => polled,
        (None, Some(Command::Delete)) => Some(Command::Delete),
        (None, _) => None,
    }
}
