//! macroquad 窗口 (Window UI)
//!
//! 线程模型:
//! 1. 工作线程: 标注引擎, 持有 [`WindowUi`], 通过通道发送显示/框选请求
//! 2. 主线程:   macroquad 事件循环 [`run_window`], 回传按键与框选结果

use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use image::{DynamicImage, RgbImage};
use macroquad::prelude::*;

use super::console::prompt_line;
use super::{Command, Interaction};
use crate::geometry::Roi;

/// 引擎 → 窗口
pub enum UiRequest {
    Show(RgbImage),
    SelectRoi(RgbImage),
    Close,
}

/// 窗口 → 引擎
#[derive(Debug, Clone, Copy)]
pub enum UiEvent {
    Key(char),
    Roi(Roi),
}

/// 引擎侧句柄
pub struct WindowUi {
    requests: Sender<UiRequest>,
    events: Receiver<UiEvent>,
}

/// 窗口侧句柄
pub struct WindowHandle {
    requests: Receiver<UiRequest>,
    events: Sender<UiEvent>,
}

/// 创建一对通道两端
pub fn channel() -> (WindowUi, WindowHandle) {
    // 显示队列很短, 播放速度受渲染速度约束
    let (req_tx, req_rx) = crossbeam_channel::bounded(2);
    let (evt_tx, evt_rx) = crossbeam_channel::unbounded();
    (
        WindowUi {
            requests: req_tx,
            events: evt_rx,
        },
        WindowHandle {
            requests: req_rx,
            events: evt_tx,
        },
    )
}

impl WindowUi {
    /// 通知窗口退出
    pub fn close(&self) {
        let _ = self.requests.send(UiRequest::Close);
    }
}

impl Interaction for WindowUi {
    fn show(&mut self, frame: &RgbImage) -> Result<()> {
        if self.requests.send(UiRequest::Show(frame.clone())).is_err() {
            bail!("窗口已关闭");
        }
        Ok(())
    }

    fn poll_command(&mut self, timeout: Duration) -> Option<Command> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                // 非命令按键同样结束本次等待
                Ok(UiEvent::Key(key)) => return Command::from_key(key),
                Ok(UiEvent::Roi(_)) => continue,
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => return Some(Command::Quit),
            }
        }
    }

    fn wait_key(&mut self) {
        loop {
            match self.events.recv() {
                Ok(UiEvent::Key(_)) | Err(_) => return,
                Ok(UiEvent::Roi(_)) => continue,
            }
        }
    }

    fn select_roi(&mut self, frame: &RgbImage) -> Result<Roi> {
        if self.requests.send(UiRequest::SelectRoi(frame.clone())).is_err() {
            bail!("窗口已关闭");
        }
        loop {
            match self.events.recv() {
                Ok(UiEvent::Roi(roi)) => return Ok(roi),
                Ok(UiEvent::Key(_)) => continue,
                Err(_) => bail!("窗口已关闭"),
            }
        }
    }

    fn ask_line(&mut self, message: &str) -> Result<String> {
        prompt_line(message)
    }
}

/// 窗口配置
pub fn window_conf(title: &str, width: u32, height: u32) -> Conf {
    Conf {
        window_title: title.to_string(),
        window_width: width as i32,
        window_height: height as i32,
        high_dpi: false,
        ..Default::default()
    }
}

struct ShownFrame {
    texture: Texture2D,
    width: f32,
    height: f32,
}

impl ShownFrame {
    fn new(frame: &RgbImage) -> Self {
        let (w, h) = frame.dimensions();
        let rgba = DynamicImage::ImageRgb8(frame.clone()).to_rgba8();
        let texture = Texture2D::from_rgba8(w as u16, h as u16, rgba.as_raw());
        texture.set_filter(FilterMode::Linear);
        Self {
            texture,
            width: w as f32,
            height: h as f32,
        }
    }

    /// 等比缩放居中: (缩放比例, 左上角偏移)
    fn placement(&self) -> (f32, Vec2) {
        let scale = (screen_width() / self.width).min(screen_height() / self.height);
        let offset = vec2(
            (screen_width() - self.width * scale) / 2.0,
            (screen_height() - self.height * scale) / 2.0,
        );
        (scale, offset)
    }

    /// 屏幕坐标 → 帧像素坐标
    fn to_frame(&self, screen: Vec2) -> Vec2 {
        let (scale, offset) = self.placement();
        let p = (screen - offset) / scale;
        vec2(p.x.clamp(0.0, self.width), p.y.clamp(0.0, self.height))
    }

    fn draw(&self) {
        let (scale, offset) = self.placement();
        draw_texture_ex(
            &self.texture,
            offset.x,
            offset.y,
            WHITE,
            DrawTextureParams {
                dest_size: Some(vec2(self.width * scale, self.height * scale)),
                ..Default::default()
            },
        );
    }
}

/// 框选状态
#[derive(Default)]
struct Selection {
    active: bool,
    start: Option<Vec2>,
    end: Option<Vec2>,
}

impl Selection {
    fn begin(&mut self) {
        *self = Selection {
            active: true,
            ..Default::default()
        };
    }

    /// 帧坐标下的选区
    fn roi(&self, frame: &ShownFrame) -> Roi {
        match (self.start, self.end) {
            (Some(a), Some(b)) => {
                let (a, b) = (frame.to_frame(a), frame.to_frame(b));
                let min = a.min(b);
                let size = (a - b).abs();
                Roi::new(min.x as f64, min.y as f64, size.x as f64, size.y as f64)
            }
            _ => Roi::default(),
        }
    }
}

/// 主线程窗口循环, 收到 `Close` 或引擎端断开时返回
pub async fn run_window(handle: WindowHandle) {
    let mut shown: Option<ShownFrame> = None;
    let mut selection = Selection::default();

    loop {
        loop {
            match handle.requests.try_recv() {
                Ok(UiRequest::Show(frame)) => shown = Some(ShownFrame::new(&frame)),
                Ok(UiRequest::SelectRoi(frame)) => {
                    shown = Some(ShownFrame::new(&frame));
                    selection.begin();
                }
                Ok(UiRequest::Close) | Err(TryRecvError::Disconnected) => return,
                Err(TryRecvError::Empty) => break,
            }
        }

        clear_background(BLACK);
        if let Some(frame) = &shown {
            frame.draw();
        }

        if selection.active {
            let mouse = Vec2::from(mouse_position());
            if is_mouse_button_pressed(MouseButton::Left) {
                selection.start = Some(mouse);
                selection.end = Some(mouse);
            } else if is_mouse_button_down(MouseButton::Left) && selection.start.is_some() {
                selection.end = Some(mouse);
            }

            if let (Some(a), Some(b)) = (selection.start, selection.end) {
                let min = a.min(b);
                let size = (a - b).abs();
                draw_rectangle_lines(min.x, min.y, size.x, size.y, 2.0, GREEN);
            }
            // 默认字体没有中文字形
            draw_text("drag to select, Enter/Space: confirm, Esc/C: cancel", 10.0, 24.0, 24.0, YELLOW);

            let confirmed = is_key_pressed(KeyCode::Enter) || is_key_pressed(KeyCode::Space);
            let cancelled = is_key_pressed(KeyCode::Escape) || is_key_pressed(KeyCode::C);
            if confirmed || cancelled {
                let roi = match (&shown, confirmed) {
                    (Some(frame), true) => selection.roi(frame),
                    _ => Roi::default(),
                };
                selection.active = false;
                if handle.events.send(UiEvent::Roi(roi)).is_err() {
                    return;
                }
            }
            // 框选期间的字符不当作命令
            while get_char_pressed().is_some() {}
        } else {
            while let Some(key) = get_char_pressed() {
                if handle.events.send(UiEvent::Key(key)).is_err() {
                    return;
                }
            }
        }

        next_frame().await;
    }
}
