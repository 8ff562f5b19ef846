//! 终端交互 (无窗口模式)
//!
//! 不显示画面, 也不会产生按键命令; 选区与类别名从标准输入读取.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use image::RgbImage;

use super::{Command, Interaction};
use crate::geometry::Roi;

/// 打印提示并读取一行
pub fn prompt_line(message: &str) -> Result<String> {
    print!("{}", message);
    io::stdout().flush().ok();
    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("读取标准输入失败")?;
    if read == 0 {
        bail!("标准输入已关闭");
    }
    Ok(line.trim().to_string())
}

/// 解析 `x y w h`
pub fn parse_roi(text: &str) -> Option<Roi> {
    let values: Vec<f64> = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    match values[..] {
        [x, y, w, h] if w >= 0.0 && h >= 0.0 => Some(Roi::new(x, y, w, h)),
        _ => None,
    }
}

#[derive(Default)]
pub struct ConsoleUi;

impl ConsoleUi {
    pub fn new() -> Self {
        Self
    }
}

impl Interaction for ConsoleUi {
    fn show(&mut self, _frame: &RgbImage) -> Result<()> {
        Ok(())
    }

    fn poll_command(&mut self, _timeout: Duration) -> Option<Command> {
        None
    }

    fn wait_key(&mut self) {}

    fn select_roi(&mut self, frame: &RgbImage) -> Result<Roi> {
        let (w, h) = frame.dimensions();
        let message = format!("输入选区 x y w h (画面 {}x{}, 空行取消): ", w, h);
        loop {
            let line = prompt_line(&message)?;
            if line.is_empty() {
                return Ok(Roi::default());
            }
            match parse_roi(&line) {
                Some(roi) => return Ok(roi),
                None => println!("⚠️ 格式错误: `{}`", line),
            }
        }
    }

    fn ask_line(&mut self, message: &str) -> Result<String> {
        prompt_line(message)
    }
}
