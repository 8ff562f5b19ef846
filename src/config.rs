//! 标注工具配置 - JSON 文件 + 命令行覆盖

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::controller::{FrameRange, FrameRangeError};
use crate::renderer::Command;

/// 命令行参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "跟踪辅助标注工具", long_about = None)]
pub struct Args {
    /// JSON 配置文件, 不存在时写入默认配置
    #[arg(short, long, default_value = "labeler.json")]
    pub config: PathBuf,

    /// 输入视频 (或序列名), 决定输出子目录
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// 输出根目录
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 类别文件 (每行一个类别名)
    #[arg(long)]
    pub classes: Option<PathBuf>,

    /// 从图片目录读帧 (而不是视频)
    #[arg(long)]
    pub frame_dir: Option<PathBuf>,

    /// 标注帧范围, 结束帧 -1 表示到结尾
    #[arg(long, num_args = 2, value_names = ["START", "END"], allow_negative_numbers = true)]
    pub frame_range: Option<Vec<i64>>,

    /// 起始帧自动执行: a (添加) / r (删除) / " " (暂停)
    #[arg(long)]
    pub start_mode: Option<String>,

    /// 无窗口模式, 选区从终端输入
    #[arg(long, default_value_t = false)]
    pub headless: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub output_dir: PathBuf,
    pub input_path: PathBuf,
    pub classes_file: PathBuf,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub read_from_video: bool,
    pub frame_dir: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionConfig {
    pub write_labels: bool,     // 跟踪时写入标签
    pub remove_json: bool,      // 清理输出目录中的 .json 文件
    pub show_video: bool,       // 显示窗口
    pub delete_one_class: bool, // 删除模式只删指定类别
}

impl Default for OptionConfig {
    fn default() -> Self {
        Self {
            write_labels: true,
            remove_json: false,
            show_video: true,
            delete_one_class: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    pub use_frame_range: bool,
    pub frame_range: Option<[i64; 2]>,
    pub start_mode: String,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            use_frame_range: false,
            frame_range: Some([2, -1]),
            start_mode: String::new(),
        }
    }
}

/// 默认叠加字体, 找不到时只画框
pub const DEFAULT_FONT: &str = "assets/font/msyh.ttc";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub font_path: Option<PathBuf>,
    pub tracker_search_scale: f32,
    pub tracker_max_error: f32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 1366,
            height: 768,
            font_path: Some(PathBuf::from(DEFAULT_FONT)),
            tracker_search_scale: 1.0,
            tracker_max_error: 0.1,
        }
    }
}

/// 标注工具配置
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelerConfig {
    pub paths: PathsConfig,
    pub frame: FrameConfig,
    pub option: OptionConfig,
    pub action: ActionConfig,
    pub display: DisplayConfig,
}

impl LabelerConfig {
    /// 从JSON文件加载配置, 文件不存在时写入默认配置
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("📝 配置文件不存在, 创建默认配置: {}", path.display());
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }
        let json = fs::read_to_string(path)
            .with_context(|| format!("读取配置失败: {}", path.display()))?;
        let config = serde_json::from_str(&json)
            .with_context(|| format!("配置文件解析失败: {}", path.display()))?;
        log::info!("✅ 配置已从 {} 加载", path.display());
        Ok(config)
    }

    /// 保存配置到JSON文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path, json).with_context(|| format!("保存配置失败: {}", path.display()))?;
        log::info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    /// 命令行参数覆盖配置文件
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(input) = &args.input {
            self.paths.input_path = input.clone();
        }
        if let Some(output) = &args.output {
            self.paths.output_dir = output.clone();
        }
        if let Some(classes) = &args.classes {
            self.paths.classes_file = classes.clone();
        }
        if let Some(dir) = &args.frame_dir {
            self.frame.read_from_video = false;
            self.frame.frame_dir = dir.clone();
        }
        if let Some([start, end]) = args.frame_range.as_deref() {
            self.action.use_frame_range = true;
            self.action.frame_range = Some([*start, *end]);
        }
        if let Some(mode) = &args.start_mode {
            self.action.start_mode = mode.clone();
        }
        if args.headless {
            self.option.show_video = false;
        }
    }

    /// 必填路径检查
    pub fn validate(&self) -> Result<()> {
        if self.paths.input_path.as_os_str().is_empty() {
            bail!("`input_path` 未设置");
        }
        if self.paths.output_dir.as_os_str().is_empty() {
            bail!("`output_dir` 未设置");
        }
        if self.paths.classes_file.as_os_str().is_empty() {
            bail!("`classes_file` 未设置");
        }
        if !self.frame.read_from_video && self.frame.frame_dir.as_os_str().is_empty() {
            bail!("`frame_dir` 未设置");
        }
        if self.display.width == 0 || self.display.height == 0 {
            bail!(
                "工作分辨率无效: {}x{}",
                self.display.width,
                self.display.height
            );
        }
        Ok(())
    }

    /// 启用时返回校验过的帧范围
    pub fn frame_range(&self) -> Result<Option<FrameRange>, FrameRangeError> {
        match (self.action.use_frame_range, self.action.frame_range) {
            (true, Some([start, end])) => FrameRange::validate(start, end).map(Some),
            _ => Ok(None),
        }
    }

    /// 起始帧命令: `a` 添加, `r` 删除, `" "` 暂停, 空字符串不执行
    pub fn start_mode(&self) -> Result<Option<Command>> {
        match self.action.start_mode.as_str() {
            "" => Ok(None),
            "a" => Ok(Some(Command::Add)),
            "r" => Ok(Some(Command::Delete)),
            " " => Ok(Some(Command::Pause)),
            other => bail!("`start_mode` 无效: {:?} (支持 \"a\", \"r\", \" \", \"\")", other),
        }
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        log::info!("🎛️ 当前标注配置:");
        log::info!("  输入: {}", self.paths.input_path.display());
        log::info!("  输出根目录: {}", self.paths.output_dir.display());
        log::info!("  类别文件: {}", self.paths.classes_file.display());
        if self.frame.read_from_video {
            log::info!("  帧来源: 视频");
        } else {
            log::info!("  帧来源: 图片目录 {}", self.frame.frame_dir.display());
        }
        log::info!(
            "  写标签: {} | 清理json: {} | 显示: {} | 按类删除: {}",
            self.option.write_labels,
            self.option.remove_json,
            self.option.show_video,
            self.option.delete_one_class
        );
        if self.action.use_frame_range {
            log::info!(
                "  帧范围: {:?} | 启动模式: {:?}",
                self.action.frame_range,
                self.action.start_mode
            );
        }
        log::info!(
            "  工作分辨率: {}x{}",
            self.display.width,
            self.display.height
        );
    }
}
