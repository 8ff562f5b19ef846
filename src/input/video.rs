/// 视频文件帧源 (ffmpeg 解码)
///
/// 解码在独立工作线程进行: ffmpeg 滤镜链先转成 rgb24,
/// [`RgbFrameFilter`] 把每帧拷贝成 `RgbImage` 经有界通道交给标注引擎.
/// 通道容量很小, 引擎处理慢时解码线程自然阻塞.
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, bail, Result};
use crossbeam_channel::{Receiver, Sender};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Frame, Input};
use image::RgbImage;

use super::FrameSource;

const CHANNEL_CAPACITY: usize = 4;

enum VideoMessage {
    Frame(RgbImage),
    End,
    Failed(String),
}

/// ffmpeg 帧过滤器: rgb24 帧 → RgbImage
struct RgbFrameFilter {
    frames: Sender<VideoMessage>,
    decoded: usize,
}

impl FrameFilter for RgbFrameFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        log::debug!("✅ 解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                log::warn!("⚠️ 丢弃帧 #{}: 空帧/损坏帧", self.decoded + 1);
                return Ok(None);
            }

            let raw = &*frame.as_ptr();
            let (w, h) = (raw.width as usize, raw.height as usize);
            let stride = raw.linesize[0] as usize;
            if w == 0 || h == 0 || raw.data[0].is_null() || stride < w * 3 {
                return Err(format!("非法帧: {}x{} stride={}", w, h, stride));
            }

            // 按行拷贝, 去掉行尾对齐填充
            let mut pixels = Vec::with_capacity(w * h * 3);
            for row in 0..h {
                let line = std::slice::from_raw_parts(raw.data[0].add(row * stride), w * 3);
                pixels.extend_from_slice(line);
            }
            let image = RgbImage::from_raw(w as u32, h as u32, pixels)
                .ok_or_else(|| "帧缓冲尺寸不匹配".to_string())?;

            self.decoded += 1;
            // 接收端已关闭 (引擎退出), 终止解码
            self.frames
                .send(VideoMessage::Frame(image))
                .map_err(|_| "帧通道已关闭".to_string())?;
        }
        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        log::debug!("✅ 解码线程退出, 共 {} 帧", self.decoded);
    }
}

fn decode(path: &str, frames: Sender<VideoMessage>) -> Result<(), String> {
    let filter = RgbFrameFilter { frames, decoded: 0 };
    let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
    let pipe = pipe.filter("rgb", Box::new(filter));
    let out = create_null_output().add_frame_pipeline(pipe);

    let ctx = FfmpegContext::builder()
        .input(Input::new(path))
        .filter_descs(["format=rgb24"].into())
        .output(out)
        .build()
        .map_err(|e| format!("构建失败: {}", e))?;

    let sch = ctx.start().map_err(|e| format!("启动失败: {}", e))?;
    sch.wait().map_err(|e| format!("解码失败: {}", e))
}

/// 发送解码结束消息, 返回是否送达
///
/// 接收端已关闭 (用户退出) 时只留调试日志.
fn finish(tx: &Sender<VideoMessage>, result: Result<(), String>) -> bool {
    let message = match result {
        Ok(()) => VideoMessage::End,
        Err(e) => VideoMessage::Failed(e),
    };
    match tx.send(message) {
        Ok(()) => true,
        Err(crossbeam_channel::SendError(VideoMessage::Failed(e))) => {
            log::debug!("视频解码失败 (接收端已关闭): {}", e);
            false
        }
        Err(_) => {
            log::debug!("视频解码结束 (接收端已关闭)");
            false
        }
    }
}

pub struct VideoSource {
    path: PathBuf,
    frames: Receiver<VideoMessage>,
    _worker: JoinHandle<()>,
    finished: bool,
}

impl VideoSource {
    /// 打开视频文件并启动解码线程
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            bail!("视频文件不存在: {}", path.display());
        }
        let url = path
            .to_str()
            .ok_or_else(|| anyhow!("视频路径不是合法 UTF-8: {}", path.display()))?
            .to_string();

        let (tx, rx) = crossbeam_channel::bounded(CHANNEL_CAPACITY);
        let worker = thread::Builder::new()
            .name("video-decode".into())
            .spawn(move || {
                let result = decode(&url, tx.clone());
                finish(&tx, result);
            })?;

        log::info!("🎬 视频解码启动: {}", path.display());
        Ok(Self {
            path,
            frames: rx,
            _worker: worker,
            finished: false,
        })
    }
}

impl FrameSource for VideoSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.finished {
            return Ok(None);
        }
        match self.frames.recv() {
            Ok(VideoMessage::Frame(frame)) => Ok(Some(frame)),
            Ok(VideoMessage::End) | Err(_) => {
                self.finished = true;
                Ok(None)
            }
            Ok(VideoMessage::Failed(e)) => {
                self.finished = true;
                bail!("视频解码失败 {}: {}", self.path.display(), e)
            }
        }
    }
}
