//! 启动流程: 配置 → 输出目录 → 帧源 → 标注引擎

use anyhow::{Context, Result};

use crate::classes::ClassList;
use crate::config::LabelerConfig;
use crate::controller::{Controller, PlaybackOptions, RunSummary};
use crate::input::{DirectorySource, FrameSource};
use crate::label_store::LabelStore;
use crate::layout::OutputLayout;
use crate::renderer::Interaction;
use crate::session::{SessionOptions, TrackingSession};
use crate::tracker::{template_factory, TrackerFactory};

/// 启动检查完成后的运行材料
pub struct Prepared {
    pub config: LabelerConfig,
    pub classes: ClassList,
    pub layout: OutputLayout,
    pub source: Box<dyn FrameSource>,
    pub options: PlaybackOptions,
}

/// 启动检查, 任何一步失败都是致命错误
///
/// 输出目录第一次创建时强制关闭显示和帧范围: 第一遍只负责落盘所有帧.
pub fn prepare(mut config: LabelerConfig) -> Result<Prepared> {
    config.validate()?;
    let classes = ClassList::load(&config.paths.classes_file)?;
    log::info!("🏷️ 类别: {}", classes);

    let layout = OutputLayout::resolve(&config.paths.output_dir, &config.paths.input_path)?;
    if !layout.exists() {
        config.option.show_video = false;
        config.action.use_frame_range = false;
        log::info!("📁 首次运行, 创建目录并保存所有帧 (show_video=false, use_frame_range=false)");
    }
    layout.prepare()?;
    log::info!("📂 输出目录: {}", layout.dir().display());

    if config.option.remove_json {
        let removed = layout.remove_json_files()?;
        if removed > 0 {
            log::info!("🧹 删除 {} 个 json 文件", removed);
        }
    }

    let frame_range = config.frame_range()?;
    if let Some(range) = frame_range {
        log::info!("🎞️ 帧范围: {:?}", range);
    }
    let start_mode = config.start_mode()?;

    let source = open_source(&config)?;
    let installed = layout.install_class_file(&config.paths.classes_file)?;
    log::debug!("类别文件已复制到 {}", installed.display());

    let options = PlaybackOptions {
        frame_range,
        start_mode,
        save_frames: true,
        working_size: (config.display.width, config.display.height),
        font_path: config.display.font_path.clone(),
    };

    Ok(Prepared {
        config,
        classes,
        layout,
        source,
        options,
    })
}

fn open_source(config: &LabelerConfig) -> Result<Box<dyn FrameSource>> {
    if config.frame.read_from_video {
        open_video(config)
    } else {
        let source = DirectorySource::open(&config.frame.frame_dir)
            .context("`frame_dir` 无法打开")?;
        Ok(Box::new(source))
    }
}

#[cfg(feature = "video")]
fn open_video(config: &LabelerConfig) -> Result<Box<dyn FrameSource>> {
    let source = crate::input::VideoSource::open(&config.paths.input_path)
        .context("`input_path` 无法打开")?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "video"))]
fn open_video(config: &LabelerConfig) -> Result<Box<dyn FrameSource>> {
    anyhow::bail!(
        "读取视频需要启用 `video` 功能 (cargo build --features video): {}",
        config.paths.input_path.display()
    )
}

/// 按配置创建跟踪会话
pub fn tracking_session(config: &LabelerConfig) -> TrackingSession {
    let factory: TrackerFactory = template_factory(
        config.display.tracker_search_scale,
        config.display.tracker_max_error,
    );
    TrackingSession::new(
        factory,
        SessionOptions {
            write_labels: config.option.write_labels,
            delete_one_class: config.option.delete_one_class,
        },
    )
}

/// 运行标注引擎直到序列结束或用户退出
pub fn run_engine(prepared: Prepared, ui: &mut dyn Interaction) -> Result<RunSummary> {
    let Prepared {
        config,
        classes,
        layout,
        mut source,
        options,
    } = prepared;

    let session = tracking_session(&config);
    let store = LabelStore::new(layout);
    let mut controller = Controller::new(source.as_mut(), ui, store, classes, session, options);
    controller.run()
}
