/// 跟踪辅助标注工具 (Tracking-Assisted Labeler)
///
/// 系统架构:
/// 1. 标注线程: 读帧、跟踪、写标签 (独立工作线程)
/// 2. 主线程:   macroquad 窗口, 显示画面并回传按键/框选
///
/// 无窗口模式 (`--headless` 或 `show_video=false`) 下引擎直接在主线程运行.
///
/// 运行: cargo run --bin track-labeler -- --config labeler.json
use std::thread;

use anyhow::Result;
use clap::Parser;
use track_labeler::app::{self, Prepared};
use track_labeler::controller::RunSummary;
use track_labeler::renderer::window::{self, run_window};
use track_labeler::renderer::ConsoleUi;
use track_labeler::{Args, LabelerConfig};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = LabelerConfig::load(&args.config)?;
    config.apply_args(&args);
    config.print_summary();

    let prepared = app::prepare(config)?;

    if !prepared.config.option.show_video {
        log::info!("🖥️ 无窗口模式");
        let mut ui = ConsoleUi::new();
        let summary = app::run_engine(prepared, &mut ui)?;
        report(&summary);
        return Ok(());
    }

    run_with_window(prepared)
}

fn run_with_window(prepared: Prepared) -> Result<()> {
    let title = prepared
        .config
        .paths
        .input_path
        .display()
        .to_string();
    let conf = window::window_conf(
        &title,
        prepared.config.display.width,
        prepared.config.display.height,
    );

    // ========== 启动标注线程 ==========
    let (mut ui, handle) = window::channel();
    let engine = thread::Builder::new()
        .name("labeler-engine".into())
        .spawn(move || {
            let result = app::run_engine(prepared, &mut ui);
            ui.close();
            result
        })?;

    // ========== 主线程: 窗口事件循环 ==========
    macroquad::Window::from_config(conf, async move {
        run_window(handle).await;
        let code = match engine.join() {
            Ok(Ok(summary)) => {
                report(&summary);
                0
            }
            Ok(Err(e)) => {
                log::error!("❌ {:#}", e);
                1
            }
            Err(_) => {
                log::error!("❌ 标注线程异常退出");
                1
            }
        };
        std::process::exit(code);
    });
    Ok(())
}

fn report(summary: &RunSummary) {
    if summary.quit {
        log::info!("👋 已退出");
    }
    log::info!(
        "📊 共 {} 帧, 新增标签 {} 行, 删除 {} 行",
        summary.frames_read,
        summary.lines_written,
        summary.lines_removed
    );
}
