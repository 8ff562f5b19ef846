//! 跟踪会话 (Tracking Session)
//!
//! 状态机: `Idle` ⇄ `Tracking(Add | Delete)`
//! - add/delete 命令: 询问类别 (删除模式仅在按类别删除时) → 框选 → 新建跟踪器
//! - cancel 命令: 回到 Idle
//! - 跟踪中每帧: 更新跟踪器, 成功则写入标签 (Add) 或按 IOU 删除 (Delete);
//!   丢失时本帧跳过, 会话保持跟踪状态

use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::classes::ClassList;
use crate::deletion::{self, DeleteQuery};
use crate::geometry::{clip_extent, extent_to_normalized, roi_to_extent, Extent, Roi};
use crate::label_store::{LabelLine, LabelStore};
use crate::renderer::Interaction;
use crate::tracker::{Tracker, TrackerFactory};

/// 跟踪目的
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Add,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Tracking(Purpose),
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// 跟踪成功时写入标签文件
    pub write_labels: bool,
    /// 删除模式只删除指定类别
    pub delete_one_class: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            write_labels: true,
            delete_one_class: false,
        }
    }
}

/// 单帧上下文
pub struct FrameContext<'a> {
    pub frame_id: u32,
    /// 工作分辨率下的干净帧 (未绘制叠加)
    pub frame: &'a RgbImage,
    pub store: &'a LabelStore,
    pub classes: &'a ClassList,
}

/// 单帧跟踪结果
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// 未在跟踪
    Idle,
    /// 跟踪器丢失目标
    Lost,
    /// 裁剪后零面积, 按丢失处理
    Degenerate(Extent),
    /// 跟踪成功, `line` 为写入的标签 (未开启写入时为 `None`)
    Added {
        extent: Extent,
        line: Option<LabelLine>,
    },
    Deleted {
        extent: Extent,
        removed: usize,
    },
}

pub struct TrackingSession {
    factory: TrackerFactory,
    options: SessionOptions,
    mode: Mode,
    active_class: Option<String>,
    tracker: Option<Box<dyn Tracker>>,
}

impl TrackingSession {
    pub fn new(factory: TrackerFactory, options: SessionOptions) -> Self {
        Self {
            factory,
            options,
            mode: Mode::Idle,
            active_class: None,
            tracker: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn active_class(&self) -> Option<&str> {
        self.active_class.as_deref()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// 跟踪框标题: 类别名, 删除模式为 `Delete`
    pub fn caption(&self) -> &str {
        match self.mode {
            Mode::Tracking(Purpose::Delete) => "Delete",
            _ => self.active_class.as_deref().unwrap_or(""),
        }
    }

    /// 响应 add/delete 命令: 询问类别, 框选, 开始跟踪
    ///
    /// `canvas` 是用户看到的画面 (带已有标签), 跟踪器使用干净的 `frame`.
    /// 返回是否进入跟踪状态.
    pub fn begin(
        &mut self,
        purpose: Purpose,
        frame: &RgbImage,
        canvas: &RgbImage,
        classes: &ClassList,
        ui: &mut dyn Interaction,
    ) -> Result<bool> {
        let class = match purpose {
            Purpose::Add => Some(request_class(ui, classes, "")?),
            Purpose::Delete if self.options.delete_one_class => {
                Some(request_class(ui, classes, " (delete)")?)
            }
            Purpose::Delete => None,
        };
        let roi = ui.select_roi(canvas)?;
        Ok(self.start(purpose, frame, &roi, class))
    }

    /// 用新实例初始化跟踪器, 旧跟踪器直接丢弃
    pub fn start(
        &mut self,
        purpose: Purpose,
        frame: &RgbImage,
        roi: &Roi,
        class: Option<String>,
    ) -> bool {
        self.cancel();
        if roi.is_empty() {
            log::info!("↩️ 框选已取消, 保持空闲");
            return false;
        }

        let mut tracker = (self.factory)();
        if let Err(e) = tracker.init(frame, roi) {
            log::warn!("⚠️ 跟踪器初始化失败: {:#}", e);
            return false;
        }

        log::info!(
            "🎯 开始跟踪 {:?} class={} roi=({:.0}, {:.0}, {:.0}, {:.0})",
            purpose,
            class.as_deref().unwrap_or("*"),
            roi.x,
            roi.y,
            roi.width,
            roi.height
        );
        self.tracker = Some(tracker);
        self.active_class = class;
        self.mode = Mode::Tracking(purpose);
        true
    }

    pub fn cancel(&mut self) {
        if self.mode != Mode::Idle {
            log::info!("⏹️ 停止跟踪");
        }
        self.mode = Mode::Idle;
        self.active_class = None;
        self.tracker = None;
    }

    /// 对当前帧执行一次跟踪
    pub fn step(&mut self, ctx: &FrameContext<'_>) -> Result<StepOutcome> {
        let Mode::Tracking(purpose) = self.mode else {
            return Ok(StepOutcome::Idle);
        };
        let Some(tracker) = self.tracker.as_mut() else {
            return Ok(StepOutcome::Idle);
        };
        let Some(roi) = tracker.update(ctx.frame) else {
            log::debug!("👻 帧 {} 跟踪丢失", ctx.frame_id);
            return Ok(StepOutcome::Lost);
        };

        let (w, h) = ctx.frame.dimensions();
        let extent = clip_extent(&roi_to_extent(&roi), w, h);

        match purpose {
            Purpose::Delete => {
                let query = DeleteQuery {
                    region: extent,
                    class_filter: if self.options.delete_one_class {
                        self.active_class.as_deref()
                    } else {
                        None
                    },
                };
                let removed = deletion::apply(ctx.store, ctx.frame_id, &query, ctx.classes, w, h)?;
                if removed > 0 {
                    log::info!("🗑️ 帧 {} 删除 {} 个标签", ctx.frame_id, removed);
                }
                Ok(StepOutcome::Deleted { extent, removed })
            }
            Purpose::Add => {
                if extent.is_degenerate() {
                    log::debug!("👻 帧 {} 跟踪框面积为0: {:?}", ctx.frame_id, extent);
                    return Ok(StepOutcome::Degenerate(extent));
                }
                let line = if self.options.write_labels {
                    let name = self.active_class.as_deref().unwrap_or_default();
                    let class_id = ctx
                        .classes
                        .id_of(name)
                        .ok_or_else(|| anyhow!("类别不在列表中: `{}`", name))?;
                    let bbox = extent_to_normalized(&extent, w, h);
                    Some(ctx.store.append(ctx.frame_id, class_id, &bbox)?)
                } else {
                    None
                };
                Ok(StepOutcome::Added { extent, line })
            }
        }
    }
}

/// 反复询问, 直到输入的类别名在列表中
pub fn request_class(
    ui: &mut dyn Interaction,
    classes: &ClassList,
    hint: &str,
) -> Result<String> {
    let message = format!("{}\n[{}]\n输入类别名{}: ", "=".repeat(50), classes, hint);
    loop {
        let name = ui.ask_line(&message)?;
        let name = name.trim();
        if classes.contains(name) {
            return Ok(name.to_string());
        }
        log::warn!("⚠️ `{}` 不在类别列表中, 请重新输入", name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::YoloBox;
    use crate::layout::OutputLayout;
    use crate::renderer::Command;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const W: u32 = 1366;
    const H: u32 = 768;

    /// 按脚本返回结果的跟踪器, 脚本在所有实例间共享
    struct ScriptedTracker {
        script: Arc<Mutex<VecDeque<Option<Roi>>>>,
        last: Option<Roi>,
    }

    impl Tracker for ScriptedTracker {
        fn init(&mut self, _frame: &RgbImage, roi: &Roi) -> Result<()> {
            self.last = Some(*roi);
            Ok(())
        }

        fn update(&mut self, _frame: &RgbImage) -> Option<Roi> {
            // 脚本用完后停在原地
            match self.script.lock().unwrap().pop_front() {
                Some(next) => next,
                None => self.last,
            }
        }
    }

    fn scripted_factory(
        script: Vec<Option<Roi>>,
    ) -> (TrackerFactory, Arc<AtomicUsize>) {
        let script = Arc::new(Mutex::new(VecDeque::from(script)));
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let factory: TrackerFactory = Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::new(ScriptedTracker {
                script: script.clone(),
                last: None,
            })
        });
        (factory, created)
    }

    #[derive(Default)]
    struct ScriptedUi {
        lines: VecDeque<String>,
        rois: VecDeque<Roi>,
        asked: usize,
    }

    impl Interaction for ScriptedUi {
        fn show(&mut self, _frame: &RgbImage) -> Result<()> {
            Ok(())
        }

        fn poll_command(&mut self, _timeout: Duration) -> Option<Command> {
            None
        }

        fn wait_key(&mut self) {}

        fn select_roi(&mut self, _frame: &RgbImage) -> Result<Roi> {
            Ok(self.rois.pop_front().unwrap_or_default())
        }

        fn ask_line(&mut self, _message: &str) -> Result<String> {
            self.asked += 1;
            self.lines
                .pop_front()
                .ok_or_else(|| anyhow!("no more input"))
        }
    }

    fn classes() -> ClassList {
        ClassList::from_names(["car", "person"]).unwrap()
    }

    fn store() -> (tempfile::TempDir, LabelStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LabelStore::new(OutputLayout::at(dir.path(), "seq"));
        (dir, store)
    }

    fn ctx<'a>(
        frame_id: u32,
        frame: &'a RgbImage,
        store: &'a LabelStore,
        classes: &'a ClassList,
    ) -> FrameContext<'a> {
        FrameContext {
            frame_id,
            frame,
            store,
            classes,
        }
    }

    #[test]
    fn test_add_reprompts_until_valid_class() {
        let (factory, created) = scripted_factory(vec![]);
        let mut session = TrackingSession::new(factory, SessionOptions::default());
        let mut ui = ScriptedUi {
            lines: ["truck", " car "].iter().map(|s| s.to_string()).collect(),
            rois: VecDeque::from([Roi::new(100.0, 100.0, 50.0, 50.0)]),
            ..Default::default()
        };
        let frame = RgbImage::new(W, H);

        let started = session
            .begin(Purpose::Add, &frame, &frame, &classes(), &mut ui)
            .unwrap();
        assert!(started);
        assert_eq!(ui.asked, 2);
        assert_eq!(session.mode(), Mode::Tracking(Purpose::Add));
        assert_eq!(session.active_class(), Some("car"));
        assert_eq!(session.caption(), "car");
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_add_writes_one_line_per_frame() {
        let (factory, _) = scripted_factory(vec![]);
        let mut session = TrackingSession::new(factory, SessionOptions::default());
        let (_dir, store) = store();
        let classes = classes();
        let frame = RgbImage::new(W, H);

        assert!(session.start(
            Purpose::Add,
            &frame,
            &Roi::new(100.0, 100.0, 50.0, 50.0),
            Some("car".into())
        ));
        for frame_id in 5..=8 {
            let outcome = session.step(&ctx(frame_id, &frame, &store, &classes)).unwrap();
            assert!(matches!(outcome, StepOutcome::Added { line: Some(_), .. }));
        }

        for frame_id in 5..=8 {
            let lines = store.read(frame_id).unwrap();
            assert_eq!(lines.len(), 1);
            assert_eq!(lines[0].class_id, 0);
            assert_eq!(lines[0].extent(W, H), Extent::new(100, 100, 150, 150));
        }
        assert!(!store.layout().label_path(4).exists());
    }

    #[test]
    fn test_lost_frame_skipped_and_tracking_resumes() {
        let roi = Roi::new(10.0, 10.0, 20.0, 20.0);
        let (factory, _) = scripted_factory(vec![Some(roi), None, Some(roi)]);
        let mut session = TrackingSession::new(factory, SessionOptions::default());
        let (_dir, store) = store();
        let classes = classes();
        let frame = RgbImage::new(W, H);

        session.start(Purpose::Add, &frame, &roi, Some("person".into()));
        let outcomes: Vec<StepOutcome> = (1..=3)
            .map(|id| session.step(&ctx(id, &frame, &store, &classes)).unwrap())
            .collect();

        assert_eq!(outcomes[1], StepOutcome::Lost);
        assert_eq!(session.mode(), Mode::Tracking(Purpose::Add));
        assert!(store.layout().label_path(1).exists());
        assert!(!store.layout().label_path(2).exists());
        assert!(store.layout().label_path(3).exists());
    }

    #[test]
    fn test_degenerate_box_not_written() {
        // 完全在画面右侧之外, 裁剪后宽度为0
        let outside = Roi::new(2000.0, 100.0, 50.0, 50.0);
        let (factory, _) = scripted_factory(vec![Some(outside)]);
        let mut session = TrackingSession::new(factory, SessionOptions::default());
        let (_dir, store) = store();
        let classes = classes();
        let frame = RgbImage::new(W, H);

        session.start(
            Purpose::Add,
            &frame,
            &Roi::new(10.0, 10.0, 5.0, 5.0),
            Some("car".into()),
        );
        let outcome = session.step(&ctx(1, &frame, &store, &classes)).unwrap();
        assert!(matches!(outcome, StepOutcome::Degenerate(_)));
        assert!(!store.layout().label_path(1).exists());
        assert_eq!(session.mode(), Mode::Tracking(Purpose::Add));
    }

    #[test]
    fn test_write_labels_disabled() {
        let (factory, _) = scripted_factory(vec![]);
        let options = SessionOptions {
            write_labels: false,
            ..Default::default()
        };
        let mut session = TrackingSession::new(factory, options);
        let (_dir, store) = store();
        let classes = classes();
        let frame = RgbImage::new(W, H);

        session.start(
            Purpose::Add,
            &frame,
            &Roi::new(10.0, 10.0, 20.0, 20.0),
            Some("car".into()),
        );
        let outcome = session.step(&ctx(1, &frame, &store, &classes)).unwrap();
        assert!(matches!(outcome, StepOutcome::Added { line: None, .. }));
        assert!(!store.layout().label_path(1).exists());
    }

    #[test]
    fn test_delete_removes_touched_lines() {
        let (factory, _) = scripted_factory(vec![]);
        let mut session = TrackingSession::new(factory, SessionOptions::default());
        let (_dir, store) = store();
        let classes = classes();
        let frame = RgbImage::new(W, H);
        store
            .append(3, 0, &YoloBox::new(0.1, 0.1, 0.05, 0.05))
            .unwrap();
        store
            .append(3, 1, &YoloBox::new(0.8, 0.8, 0.05, 0.05))
            .unwrap();

        // 删除模式不询问类别
        let mut ui = ScriptedUi {
            rois: VecDeque::from([Roi::new(100.0, 50.0, 100.0, 100.0)]),
            ..Default::default()
        };
        session
            .begin(Purpose::Delete, &frame, &frame, &classes, &mut ui)
            .unwrap();
        assert_eq!(ui.asked, 0);
        assert_eq!(session.caption(), "Delete");

        let outcome = session.step(&ctx(3, &frame, &store, &classes)).unwrap();
        assert!(matches!(outcome, StepOutcome::Deleted { removed: 1, .. }));
        let lines = store.read(3).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].class_id, 1);
    }

    #[test]
    fn test_delete_one_class_uses_filter() {
        let (factory, _) = scripted_factory(vec![]);
        let options = SessionOptions {
            delete_one_class: true,
            ..Default::default()
        };
        let mut session = TrackingSession::new(factory, options);
        let (_dir, store) = store();
        let classes = classes();
        let frame = RgbImage::new(W, H);
        store
            .append(2, 0, &YoloBox::new(0.5, 0.5, 0.1, 0.1))
            .unwrap();
        store
            .append(2, 1, &YoloBox::new(0.5, 0.5, 0.1, 0.1))
            .unwrap();

        let mut ui = ScriptedUi {
            lines: VecDeque::from(["person".to_string()]),
            rois: VecDeque::from([Roi::new(0.0, 0.0, 1365.0, 767.0)]),
            ..Default::default()
        };
        session
            .begin(Purpose::Delete, &frame, &frame, &classes, &mut ui)
            .unwrap();
        assert_eq!(ui.asked, 1);

        session.step(&ctx(2, &frame, &store, &classes)).unwrap();
        let lines = store.read(2).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].class_id, 0);
    }

    #[test]
    fn test_retrigger_creates_fresh_tracker_and_switches_purpose() {
        let (factory, created) = scripted_factory(vec![]);
        let mut session = TrackingSession::new(factory, SessionOptions::default());
        let frame = RgbImage::new(W, H);
        let roi = Roi::new(10.0, 10.0, 20.0, 20.0);

        session.start(Purpose::Add, &frame, &roi, Some("car".into()));
        session.start(Purpose::Delete, &frame, &roi, None);
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(session.mode(), Mode::Tracking(Purpose::Delete));
        assert_eq!(session.active_class(), None);
    }

    #[test]
    fn test_empty_roi_and_cancel_return_to_idle() {
        let (factory, created) = scripted_factory(vec![]);
        let mut session = TrackingSession::new(factory, SessionOptions::default());
        let (_dir, store) = store();
        let classes = classes();
        let frame = RgbImage::new(W, H);

        assert!(!session.start(Purpose::Add, &frame, &Roi::default(), Some("car".into())));
        assert_eq!(session.mode(), Mode::Idle);
        assert_eq!(created.load(Ordering::SeqCst), 0);

        session.start(
            Purpose::Add,
            &frame,
            &Roi::new(1.0, 1.0, 5.0, 5.0),
            Some("car".into()),
        );
        session.cancel();
        assert_eq!(session.mode(), Mode::Idle);
        assert_eq!(
            session.step(&ctx(1, &frame, &store, &classes)).unwrap(),
            StepOutcome::Idle
        );
        assert!(!store.layout().label_path(1).exists());
    }
}
