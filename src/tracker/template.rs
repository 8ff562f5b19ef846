//! 模板匹配跟踪器 (Template Matching Tracker)
//!
//! 初始化时截取灰度模板, 之后每帧在上一位置周围的搜索窗口内
//! 做归一化平方差匹配, 误差超过阈值视为丢失. 框的尺寸在整个跟踪期间不变.

use anyhow::{bail, Result};
use image::imageops::{crop_imm, grayscale};
use image::{GrayImage, RgbImage};
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};

use super::Tracker;
use crate::geometry::{clip_extent, roi_to_extent, Roi};

pub struct TemplateTracker {
    template: Option<GrayImage>,
    // 上一次的位置 (x, y), 像素
    last: (u32, u32),
    /// 搜索窗口向四周扩展的比例 (相对模板尺寸)
    search_scale: f32,
    /// 归一化平方差上限, 超过即判定丢失
    max_error: f32,
}

impl TemplateTracker {
    pub fn new(search_scale: f32, max_error: f32) -> Self {
        Self {
            template: None,
            last: (0, 0),
            search_scale: search_scale.max(0.0),
            max_error,
        }
    }
}

impl Default for TemplateTracker {
    fn default() -> Self {
        Self::new(1.0, 0.1)
    }
}

impl Tracker for TemplateTracker {
    fn init(&mut self, frame: &RgbImage, roi: &Roi) -> Result<()> {
        let (fw, fh) = frame.dimensions();
        let extent = clip_extent(&roi_to_extent(roi), fw, fh);
        let (w, h) = (extent.width() as u32, extent.height() as u32);
        if w == 0 || h == 0 {
            bail!("跟踪选区为空: {:?}", roi);
        }

        let gray = grayscale(frame);
        let (x, y) = (extent.xmin as u32, extent.ymin as u32);
        self.template = Some(crop_imm(&gray, x, y, w, h).to_image());
        self.last = (x, y);
        Ok(())
    }

    fn update(&mut self, frame: &RgbImage) -> Option<Roi> {
        let template = self.template.as_ref()?;
        let (tw, th) = template.dimensions();
        let (fw, fh) = frame.dimensions();

        let margin_x = (tw as f32 * self.search_scale) as u32;
        let margin_y = (th as f32 * self.search_scale) as u32;
        let x0 = self.last.0.saturating_sub(margin_x);
        let y0 = self.last.1.saturating_sub(margin_y);
        let x1 = (self.last.0 + tw + margin_x).min(fw);
        let y1 = (self.last.1 + th + margin_y).min(fh);

        // 窗口放不下模板 (目标贴边或画面变小)
        if x1 <= x0 || y1 <= y0 || x1 - x0 < tw || y1 - y0 < th {
            return None;
        }

        let gray = grayscale(frame);
        let window = crop_imm(&gray, x0, y0, x1 - x0, y1 - y0).to_image();
        let errors = match_template(
            &window,
            template,
            MatchTemplateMethod::SumOfSquaredErrorsNormalized,
        );
        let extremes = find_extremes(&errors);
        if extremes.min_value.is_nan() || extremes.min_value > self.max_error {
            return None;
        }

        let (dx, dy) = extremes.min_value_location;
        self.last = (x0 + dx, y0 + dy);
        Some(Roi::new(
            self.last.0 as f64,
            self.last.1 as f64,
            tw as f64,
            th as f64,
        ))
    }
}
