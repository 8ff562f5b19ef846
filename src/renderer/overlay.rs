//! 帧叠加绘制 (Overlay)

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rand::Rng;

use crate::classes::ClassList;
use crate::geometry::Extent;
use crate::label_store::LabelLine;

const PALETTE_SIZE: usize = 10;
const LINE_THICKNESS: i32 = 3;
const TRACK_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

pub struct Overlay {
    palette: Vec<Rgb<u8>>,
    font: Option<FontVec>,
    scale: PxScale,
}

impl Overlay {
    /// 创建绘制器, 字体加载失败时只画框不写字
    pub fn new(font_path: Option<&Path>) -> Self {
        let mut rng = rand::thread_rng();
        let palette = (0..PALETTE_SIZE)
            .map(|_| {
                Rgb([
                    rng.gen_range(0..200u8),
                    rng.gen_range(0..200u8),
                    rng.gen_range(0..200u8),
                ])
            })
            .collect();

        let font = font_path.and_then(|path| match std::fs::read(path) {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(font) => {
                    log::info!("✅ 字体加载成功: {}", path.display());
                    Some(font)
                }
                Err(e) => {
                    log::warn!("⚠️ 字体解析失败 {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                log::warn!("⚠️ 未找到字体文件 {}: {}", path.display(), e);
                None
            }
        });

        Self {
            palette,
            font,
            scale: PxScale::from(24.0),
        }
    }

    /// 绘制已存标签, 颜色按行号轮换
    pub fn draw_labels(&self, frame: &mut RgbImage, lines: &[LabelLine], classes: &ClassList) {
        let (w, h) = frame.dimensions();
        for (i, line) in lines.iter().enumerate() {
            let color = self.palette[i % self.palette.len()];
            let extent = line.extent(w, h);
            draw_box(frame, &extent, color);
            let name = classes.name_of(line.class_id).unwrap_or("?");
            self.draw_caption(frame, &extent, name, color);
        }
    }

    /// 绘制当前跟踪框 (类别名或 `Delete`)
    pub fn draw_track(&self, frame: &mut RgbImage, extent: &Extent, caption: &str) {
        draw_box(frame, extent, TRACK_COLOR);
        self.draw_caption(frame, extent, caption, TRACK_COLOR);
    }

    pub fn draw_frame_id(&self, frame: &mut RgbImage, frame_id: u32) {
        if let Some(font) = &self.font {
            draw_text_mut(
                frame,
                TRACK_COLOR,
                70,
                30,
                self.scale,
                font,
                &frame_id.to_string(),
            );
        }
    }

    fn draw_caption(&self, frame: &mut RgbImage, extent: &Extent, text: &str, color: Rgb<u8>) {
        if let Some(font) = &self.font {
            let y = extent.ymin - self.scale.y as i32 - 4;
            draw_text_mut(frame, color, extent.xmin, y, self.scale, font, text);
        }
    }
}

fn draw_box(frame: &mut RgbImage, extent: &Extent, color: Rgb<u8>) {
    let w = extent.width().max(1) as u32;
    let h = extent.height().max(1) as u32;
    for t in 0..LINE_THICKNESS {
        let grow = 2 * t as u32;
        let rect = Rect::at(extent.xmin - t, extent.ymin - t).of_size(w + grow, h + grow);
        draw_hollow_rect_mut(frame, rect, color);
    }
}
