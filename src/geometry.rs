//! 坐标转换 (Geometry)
//! Box conversions between selection ROIs, pixel extents and YOLO normalized boxes.
//!
//! 三种表示:
//! - [`Roi`]:     像素坐标 (x, y, width, height), 左上角锚定, 来自框选或跟踪器
//! - [`Extent`]:  像素坐标 (xmin, ymin, xmax, ymax), 整数, 裁剪到画面内
//! - [`YoloBox`]: 归一化中心点 (cx, cy, w, h), 取值 [0, 1], 即标签文件格式

/// 框选区域 (ROI, 左上角 + 宽高)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Roi {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Roi {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 空选区 (用户取消框选)
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// 像素边界 (xmin, ymin, xmax, ymax)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl Extent {
    pub fn new(xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// 宽度, 坐标顺序颠倒时为0
    pub fn width(&self) -> i64 {
        (self.xmax as i64 - self.xmin as i64).max(0)
    }

    pub fn height(&self) -> i64 {
        (self.ymax as i64 - self.ymin as i64).max(0)
    }

    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }

    /// 零面积 (裁剪后塌缩的框)
    pub fn is_degenerate(&self) -> bool {
        self.area() == 0
    }

    /// 两框重叠面积
    pub fn overlap_area(&self, other: &Extent) -> i64 {
        Extent {
            xmin: self.xmin.max(other.xmin),
            ymin: self.ymin.max(other.ymin),
            xmax: self.xmax.min(other.xmax),
            ymax: self.ymax.min(other.ymax),
        }
        .area()
    }

    /// 计算两个边界框的IOU (Intersection over Union)
    ///
    /// 并集为0 (两个退化框) 时返回0, 不做除零
    pub fn iou(&self, other: &Extent) -> f64 {
        let overlap = self.overlap_area(other);
        let union = self.area() + other.area() - overlap;
        if union <= 0 {
            return 0.0;
        }
        overlap as f64 / union as f64
    }
}

/// YOLO 归一化框 (cx, cy, w, h)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct YoloBox {
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

impl YoloBox {
    pub fn new(cx: f64, cy: f64, w: f64, h: f64) -> Self {
        Self { cx, cy, w, h }
    }
}

/// [x, y, w, h] → [xmin, ymin, xmax, ymax], 截断取整
pub fn roi_to_extent(roi: &Roi) -> Extent {
    Extent {
        xmin: roi.x as i32,
        ymin: roi.y as i32,
        xmax: (roi.x + roi.width) as i32,
        ymax: (roi.y + roi.height) as i32,
    }
}

/// 每个坐标独立限制到 [0, w - 1] 和 [0, h - 1]
pub fn clip_extent(extent: &Extent, frame_w: u32, frame_h: u32) -> Extent {
    let max_x = (frame_w as i64 - 1).max(0) as i32;
    let max_y = (frame_h as i64 - 1).max(0) as i32;
    Extent {
        xmin: extent.xmin.clamp(0, max_x),
        ymin: extent.ymin.clamp(0, max_y),
        xmax: extent.xmax.clamp(0, max_x),
        ymax: extent.ymax.clamp(0, max_y),
    }
}

pub fn extent_to_normalized(extent: &Extent, frame_w: u32, frame_h: u32) -> YoloBox {
    let fw = frame_w as f64;
    let fh = frame_h as f64;
    YoloBox {
        cx: (extent.xmin as f64 + extent.xmax as f64) / 2.0 / fw,
        cy: (extent.ymin as f64 + extent.ymax as f64) / 2.0 / fh,
        w: (extent.xmax as f64 - extent.xmin as f64) / fw,
        h: (extent.ymax as f64 - extent.ymin as f64) / fh,
    }
}

/// 归一化框还原为像素边界, 四舍五入
pub fn normalized_to_extent(yolo: &YoloBox, frame_w: u32, frame_h: u32) -> Extent {
    let fw = frame_w as f64;
    let fh = frame_h as f64;
    let (cx, cy) = (yolo.cx * fw, yolo.cy * fh);
    let (half_w, half_h) = (yolo.w * fw / 2.0, yolo.h * fh / 2.0);
    Extent {
        xmin: (cx - half_w).round() as i32,
        ymin: (cy - half_h).round() as i32,
        xmax: (cx + half_w).round() as i32,
        ymax: (cy + half_h).round() as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_roi_to_extent_truncates() {
        let extent = roi_to_extent(&Roi::new(10.7, 20.2, 30.9, 40.5));
        assert_eq!(extent, Extent::new(10, 20, 41, 60));
    }

    #[test]
    fn test_clip_extent_bounds() {
        for &(w, h) in &[(1366u32, 768u32), (1, 1), (640, 480)] {
            for &e in &[
                Extent::new(-50, -50, 5000, 5000),
                Extent::new(10, 10, 20, 20),
                Extent::new(2000, 900, 3000, 1000),
                Extent::new(-10, 5, -1, 6),
            ] {
                let c = clip_extent(&e, w, h);
                assert!(0 <= c.xmin && c.xmin <= c.xmax && c.xmax <= w as i32 - 1);
                assert!(0 <= c.ymin && c.ymin <= c.ymax && c.ymax <= h as i32 - 1);
            }
        }
    }

    #[test]
    fn test_normalized_round_trip() {
        let (w, h) = (1366, 768);
        for &b in &[
            YoloBox::new(0.5, 0.5, 0.2, 0.3),
            YoloBox::new(0.0915, 0.1627, 0.0366, 0.0651),
            YoloBox::new(0.9, 0.1, 0.05, 0.05),
        ] {
            let back = extent_to_normalized(&normalized_to_extent(&b, w, h), w, h);
            assert!((back.cx - b.cx).abs() * w as f64 <= 1.0);
            assert!((back.cy - b.cy).abs() * h as f64 <= 1.0);
            assert!((back.w - b.w).abs() * w as f64 <= 1.0);
            assert!((back.h - b.h).abs() * h as f64 <= 1.0);
        }
    }

    #[test]
    fn test_extent_to_normalized_values() {
        let yolo = extent_to_normalized(&Extent::new(100, 100, 150, 150), 1366, 768);
        assert_relative_eq!(yolo.cx, 125.0 / 1366.0, epsilon = 1e-12);
        assert_relative_eq!(yolo.cy, 125.0 / 768.0, epsilon = 1e-12);
        assert_relative_eq!(yolo.w, 50.0 / 1366.0, epsilon = 1e-12);
        assert_relative_eq!(yolo.h, 50.0 / 768.0, epsilon = 1e-12);
    }

    #[test]
    fn test_iou_properties() {
        let a = Extent::new(0, 0, 10, 10);
        let b = Extent::new(5, 5, 15, 15);
        let far = Extent::new(100, 100, 110, 110);

        assert_relative_eq!(a.iou(&a), 1.0);
        assert_eq!(a.iou(&far), 0.0);
        assert_relative_eq!(a.iou(&b), b.iou(&a));
        assert_relative_eq!(a.iou(&b), 25.0 / 175.0, epsilon = 1e-12);
    }

    #[test]
    fn test_iou_degenerate_is_zero() {
        let point = Extent::new(5, 5, 5, 5);
        assert_eq!(point.iou(&point), 0.0);

        // 坐标顺序颠倒视为零面积
        let inverted = Extent::new(10, 10, 0, 0);
        assert_eq!(inverted.area(), 0);
        assert_eq!(inverted.iou(&Extent::new(0, 0, 10, 10)), 0.0);
    }
}
