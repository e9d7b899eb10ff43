// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 检测结果数据结构

/// 整数像素矩形 (左上角 + 宽高, 与 cv::Rect 语义一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn xmax(&self) -> i32 {
        self.x + self.width
    }

    pub fn ymax(&self) -> i32 {
        self.y + self.height
    }

    pub fn tl(&self) -> Position {
        Position::new(self.x, self.y)
    }

    pub fn area(&self) -> i64 {
        if self.width <= 0 || self.height <= 0 {
            return 0;
        }
        self.width as i64 * self.height as i64
    }

    pub fn intersection_area(&self, another: &Rect) -> i64 {
        let l = self.x.max(another.x);
        let r = self.xmax().min(another.xmax());
        let t = self.y.max(another.y);
        let b = self.ymax().min(another.ymax());
        if r <= l || b <= t {
            return 0;
        }
        (r - l) as i64 * (b - t) as i64
    }

    /// 交并比 (不使用 +1 像素约定)
    pub fn iou(&self, another: &Rect) -> f32 {
        let inter = self.intersection_area(another);
        let union = self.area() + another.area() - inter;
        if union <= 0 {
            return 0.0;
        }
        inter as f32 / union as f32
    }
}

/// 像素坐标点 (检测框左上角)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// 候选检测框 (单帧内有效)
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateDetection {
    pub class_id: usize,
    pub confidence: f32,
    pub rect: Rect,
}

/// NMS 之后保留下来的检测框
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredDetection {
    pub class_id: usize,
    pub confidence: f32,
    pub rect: Rect,
}

impl From<&CandidateDetection> for FilteredDetection {
    fn from(c: &CandidateDetection) -> Self {
        Self {
            class_id: c.class_id,
            confidence: c.confidence,
            rect: c.rect,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou_identical() {
        let r = Rect::new(10, 10, 100, 50);
        assert!((r.iou(&r) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(10, 0, 10, 10);
        assert_eq!(a.intersection_area(&b), 0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_half_overlap() {
        // 交集 50, 并集 150
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 0, 10, 10);
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_rect() {
        let a = Rect::new(0, 0, 0, 10);
        assert_eq!(a.area(), 0);
        assert_eq!(a.iou(&a), 0.0);
    }
}
