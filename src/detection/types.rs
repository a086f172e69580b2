// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 像素坐标点 (整数)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }
}

impl std::ops::Add<(i32, i32)> for Point {
    type Output = Point;

    fn add(self, (dx, dy): (i32, i32)) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bbox {
    // a bounding box around an object
    xmin: f32,
    ymin: f32,
    width: f32,
    height: f32,
    id: usize,
    confidence: f32,
}

impl Bbox {
    pub fn new(xmin: f32, ymin: f32, width: f32, height: f32, id: usize, confidence: f32) -> Self {
        Self {
            xmin,
            ymin,
            width,
            height,
            id,
            confidence,
        }
    }

    pub fn from_xyxy(x1: f32, y1: f32, x2: f32, y2: f32, id: usize, confidence: f32) -> Self {
        let (xmin, xmax) = (x1.min(x2), x1.max(x2));
        let (ymin, ymax) = (y1.min(y2), y1.max(y2));
        Self::new(xmin, ymin, xmax - xmin, ymax - ymin, id, confidence)
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn xmin(&self) -> f32 {
        self.xmin
    }

    pub fn ymin(&self) -> f32 {
        self.ymin
    }

    pub fn xmax(&self) -> f32 {
        self.xmin + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.ymin + self.height
    }

    pub fn xyxy(&self) -> [f32; 4] {
        [self.xmin, self.ymin, self.xmax(), self.ymax()]
    }

    /// 左上角
    pub fn tl(&self) -> Point {
        Point::new(self.xmin as i32, self.ymin as i32)
    }

    /// 右下角
    pub fn br(&self) -> Point {
        Point::new(self.xmax() as i32, self.ymax() as i32)
    }

    /// 中心点 (取整)
    pub fn center(&self) -> Point {
        Point::new(
            ((self.xmin + self.xmax()) / 2.) as i32,
            ((self.ymin + self.ymax()) / 2.) as i32,
        )
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn intersection_area(&self, another: &Bbox) -> f32 {
        let l = self.xmin.max(another.xmin);
        let r = self.xmax().min(another.xmax());
        let t = self.ymin.max(another.ymin);
        let b = self.ymax().min(another.ymax());
        (r - l + 1.).max(0.) * (b - t + 1.).max(0.)
    }

    pub fn union(&self, another: &Bbox) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &Bbox) -> f32 {
        self.intersection_area(another) / self.union(another)
    }

    /// 任一边距图像边缘不超过容差时视为不完整
    pub fn is_complete(&self, img_w: u32, img_h: u32, x_tolerance: i32, y_tolerance: i32) -> bool {
        let (x_tol, y_tol) = (x_tolerance as f32, y_tolerance as f32);
        !(self.xmin <= x_tol
            || self.xmax() >= img_w as f32 - x_tol
            || self.ymin <= y_tol
            || self.ymax() >= img_h as f32 - y_tol)
    }

    pub fn center_distance(&self, another: &Bbox) -> f32 {
        self.center().distance(&another.center())
    }
}

/// 单张图像的检测结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectionResult {
    pub bboxes: Vec<Bbox>,
}

impl DetectionResult {
    pub fn new(bboxes: Vec<Bbox>) -> Self {
        Self { bboxes }
    }

    pub fn bboxes(&self) -> &[Bbox] {
        &self.bboxes
    }

    pub fn is_empty(&self) -> bool {
        self.bboxes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn point_distance() {
        assert_relative_eq!(Point::new(0, 0).distance(&Point::new(3, 4)), 5.0);
        assert_eq!(Point::new(1, 2) + (3, 4), Point::new(4, 6));
    }

    #[test]
    fn corners_and_center() {
        let b = Bbox::from_xyxy(30., 40., 10., 20., 1, 0.9);
        assert_eq!(b.xyxy(), [10., 20., 30., 40.]);
        assert_eq!(b.center(), Point::new(20, 30));
        assert_eq!(b.tl(), Point::new(10, 20));
        assert_eq!(b.br(), Point::new(30, 40));
    }

    #[test]
    fn completeness_uses_inclusive_tolerance() {
        let inside = Bbox::from_xyxy(6., 6., 93., 93., 0, 0.5);
        assert!(inside.is_complete(100, 100, 5, 5));
        let touching = Bbox::from_xyxy(5., 6., 50., 50., 0, 0.5);
        assert!(!touching.is_complete(100, 100, 5, 5));
        let bottom = Bbox::from_xyxy(10., 10., 50., 95., 0, 0.5);
        assert!(!bottom.is_complete(100, 100, 5, 5));
    }

    #[test]
    fn iou_of_identical_boxes() {
        let b = Bbox::new(0., 0., 9., 9., 0, 1.0);
        assert!(b.iou(&b) > 0.99);
        let far = Bbox::new(100., 100., 9., 9., 0, 1.0);
        assert_relative_eq!(b.iou(&far), 0.0);
    }
}
