// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测结果过滤: 完整框 / 有效框 (去重)

use super::types::{Bbox, DetectionResult};
use crate::config::ResultConfig;

/// 一帧内的检测框集合
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Boxes {
    pub boxes: Vec<Bbox>,
    /// 不贴近图像边缘的框
    pub completed: Vec<Bbox>,
    /// 完整框中去除重复后的框
    pub valid: Vec<Bbox>,
}

impl Boxes {
    pub fn new(boxes: Vec<Bbox>, img_w: u32, img_h: u32, params: &ResultConfig) -> Self {
        let completed: Vec<Bbox> = boxes
            .iter()
            .filter(|b| b.is_complete(img_w, img_h, params.x_tolerance, params.y_tolerance))
            .cloned()
            .collect();
        let valid = valid_boxes(&completed, params.duplicate_distance);
        Self {
            boxes,
            completed,
            valid,
        }
    }
}

/// 中心距离不超过 `distance` 的框互为邻居。
/// 没有邻居, 或所有邻居置信度都严格更低的框保留。
fn valid_boxes(completed: &[Bbox], distance: f32) -> Vec<Bbox> {
    completed
        .iter()
        .enumerate()
        .filter(|(i, actual)| {
            completed
                .iter()
                .enumerate()
                .filter(|(j, other)| j != i && actual.center_distance(other) <= distance)
                .all(|(_, other)| other.confidence() < actual.confidence())
        })
        .map(|(_, b)| b.clone())
        .collect()
}

/// 带图像信息的检测结果
#[derive(Debug, Clone, PartialEq)]
pub struct FrameResult {
    pub width: u32,
    pub height: u32,
    pub names: Vec<String>,
    pub boxes: Option<Boxes>,
}

impl FrameResult {
    pub fn new(
        result: &DetectionResult,
        width: u32,
        height: u32,
        names: &[String],
        params: &ResultConfig,
    ) -> Self {
        let boxes = if result.is_empty() {
            None
        } else {
            Some(Boxes::new(result.bboxes.clone(), width, height, params))
        };
        Self {
            width,
            height,
            names: names.to_vec(),
            boxes,
        }
    }

    pub fn all_boxes(&self) -> &[Bbox] {
        self.boxes.as_ref().map(|b| b.boxes.as_slice()).unwrap_or(&[])
    }

    pub fn completed_boxes(&self) -> &[Bbox] {
        self.boxes
            .as_ref()
            .map(|b| b.completed.as_slice())
            .unwrap_or(&[])
    }

    pub fn valid_boxes(&self) -> &[Bbox] {
        self.boxes.as_ref().map(|b| b.valid.as_slice()).unwrap_or(&[])
    }

    /// 类别名, 越界时为 "unknown"
    pub fn name(&self, id: usize) -> &str {
        self.names.get(id).map(String::as_str).unwrap_or("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(cx: f32, cy: f32, conf: f32) -> Bbox {
        Bbox::from_xyxy(cx - 10., cy - 10., cx + 10., cy + 10., 0, conf)
    }

    #[test]
    fn isolated_and_best_survive() {
        let params = ResultConfig::default();
        let boxes = Boxes::new(
            vec![
                bbox(100., 100., 0.9),
                bbox(110., 100., 0.6), // 距离10, 置信度更低
                bbox(300., 300., 0.4), // 孤立
            ],
            640,
            480,
            &params,
        );
        assert_eq!(boxes.completed.len(), 3);
        let confs: Vec<f32> = boxes.valid.iter().map(Bbox::confidence).collect();
        assert_eq!(confs, vec![0.9, 0.4]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let params = ResultConfig::default();
        let boxes = Boxes::new(
            vec![bbox(100., 100., 0.9), bbox(120., 100., 0.5)],
            640,
            480,
            &params,
        );
        assert_eq!(boxes.valid.len(), 1);

        let boxes = Boxes::new(
            vec![bbox(100., 100., 0.9), bbox(121., 100., 0.5)],
            640,
            480,
            &params,
        );
        assert_eq!(boxes.valid.len(), 2);
    }

    #[test]
    fn equal_confidence_suppresses_both() {
        let params = ResultConfig::default();
        let boxes = Boxes::new(
            vec![bbox(100., 100., 0.7), bbox(105., 100., 0.7)],
            640,
            480,
            &params,
        );
        assert!(boxes.valid.is_empty());
    }

    #[test]
    fn incomplete_boxes_are_excluded() {
        let params = ResultConfig::default();
        let boxes = Boxes::new(
            vec![bbox(12., 100., 0.9), bbox(300., 300., 0.5)],
            640,
            480,
            &params,
        );
        assert_eq!(boxes.completed.len(), 1);
        assert_eq!(boxes.valid[0].confidence(), 0.5);
    }

    #[test]
    fn empty_result_has_no_boxes() {
        let result = FrameResult::new(
            &DetectionResult::default(),
            640,
            480,
            &["a".into()],
            &ResultConfig::default(),
        );
        assert!(result.boxes.is_none());
        assert!(result.completed_boxes().is_empty());
        assert!(result.valid_boxes().is_empty());
        assert_eq!(result.name(0), "a");
        assert_eq!(result.name(5), "unknown");
    }
}
