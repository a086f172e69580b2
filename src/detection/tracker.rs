// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测结果历史

use std::collections::VecDeque;

use image::{DynamicImage, RgbImage};

use super::results::FrameResult;
use crate::config::ResultConfig;
use crate::render;

/// 最近若干帧的检测结果
#[derive(Debug, Clone, Default)]
pub struct ResultTracker {
    history: VecDeque<FrameResult>,
}

impl ResultTracker {
    pub const MAX_RESULTS: usize = 5;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_new_result(&mut self, result: FrameResult) {
        self.history.push_back(result);
        while self.history.len() > Self::MAX_RESULTS {
            self.history.pop_front();
        }
    }

    pub fn last(&self) -> Option<&FrameResult> {
        self.history.back()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameResult> {
        self.history.iter()
    }

    /// 在图像上绘制最新结果, 没有结果时原样返回
    pub fn plot(&self, img: &DynamicImage, params: &ResultConfig) -> RgbImage {
        match self.last() {
            Some(result) => render::plot_result(img, result, params, render::font::default_font()),
            None => img.to_rgb8(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DetectionResult;

    #[test]
    fn history_is_bounded() {
        let mut tracker = ResultTracker::new();
        assert!(tracker.last().is_none());
        for width in 1..=8 {
            tracker.add_new_result(FrameResult::new(
                &DetectionResult::default(),
                width,
                10,
                &[],
                &ResultConfig::default(),
            ));
            assert!(tracker.len() <= ResultTracker::MAX_RESULTS);
        }
        assert_eq!(tracker.len(), 5);
        assert_eq!(tracker.last().map(|r| r.width), Some(8));
        assert_eq!(tracker.iter().next().map(|r| r.width), Some(4));
    }
}
