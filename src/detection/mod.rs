// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测结果 (Detection Results)
///
/// - types:   点、检测框、单帧检测结果
/// - results: 完整框 / 有效框过滤
/// - tracker: 最近结果历史
pub mod results;
pub mod tracker;
pub mod types;

pub use results::{Boxes, FrameResult};
pub use tracker::ResultTracker;
pub use types::{Bbox, DetectionResult, Point};
