// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! YOLO 模型管理 (YOLO Model Manager)
//!
//! ```text
//! 摄像头采集 → 图像数据集 → 标注导出 → 划分 → 训练 → 导出ONNX → 实时测试
//! ```

pub mod camera; // 摄像头枚举、参数与采集
pub mod cli; // 命令行子命令
pub mod config; // TOML配置与路径
pub mod detection; // 检测结果过滤与历史
pub mod error;
pub mod filesystem; // 数据集目录与元数据
pub mod imaging; // 滤镜与图像网格
pub mod logging;
pub mod model; // ONNX推理、导出与训练
pub mod render; // 检测结果绘制
pub mod stream; // 实时画面窗口
pub mod utils;

pub use crate::config::{AppConfig, Paths};
pub use crate::detection::{Bbox, DetectionResult};
pub use crate::error::{Error, Result};

/// 按置信度降序, 丢弃与已保留框 IoU 超过阈值的框
pub fn non_max_suppression(xs: &mut Vec<Bbox>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| {
        b2.confidence()
            .partial_cmp(&b1.confidence())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = xs[prev_index].iou(&xs[index]);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}
