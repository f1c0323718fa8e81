//! NMS 引擎 (Non-Maximum Suppression)
//!
//! 经典贪心 NMS. 几何过滤后的候选数量很少 (经验上每帧不超过几十个),
//! O(n²) 两两 IoU 足够, 不需要空间索引

use std::cmp::Ordering;

use super::types::Detection;

/// 贪心 NMS: 返回按置信度降序排列的保留检测
///
/// 稳定排序, 置信度相同时保持输入相对顺序, 因此结果与输入顺序无关
/// 且完全确定. 输出保持降序是下游排序/截断逻辑依赖的隐式契约.
///
/// 算法: 降序排序后逐个接受未被抑制的检测, 对其后所有与已接受框
/// IoU > iou_threshold 的检测打抑制标记
pub fn non_max_suppression(detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    if detections.is_empty() {
        return detections;
    }

    let mut sorted = detections;
    sorted.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut suppressed = vec![false; sorted.len()];
    for i in 0..sorted.len() {
        if suppressed[i] {
            continue;
        }
        for j in (i + 1)..sorted.len() {
            if suppressed[j] {
                continue;
            }
            if sorted[i].bbox.iou(&sorted[j].bbox) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    sorted
        .into_iter()
        .zip(suppressed)
        .filter(|(_, s)| !*s)
        .map(|(det, _)| det)
        .collect()
}
