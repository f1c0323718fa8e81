//! 几何过滤器 (Geometric Filter)
//!
//! 置信度过滤 + 尺寸/形状合理性检查. 不满足的候选直接丢弃 (硬拒绝),
//! 永远不会进入 NMS

use crate::config::DetectorConfig;

use super::types::{Bbox, Detection, RawCandidate};

/// 过滤候选并转换为原图像素坐标的检测结果
///
/// 每个存活候选:
/// 1. 归一化中心/尺寸 → 原图像素角点
/// 2. 角点钳位到 [0, w] x [0, h]
/// 3. 边长 < min_box_dim 或面积占比 > max_area_ratio 的拒绝
///
/// 存活者的 distance 为 None, 由调用方决定是否标注
pub fn filter_candidates(
    candidates: &[RawCandidate],
    config: &DetectorConfig,
    image_width: f32,
    image_height: f32,
) -> Vec<Detection> {
    let image_area = image_width * image_height;
    let mut detections = Vec::new();

    for cand in candidates {
        if cand.confidence < config.confidence_threshold {
            continue;
        }

        let x1 = ((cand.cx - cand.w / 2.0) * image_width).clamp(0.0, image_width);
        let y1 = ((cand.cy - cand.h / 2.0) * image_height).clamp(0.0, image_height);
        let x2 = ((cand.cx + cand.w / 2.0) * image_width).clamp(0.0, image_width);
        let y2 = ((cand.cy + cand.h / 2.0) * image_height).clamp(0.0, image_height);

        let box_width = x2 - x1;
        let box_height = y2 - y1;

        // 退化的小框
        if box_width < config.min_box_dim || box_height < config.min_box_dim {
            continue;
        }
        // 覆盖几乎整个画面的框对路面坑洼不可能有效
        if box_width * box_height / image_area > config.max_area_ratio {
            continue;
        }

        detections.push(Detection {
            bbox: Bbox::new(x1, y1, x2, y2),
            class_id: cand.class_id,
            label: config
                .names
                .get(cand.class_id)
                .cloned()
                .unwrap_or_else(|| "unknown".to_string()),
            confidence: cand.confidence,
            distance: None,
        });
    }

    detections
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(cx: f32, cy: f32, w: f32, h: f32, confidence: f32) -> RawCandidate {
        RawCandidate {
            cx,
            cy,
            w,
            h,
            class_id: 0,
            confidence,
        }
    }

    fn test_config(threshold: f32) -> DetectorConfig {
        DetectorConfig {
            confidence_threshold: threshold,
            ..Default::default()
        }
    }

    #[test]
    fn test_below_threshold_dropped_first() {
        let config = test_config(0.5);
        let candidates = vec![candidate(0.5, 0.5, 0.1, 0.1, 0.49)];
        assert!(filter_candidates(&candidates, &config, 640.0, 640.0).is_empty());
    }

    #[test]
    fn test_pixel_conversion_and_label() {
        let config = test_config(0.5);
        let candidates = vec![candidate(0.5, 0.5, 0.1, 0.1, 0.9)];
        let detections = filter_candidates(&candidates, &config, 640.0, 640.0);
        assert_eq!(detections.len(), 1);

        let det = &detections[0];
        assert!((det.bbox.left() - 288.0).abs() < 1e-3);
        assert!((det.bbox.top() - 288.0).abs() < 1e-3);
        assert!((det.bbox.right() - 352.0).abs() < 1e-3);
        assert!((det.bbox.bottom() - 352.0).abs() < 1e-3);
        assert_eq!(det.label, crate::detection::POTHOLE_LABEL);
        assert_eq!(det.distance, None);
    }

    #[test]
    fn test_out_of_range_center_clamped() {
        // 中心在图外, 框的一半超出边界, 角点必须钳回图内
        let config = test_config(0.5);
        let candidates = vec![candidate(0.0, 0.0, 0.4, 0.4, 0.9)];
        let detections = filter_candidates(&candidates, &config, 640.0, 640.0);
        assert_eq!(detections.len(), 1);

        let det = &detections[0];
        assert_eq!(det.bbox.left(), 0.0);
        assert_eq!(det.bbox.top(), 0.0);
        assert!(det.bbox.right() <= 640.0 && det.bbox.bottom() <= 640.0);
    }

    #[test]
    fn test_tiny_box_rejected_regardless_of_confidence() {
        // 0.005 * 640 = 3.2px < 20px
        let config = test_config(0.5);
        let candidates = vec![candidate(0.5, 0.5, 0.005, 0.005, 0.99)];
        assert!(filter_candidates(&candidates, &config, 640.0, 640.0).is_empty());
    }

    #[test]
    fn test_near_full_frame_box_rejected() {
        let config = test_config(0.5);
        let candidates = vec![candidate(0.5, 0.5, 0.95, 0.95, 0.99)];
        assert!(filter_candidates(&candidates, &config, 640.0, 640.0).is_empty());
    }

    #[test]
    fn test_negative_size_candidate_rejected() {
        // 垃圾输出可能产出负宽高, 角点次序颠倒, 过滤必须拒绝
        let config = test_config(0.5);
        let candidates = vec![candidate(0.5, 0.5, -0.2, -0.2, 0.99)];
        assert!(filter_candidates(&candidates, &config, 640.0, 640.0).is_empty());
    }
}
