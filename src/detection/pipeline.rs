//! 流水线编排 (Pipeline Orchestrator)
//!
//! decode → filter → NMS → 排序截断, 每次调用都是纯函数, 组件之间
//! 不保留任何状态. 核心算法不含日志, 各阶段计数通过 [`StageStats`]
//! 返回, 由外层 (CLI/worker) 决定是否记录

use std::cmp::Ordering;

use anyhow::{ensure, Result};
use ndarray::ArrayViewD;
use serde::Serialize;

use crate::config::DetectorConfig;

use super::decoder::{decode_output, tensor_as_flat};
use super::distance::estimate_distance;
use super::filter::filter_candidates;
use super::nms::non_max_suppression;
use super::types::Detection;

/// 各阶段计数 (供外层日志/监控使用)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageStats {
    /// 解码出的候选总数
    pub decoded: usize,
    /// 置信度阈值之上的候选数
    pub above_threshold: usize,
    /// 几何过滤后
    pub after_filter: usize,
    /// NMS 后
    pub after_nms: usize,
    /// 截断后最终返回数
    pub returned: usize,
}

/// 坑洼检测后处理器
///
/// 持有一份校验过的配置, 本身无可变状态, 可跨帧复用;
/// 空结果是正常返回值 ("没有检测到坑洼"), 不是错误
pub struct Detector {
    config: DetectorConfig,
}

impl Detector {
    /// 创建检测器; 非法配置立即报错, 不做静默降级
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// 后处理主入口: channel-major 原始输出缓冲区 → 检测结果
    ///
    /// 输出按置信度降序, 最多 max_results 个
    pub fn detect(
        &self,
        raw: &[f32],
        image_width: u32,
        image_height: u32,
    ) -> Result<Vec<Detection>> {
        self.detect_with_stats(raw, image_width, image_height)
            .map(|(detections, _)| detections)
    }

    /// 同 [`Self::detect`], 额外返回各阶段计数
    pub fn detect_with_stats(
        &self,
        raw: &[f32],
        image_width: u32,
        image_height: u32,
    ) -> Result<(Vec<Detection>, StageStats)> {
        ensure!(
            image_width > 0 && image_height > 0,
            "image dimensions must be positive, got {}x{}",
            image_width,
            image_height
        );

        let candidates = decode_output(
            raw,
            self.config.num_candidates,
            self.config.channels_per_candidate,
        )?;
        let decoded = candidates.len();
        let above_threshold = candidates
            .iter()
            .filter(|c| c.confidence >= self.config.confidence_threshold)
            .count();

        let detections = filter_candidates(
            &candidates,
            &self.config,
            image_width as f32,
            image_height as f32,
        );
        let after_filter = detections.len();

        let mut detections = non_max_suppression(detections, self.config.iou_threshold);
        let after_nms = detections.len();

        // NMS 输出已经降序, 这里重申一次排序再截断
        detections.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });
        detections.truncate(self.config.max_results);
        let returned = detections.len();

        Ok((
            detections,
            StageStats {
                decoded,
                above_threshold,
                after_filter,
                after_nms,
                returned,
            },
        ))
    }

    /// ndarray 入口: 校验张量形状后走 [`Self::detect`]
    pub fn detect_tensor(
        &self,
        tensor: &ArrayViewD<'_, f32>,
        image_width: u32,
        image_height: u32,
    ) -> Result<Vec<Detection>> {
        let raw = tensor_as_flat(
            tensor,
            self.config.num_candidates,
            self.config.channels_per_candidate,
        )?;
        self.detect(raw, image_width, image_height)
    }

    /// 距离标注: 对已有检测结果就地填充 distance 字段
    ///
    /// 独立于 detect, 调用方自行决定是否执行 (实时渲染可能不需要)
    pub fn annotate_distances(&self, detections: &mut [Detection]) {
        for det in detections.iter_mut() {
            det.distance = Some(estimate_distance(
                &det.bbox,
                self.config.known_size,
                self.config.calibration_factor,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 小规模配置, 便于手工构造缓冲区
    fn small_config(num_candidates: usize, threshold: f32) -> DetectorConfig {
        DetectorConfig {
            confidence_threshold: threshold,
            num_candidates,
            ..Default::default()
        }
    }

    /// 把 (cx,cy,w,h,conf) 写入 channel-major 缓冲区的候选 i
    fn plant(raw: &mut [f32], n: usize, i: usize, values: [f32; 5]) {
        for (c, v) in values.iter().enumerate() {
            raw[c * n + i] = *v;
        }
    }

    #[test]
    fn test_single_candidate_scenario() {
        let n = 16;
        let config = small_config(n, 0.5);
        let detector = Detector::new(config).unwrap();

        let mut raw = vec![0.0f32; 5 * n];
        plant(&mut raw, n, 3, [0.5, 0.5, 0.1, 0.1, 0.9]);

        let (detections, stats) = detector.detect_with_stats(&raw, 640, 640).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(stats.decoded, n);
        assert_eq!(stats.above_threshold, 1);
        assert_eq!(stats.after_filter, 1);
        assert_eq!(stats.after_nms, 1);
        assert_eq!(stats.returned, 1);

        let bbox = &detections[0].bbox;
        assert!((bbox.left() - 288.0).abs() < 1e-3);
        assert!((bbox.top() - 288.0).abs() < 1e-3);
        assert!((bbox.right() - 352.0).abs() < 1e-3);
        assert!((bbox.bottom() - 352.0).abs() < 1e-3);
    }

    #[test]
    fn test_empty_output_is_not_an_error() {
        let n = 8;
        let detector = Detector::new(small_config(n, 0.5)).unwrap();
        let raw = vec![0.0f32; 5 * n];
        let detections = detector.detect(&raw, 640, 640).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn test_zero_image_dimensions_rejected() {
        let n = 8;
        let detector = Detector::new(small_config(n, 0.5)).unwrap();
        let raw = vec![0.0f32; 5 * n];
        assert!(detector.detect(&raw, 0, 640).is_err());
        assert!(detector.detect(&raw, 640, 0).is_err());
    }

    #[test]
    fn test_max_results_cap_keeps_highest_confidence() {
        let n = 16;
        let mut config = small_config(n, 0.1);
        config.max_results = 2;
        let detector = Detector::new(config).unwrap();

        // 四个互不重叠的框, 置信度递增
        let mut raw = vec![0.0f32; 5 * n];
        plant(&mut raw, n, 0, [0.2, 0.2, 0.1, 0.1, 0.4]);
        plant(&mut raw, n, 1, [0.8, 0.2, 0.1, 0.1, 0.6]);
        plant(&mut raw, n, 2, [0.2, 0.8, 0.1, 0.1, 0.8]);
        plant(&mut raw, n, 3, [0.8, 0.8, 0.1, 0.1, 0.9]);

        let detections = detector.detect(&raw, 640, 640).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].confidence, 0.9);
        assert_eq!(detections[1].confidence, 0.8);
    }

    #[test]
    fn test_overlap_suppressed_end_to_end() {
        let n = 8;
        let detector = Detector::new(small_config(n, 0.5)).unwrap();

        // 两个几乎重合的框 (IoU ≈ 0.95), 只保留 0.9
        let mut raw = vec![0.0f32; 5 * n];
        plant(&mut raw, n, 0, [0.500, 0.500, 0.200, 0.200, 0.7]);
        plant(&mut raw, n, 1, [0.503, 0.503, 0.200, 0.200, 0.9]);

        let detections = detector.detect(&raw, 640, 640).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].confidence, 0.9);
    }

    #[test]
    fn test_detect_tensor_shape_mismatch() {
        use ndarray::Array;

        let n = 8;
        let detector = Detector::new(small_config(n, 0.5)).unwrap();
        let tensor = Array::from_shape_vec((1, 5, n + 1), vec![0.0f32; 5 * (n + 1)])
            .unwrap()
            .into_dyn();
        assert!(detector.detect_tensor(&tensor.view(), 640, 640).is_err());
    }

    #[test]
    fn test_annotate_distances_fills_all() {
        let n = 8;
        let detector = Detector::new(small_config(n, 0.5)).unwrap();
        let mut raw = vec![0.0f32; 5 * n];
        plant(&mut raw, n, 0, [0.5, 0.5, 0.1, 0.1, 0.9]);

        let mut detections = detector.detect(&raw, 640, 640).unwrap();
        assert!(detections.iter().all(|d| d.distance.is_none()));

        detector.annotate_distances(&mut detections);
        assert!(detections.iter().all(|d| d.distance.is_some()));
    }
}
