//! 距离估算 (Distance Estimation)
//!
//! 单目"表观尺寸"距离模型: distance = (真实尺寸 × 标定系数) / 像素尺寸.
//! 标定系数是经验值, 代替真实的焦距/传感器标定, 所以这是启发式估算
//! 而不是测量; 下限/钳位行为是对外承诺的一部分, 系数本身可调

use super::types::Bbox;

/// 低于该像素尺寸的框无法给出有意义的估算, 返回 0.0 (退化下限, 不是错误)
pub const MIN_ESTIMABLE_BOX: f32 = 5.0;

/// 估算结果的合理范围 (米), 超出按边界钳位而不是拒绝
pub const DISTANCE_RANGE: (f32, f32) = (0.5, 50.0);

/// 估算检测框对应目标的距离 (米)
///
/// 取高宽中较大者作为像素尺寸, 对形状不规则/任意朝向的坑洼保持
/// 方向不变性
pub fn estimate_distance(bbox: &Bbox, known_size: f32, calibration_factor: f32) -> f32 {
    let box_size = bbox.height().max(bbox.width());
    if box_size < MIN_ESTIMABLE_BOX {
        return 0.0;
    }

    let distance = (known_size * calibration_factor) / box_size;
    distance.clamp(DISTANCE_RANGE.0, DISTANCE_RANGE.1)
}
