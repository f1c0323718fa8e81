//! 检测数据结构定义
//! Data structures for the detection pipeline

use serde::Serialize;

/// 坑洼类别标签 (单类模型唯一的类别)
pub const POTHOLE_LABEL: &str = "jalan_berlubang";

/// 解码后的单个候选 (模型输入尺寸的归一化坐标)
///
/// 只在一次 detect 调用内存活, 过滤后即丢弃, 不跨帧保留
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawCandidate {
    /// 中心点 x (归一化 0..1)
    pub cx: f32,
    /// 中心点 y (归一化 0..1)
    pub cy: f32,
    /// 宽 (归一化 0..1)
    pub w: f32,
    /// 高 (归一化 0..1)
    pub h: f32,
    /// 最高分类别
    pub class_id: usize,
    /// 原始置信度 (模型原始输出, 不保证是 [0,1] 概率)
    pub confidence: f32,
}

/// 检测框 (原图像素坐标)
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Bbox {
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

impl Bbox {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn left(&self) -> f32 {
        self.left
    }

    pub fn top(&self) -> f32 {
        self.top
    }

    pub fn right(&self) -> f32 {
        self.right
    }

    pub fn bottom(&self) -> f32 {
        self.bottom
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn intersection_area(&self, another: &Bbox) -> f32 {
        let l = self.left.max(another.left);
        let r = self.right.min(another.right);
        let t = self.top.max(another.top);
        let b = self.bottom.min(another.bottom);
        (r - l).max(0.0) * (b - t).max(0.0)
    }

    pub fn union(&self, another: &Bbox) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    /// IoU; union <= 0 时返回 0 (退化框保护, 避免除零)
    pub fn iou(&self, another: &Bbox) -> f32 {
        let union = self.union(another);
        if union <= 0.0 {
            return 0.0;
        }
        self.intersection_area(another) / union
    }
}

/// 单个检测结果 (流水线对外输出)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    /// 检测框 (原图像素坐标, 已钳位)
    pub bbox: Bbox,
    /// 类别编号
    pub class_id: usize,
    /// 类别标签
    pub label: String,
    /// 原始置信度
    pub confidence: f32,
    /// 估算距离 (米); None 表示尚未计算, 不代表"未知/无穷远"
    pub distance: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_geometry() {
        let b = Bbox::new(10.0, 20.0, 110.0, 70.0);
        assert_eq!(b.width(), 100.0);
        assert_eq!(b.height(), 50.0);
        assert_eq!(b.area(), 5000.0);
    }

    #[test]
    fn test_iou_disjoint_is_zero() {
        let a = Bbox::new(0.0, 0.0, 10.0, 10.0);
        let b = Bbox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.intersection_area(&b), 0.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_identical_is_one() {
        let a = Bbox::new(5.0, 5.0, 15.0, 25.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_partial_overlap() {
        // 两个 10x10 框, 重叠 5x10 → IoU = 50 / 150
        let a = Bbox::new(0.0, 0.0, 10.0, 10.0);
        let b = Bbox::new(5.0, 0.0, 15.0, 10.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_zero_union_guard() {
        // 零面积的退化框: union = 0, IoU 按约定为 0 而不是 NaN
        let a = Bbox::new(5.0, 5.0, 5.0, 5.0);
        let b = Bbox::new(5.0, 5.0, 5.0, 5.0);
        assert_eq!(a.iou(&b), 0.0);
    }
}
