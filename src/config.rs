//! 流水线配置参数 (Pipeline Configuration)
//!
//! 所有可调参数集中到一个显式的 [`DetectorConfig`], 由调用方在构建时传入,
//! 测试可以按场景覆盖, 不依赖任何全局状态

use std::path::PathBuf;

use anyhow::{ensure, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::detection::POTHOLE_LABEL;

/// 模型量化精度
///
/// INT8 量化模型的原始输出与 FP32 相差几个数量级 (约 1e-5 vs 1e-1),
/// 说明量化变体的输出并不是标准 sigmoid 概率. 阈值按模型工件单独标定,
/// 当作不透明的校准值使用, 不做任何"归一化修正"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ModelPrecision {
    /// INT8 量化 (实时场景)
    Int8,
    /// FP32 全精度
    Fp32,
}

impl ModelPrecision {
    /// 获取该精度推荐的置信度阈值
    pub fn default_conf_threshold(&self) -> f32 {
        match self {
            ModelPrecision::Int8 => 0.00002, // INT8输出数值极小, 经验标定
            ModelPrecision::Fp32 => 0.25,
        }
    }
}

/// 检测后处理配置
///
/// 默认值对应实际部署的 INT8 量化 YOLOv11 单类模型
/// (输入 640x640, 输出 [1, 5, 8400])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// 置信度阈值 (按模型工件标定, 见 [`ModelPrecision`])
    pub confidence_threshold: f32,
    /// NMS IoU 阈值
    pub iou_threshold: f32,
    /// 单帧最大输出数量
    pub max_results: usize,
    /// 输出候选槽位数
    pub num_candidates: usize,
    /// 每候选通道数: cx, cy, w, h + 各类别分数
    pub channels_per_candidate: usize,
    /// 检测框最小边长 (像素), 低于视为退化框
    pub min_box_dim: f32,
    /// 检测框最大面积占比 (框面积/图像面积), 超出对坑洼不可能有效
    pub max_area_ratio: f32,
    /// 目标真实尺寸 (米), 路面坑洼典型直径 30-50cm
    pub known_size: f32,
    /// 距离估算标定系数 (经验值, 代替真实焦距/传感器标定)
    pub calibration_factor: f32,
    /// 类别名称表, 长度必须等于 channels_per_candidate - 4
    pub names: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: ModelPrecision::Int8.default_conf_threshold(),
            iou_threshold: 0.3,
            max_results: 5,
            num_candidates: 8400,
            channels_per_candidate: 5,
            min_box_dim: 20.0,
            max_area_ratio: 0.8,
            known_size: 0.5,
            calibration_factor: 100.0,
            names: vec![POTHOLE_LABEL.to_string()],
        }
    }
}

impl DetectorConfig {
    /// 按模型精度生成配置 (只有置信度阈值随精度变化)
    pub fn for_precision(precision: ModelPrecision) -> Self {
        Self {
            confidence_threshold: precision.default_conf_threshold(),
            ..Default::default()
        }
    }

    /// 类别数量
    pub fn num_classes(&self) -> usize {
        self.channels_per_candidate.saturating_sub(4)
    }

    /// 原始输出缓冲区的期望长度
    pub fn output_len(&self) -> usize {
        self.channels_per_candidate * self.num_candidates
    }

    /// 配置合法性校验
    ///
    /// 非法配置属于调用方错误, 在构建检测器时立即失败, 不做静默降级
    pub fn validate(&self) -> Result<()> {
        ensure!(self.num_candidates > 0, "num_candidates must be positive");
        ensure!(
            self.channels_per_candidate >= 5,
            "channels_per_candidate must be >= 5 (4 box coords + at least 1 class), got {}",
            self.channels_per_candidate
        );
        ensure!(
            self.names.len() == self.num_classes(),
            "names table has {} entries but model declares {} classes",
            self.names.len(),
            self.num_classes()
        );
        ensure!(self.max_results > 0, "max_results must be positive");
        ensure!(
            self.iou_threshold > 0.0 && self.iou_threshold <= 1.0,
            "iou_threshold must be in (0, 1], got {}",
            self.iou_threshold
        );
        ensure!(
            self.min_box_dim >= 0.0,
            "min_box_dim must be non-negative, got {}",
            self.min_box_dim
        );
        ensure!(
            self.max_area_ratio > 0.0 && self.max_area_ratio <= 1.0,
            "max_area_ratio must be in (0, 1], got {}",
            self.max_area_ratio
        );
        ensure!(
            self.known_size > 0.0 && self.calibration_factor > 0.0,
            "distance calibration values must be positive"
        );
        Ok(())
    }
}

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "pothole", about = "路面坑洼检测后处理 (decode → filter → NMS → distance)")]
pub struct Args {
    /// 模型原始输出张量 (.json 数组, 或小端 f32 裸数据)
    #[arg(long)]
    pub tensor: Option<PathBuf>,

    /// 原始图片路径 (提供图像尺寸, 同时作为标注底图)
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// 图像宽度 (无 --image 时必填)
    #[arg(long)]
    pub width: Option<u32>,

    /// 图像高度 (无 --image 时必填)
    #[arg(long)]
    pub height: Option<u32>,

    /// 模型量化精度 (决定默认置信度阈值)
    #[arg(long, value_enum, default_value_t = ModelPrecision::Int8)]
    pub precision: ModelPrecision,

    /// 置信度阈值 (缺省按 --precision 标定)
    #[arg(long)]
    pub conf: Option<f32>,

    /// NMS IoU 阈值
    #[arg(long, default_value_t = 0.3)]
    pub iou: f32,

    /// 单帧最大输出数量
    #[arg(long, default_value_t = 5)]
    pub max_results: usize,

    /// 估算每个检测框的距离
    #[arg(long)]
    pub distance: bool,

    /// 合成引擎自检模式 (不读取张量文件)
    #[arg(long)]
    pub synth: bool,

    /// JSON 报告输出路径
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// 标注图输出目录 (需要 --image)
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// 标注文字字体文件 (TTF/OTF), 缺省只画框不画字
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// 启用性能分析
    #[arg(long)]
    pub profile: bool,
}
