//! 检测后处理流水线 (Detection Post-processing)
//!
//! 原始输出张量 → 解码 → 几何过滤 → NMS → (可选) 距离估算
//! - Decoder:  channel-major 张量解码
//! - Filter:   尺寸/形状合理性过滤
//! - NMS:      重叠框去重
//! - Distance: 单目距离估算
pub mod decoder;
pub mod distance;
pub mod filter;
pub mod nms;
pub mod pipeline;
pub mod types;

pub use decoder::decode_output;
pub use distance::estimate_distance;
pub use filter::filter_candidates;
pub use nms::non_max_suppression;
pub use pipeline::{Detector, StageStats};
pub use types::{Bbox, Detection, RawCandidate, POTHOLE_LABEL};
