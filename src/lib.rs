pub mod annotate; // 检测结果绘制
pub mod config; // 流水线配置参数
pub mod detection; // 检测后处理流水线
pub mod engine; // 推理引擎黑盒接口
pub mod worker; // 检测工作线程

pub use crate::config::{Args, DetectorConfig, ModelPrecision};
pub use crate::detection::{
    decode_output, estimate_distance, filter_candidates, non_max_suppression, Bbox, Detection,
    Detector, RawCandidate, StageStats, POTHOLE_LABEL,
};
pub use crate::engine::{InferenceEngine, InterpreterGuard, SharedInterpreter, SyntheticEngine};
pub use crate::worker::{DetectionWorker, Frame, FrameDetections};

pub fn gen_time_string(delimiter: &str) -> String {
    let offset = chrono::FixedOffset::east_opt(8 * 60 * 60).unwrap(); // Beijing
    let t_now = chrono::Utc::now().with_timezone(&offset);
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S{}%f",
        delimiter, delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}
