//! 检测工作线程 (Detection Worker)
//!
//! 推理 + 后处理是 CPU 密集操作, 每帧可能耗时几十毫秒, 必须离开
//! UI/主线程. 同一路视频流不允许并发推理:
//! - submit 走容量 1 的通道加 try_send, 上一帧还在处理时新帧直接
//!   丢弃并计数 (丢帧优于无界排队和过期结果)
//! - 结果通道同样容量 1, 新结果覆盖未取走的旧结果 (latest wins)
//!
//! 引擎与检测器的所有权移交给线程独占, 天然满足"单实例单持有方"

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use ndarray::ArrayD;

use crate::config::DetectorConfig;
use crate::detection::{Detection, Detector, StageStats};
use crate::engine::InferenceEngine;

/// 待检测帧: 已预处理的输入张量 + 原图尺寸
///
/// 预处理 (resize/归一化) 由上游完成, worker 不做图像处理
pub struct Frame {
    pub tensor: ArrayD<f32>,
    pub image_width: u32,
    pub image_height: u32,
    pub frame_id: u64,
}

/// 单帧检测结果
#[derive(Debug, Clone)]
pub struct FrameDetections {
    pub frame_id: u64,
    pub detections: Vec<Detection>,
    pub stats: StageStats,
    /// 推理 + 后处理耗时
    pub inference_ms: f64,
}

enum WorkerMessage {
    Frame(Frame),
    Shutdown,
}

pub struct DetectionWorker {
    frame_tx: Sender<WorkerMessage>,
    result_rx: Receiver<Result<FrameDetections>>,
    handle: Option<JoinHandle<()>>,
    dropped_frames: u64,
}

impl DetectionWorker {
    /// 启动工作线程
    ///
    /// 引擎输出长度与配置不一致属于装配错误, 在这里一次性失败,
    /// 而不是每帧检查
    pub fn spawn(mut engine: Box<dyn InferenceEngine>, config: DetectorConfig) -> Result<Self> {
        let detector = Detector::new(config)?;
        anyhow::ensure!(
            engine.output_len() == detector.config().output_len(),
            "engine output length {} does not match configured {} (channels x candidates)",
            engine.output_len(),
            detector.config().output_len()
        );
        let (frame_tx, frame_rx) = bounded::<WorkerMessage>(1);
        let (result_tx, result_rx) = bounded::<Result<FrameDetections>>(1);
        let drain_rx = result_rx.clone();

        let handle = thread::spawn(move || {
            while let Ok(msg) = frame_rx.recv() {
                let frame = match msg {
                    WorkerMessage::Frame(frame) => frame,
                    WorkerMessage::Shutdown => break,
                };

                let start = Instant::now();
                let outcome = engine.run(frame.tensor.view()).and_then(|raw| {
                    detector.detect_with_stats(&raw, frame.image_width, frame.image_height)
                });
                let inference_ms = start.elapsed().as_secs_f64() * 1000.0;

                let result = outcome.map(|(detections, stats)| FrameDetections {
                    frame_id: frame.frame_id,
                    detections,
                    stats,
                    inference_ms,
                });

                // latest wins: 结果通道满时丢掉旧结果换新
                if let Err(TrySendError::Full(result)) = result_tx.try_send(result) {
                    let _ = drain_rx.try_recv();
                    let _ = result_tx.try_send(result);
                }
            }
        });

        Ok(Self {
            frame_tx,
            result_rx,
            handle: Some(handle),
            dropped_frames: 0,
        })
    }

    /// 提交一帧; 返回 false 表示上一帧仍在处理, 该帧被丢弃
    pub fn submit(&mut self, frame: Frame) -> bool {
        match self.frame_tx.try_send(WorkerMessage::Frame(frame)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped_frames += 1;
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// 取最新结果 (非阻塞); None 表示当前没有新结果
    pub fn try_latest(&self) -> Option<Result<FrameDetections>> {
        self.result_rx.try_recv().ok()
    }

    /// 限时等待下一个结果
    pub fn recv_latest(&self, timeout: Duration) -> Option<Result<FrameDetections>> {
        self.result_rx.recv_timeout(timeout).ok()
    }

    /// 因 in-flight 限制被丢弃的帧数
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// 关闭并等待线程退出
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.frame_tx.send(WorkerMessage::Shutdown);
            let _ = handle.join();
        }
    }
}

impl Drop for DetectionWorker {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}
