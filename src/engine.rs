//! 推理引擎黑盒接口 (Inference Engine Boundary)
//!
//! 流水线把推理引擎当作黑盒: 吃预处理张量, 吐定长原始缓冲区,
//! 从不触碰模型权重/结构. 引擎实例同一时刻只允许一个调用方持有;
//! 共享场景通过 [`SharedInterpreter::acquire`] 串行化, guard 离开
//! 作用域 (包括错误路径) 即释放

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use ndarray::ArrayViewD;

/// 推理引擎统一接口
///
/// 实现方契约:
/// - `input_size` 返回模型输入边长 S (输入张量 1×3×S×S 或 1×S×S×3,
///   由上游预处理器保证, 引擎不校验 resize 的正确性)
/// - `run` 返回恰好 `output_len` 个 f32, channel-major 布局
/// - `run` 之外不得保留输入张量的任何引用
pub trait InferenceEngine: Send {
    /// 引擎标识
    fn name(&self) -> &'static str;

    /// 模型输入边长 (像素)
    fn input_size(&self) -> u32;

    /// 原始输出缓冲区长度 (channels × candidates)
    fn output_len(&self) -> usize;

    /// 执行一次前向推理
    fn run(&mut self, input: ArrayViewD<'_, f32>) -> Result<Vec<f32>>;
}

/// 可共享的解释器句柄
///
/// 对同一引擎实例的并发调用不安全, 必须串行化. acquire 返回的
/// guard 保证独占访问, 释放由 Drop 保证, 所有退出路径都会执行
pub struct SharedInterpreter {
    inner: Arc<Mutex<Box<dyn InferenceEngine>>>,
}

impl SharedInterpreter {
    pub fn new(engine: Box<dyn InferenceEngine>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// 独占获取引擎
    ///
    /// 锁中毒说明某个持有方 panic, 引擎状态不可信, 按硬错误上报
    pub fn acquire(&self) -> Result<InterpreterGuard<'_>> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("interpreter lock poisoned by a panicked holder"))?;
        Ok(InterpreterGuard { guard })
    }
}

impl Clone for SharedInterpreter {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// 独占引擎访问凭证 (Drop 即释放)
pub struct InterpreterGuard<'a> {
    guard: MutexGuard<'a, Box<dyn InferenceEngine>>,
}

impl InterpreterGuard<'_> {
    pub fn engine(&mut self) -> &mut dyn InferenceEngine {
        self.guard.as_mut()
    }
}

/// 合成引擎 (测试/自检用)
///
/// 把预置的候选写入 channel-major 缓冲区, 其余槽位全零.
/// 不做任何真实推理, 输入张量只检查存在性
pub struct SyntheticEngine {
    input_size: u32,
    num_candidates: usize,
    channels_per_candidate: usize,
    planted: Vec<[f32; 5]>,
}

impl SyntheticEngine {
    pub fn new(input_size: u32, num_candidates: usize, channels_per_candidate: usize) -> Self {
        Self {
            input_size,
            num_candidates,
            channels_per_candidate,
            planted: Vec::new(),
        }
    }

    /// 预置一个候选 (cx, cy, w, h 归一化坐标, conf 原始置信度)
    pub fn plant(mut self, cx: f32, cy: f32, w: f32, h: f32, confidence: f32) -> Self {
        self.planted.push([cx, cy, w, h, confidence]);
        self
    }

    /// 生成 channel-major 原始输出缓冲区
    pub fn raw_output(&self) -> Vec<f32> {
        let n = self.num_candidates;
        let mut raw = vec![0.0f32; self.output_len()];
        for (i, values) in self.planted.iter().enumerate().take(n) {
            for (c, v) in values.iter().enumerate() {
                raw[c * n + i] = *v;
            }
        }
        raw
    }
}

impl InferenceEngine for SyntheticEngine {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn output_len(&self) -> usize {
        self.num_candidates * self.channels_per_candidate
    }

    fn run(&mut self, _input: ArrayViewD<'_, f32>) -> Result<Vec<f32>> {
        Ok(self.raw_output())
    }
}
