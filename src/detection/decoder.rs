//! 张量解码器 (Tensor Decoder)
//!
//! YOLOv8/v11 检测头输出为 channel-major 布局 [1, C, N], 相对常见的
//! [N, C] 是转置过的: 候选 i 的通道 c 位于 raw[c * N + i].
//! 按行主序误读不会崩溃, 只会静默产出垃圾框, 所以步长是这里唯一
//! 必须严格保证的行为. 本模块只做纯粹的 reshape, 不带任何阈值逻辑

use anyhow::{anyhow, ensure, Result};
use ndarray::ArrayViewD;

use super::types::RawCandidate;

/// 解码 channel-major 原始输出缓冲区
///
/// 布局 [C, N]: 通道 0..4 为 cx, cy, w, h, 通道 4.. 为各类别分数,
/// 多类别时取最高分通道 (单类模型即通道 4).
/// 缓冲区长度与 C*N 不符说明模型与配置不匹配, 属于配置错误, 立即报错
pub fn decode_output(
    raw: &[f32],
    num_candidates: usize,
    channels_per_candidate: usize,
) -> Result<Vec<RawCandidate>> {
    ensure!(num_candidates > 0, "num_candidates must be positive");
    ensure!(
        channels_per_candidate >= 5,
        "channels_per_candidate must be >= 5 (4 box coords + at least 1 class), got {}",
        channels_per_candidate
    );
    ensure!(
        raw.len() == num_candidates * channels_per_candidate,
        "raw output length {} does not match channels x candidates = {} x {} (model/config mismatch)",
        raw.len(),
        channels_per_candidate,
        num_candidates
    );

    let n = num_candidates;
    let num_classes = channels_per_candidate - 4;
    let mut candidates = Vec::with_capacity(n);

    for i in 0..n {
        let cx = raw[i];
        let cy = raw[n + i];
        let w = raw[2 * n + i];
        let h = raw[3 * n + i];

        let mut class_id = 0;
        let mut confidence = raw[4 * n + i];
        for c in 1..num_classes {
            let score = raw[(4 + c) * n + i];
            if score > confidence {
                class_id = c;
                confidence = score;
            }
        }

        candidates.push(RawCandidate {
            cx,
            cy,
            w,
            h,
            class_id,
            confidence,
        });
    }

    Ok(candidates)
}

/// 校验 ndarray 张量形状并取出 channel-major 平面切片
///
/// 接受 [C, N] 或 [1, C, N]; C-order 连续内存下两者的扁平布局一致
pub fn tensor_as_flat<'a>(
    tensor: &ArrayViewD<'a, f32>,
    num_candidates: usize,
    channels_per_candidate: usize,
) -> Result<&'a [f32]> {
    let shape = tensor.shape();
    let shape_ok = match *shape {
        [c, n] => c == channels_per_candidate && n == num_candidates,
        [1, c, n] => c == channels_per_candidate && n == num_candidates,
        _ => false,
    };
    ensure!(
        shape_ok,
        "output tensor shape {:?} does not match expected [1, {}, {}]",
        shape,
        channels_per_candidate,
        num_candidates
    );
    tensor
        .to_slice()
        .ok_or_else(|| anyhow!("output tensor is not contiguous standard-layout memory"))
}
