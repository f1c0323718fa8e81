//! 检测结果绘制 (Detection Annotation)
//!
//! 在原图上画检测框与标签, 供 CLI 输出标注图.
//! 字体运行时从路径加载 (参考 assets/font/ 约定), 未提供字体时
//! 只画框不画字

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::detection::Detection;

/// 框颜色: 亮绿, 与路面对比明显
const BOX_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
/// 标签文字颜色
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 0, 255]);
/// 标签字号
const LABEL_SCALE: f32 = 18.0;

/// 从路径加载 TTF/OTF 字体
pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read font file {}", path.display()))?;
    FontVec::try_from_vec(bytes).context("failed to parse font file")
}

/// 把检测结果画到图片上, 返回标注后的 RGBA 图
///
/// 标签格式: "jalan_berlubang conf=0.900 3.1m" (有距离时)
pub fn draw_detections(
    image: &DynamicImage,
    detections: &[Detection],
    font: Option<&FontVec>,
) -> RgbaImage {
    let mut canvas = image.to_rgba8();

    for det in detections {
        let left = det.bbox.left().round() as i32;
        let top = det.bbox.top().round() as i32;
        let w = det.bbox.width().round().max(1.0) as u32;
        let h = det.bbox.height().round().max(1.0) as u32;

        // 双线加粗
        draw_hollow_rect_mut(&mut canvas, Rect::at(left, top).of_size(w, h), BOX_COLOR);
        if w > 2 && h > 2 {
            draw_hollow_rect_mut(
                &mut canvas,
                Rect::at(left + 1, top + 1).of_size(w - 2, h - 2),
                BOX_COLOR,
            );
        }

        if let Some(font) = font {
            let label = match det.distance {
                Some(d) => format!("{} conf={:.3} {:.1}m", det.label, det.confidence, d),
                None => format!("{} conf={:.3}", det.label, det.confidence),
            };
            // 标签画在框上方, 贴近上边缘时画到框内
            let text_y = (top - LABEL_SCALE as i32 - 2).max(0);
            draw_text_mut(
                &mut canvas,
                TEXT_COLOR,
                left,
                text_y,
                PxScale::from(LABEL_SCALE),
                font,
                &label,
            );
        }
    }

    canvas
}
