//! 坑洼检测后处理 CLI
//!
//! 读取模型原始输出张量 (JSON 数组或小端 f32 裸数据), 跑完整后处理
//! 流水线, 可选输出 JSON 报告与标注图. --synth 模式用合成引擎自检,
//! 不需要任何外部文件

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::{bail, ensure, Context, Result};
use clap::Parser;
use ndarray::Array;
use serde::Serialize;

use pothole_rs::annotate;
use pothole_rs::{
    gen_time_string, Args, Detection, Detector, DetectorConfig, InferenceEngine, StageStats,
    SyntheticEngine,
};

/// JSON 报告结构
#[derive(Serialize)]
struct Report<'a> {
    image_width: u32,
    image_height: u32,
    detections: &'a [Detection],
    stats: StageStats,
}

/// 读取原始输出张量文件
///
/// .json 后缀按 f32 数组解析, 其余按小端 f32 裸数据
fn load_tensor(path: &Path) -> Result<Vec<f32>> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read tensor file {}", path.display()))?;

    if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_slice(&bytes).context("tensor file is not a JSON array of floats")
    } else {
        ensure!(
            bytes.len() % 4 == 0,
            "raw tensor file length {} is not a multiple of 4 bytes",
            bytes.len()
        );
        Ok(bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }
}

/// 合成引擎自检: 预置一对重叠框 + 一个孤立框 + 一个过小框,
/// 正好把过滤和 NMS 都走一遍
fn synth_output(config: &DetectorConfig) -> Result<Vec<f32>> {
    let conf = config.confidence_threshold * 10.0;
    let mut engine = SyntheticEngine::new(640, config.num_candidates, config.channels_per_candidate)
        .plant(0.50, 0.50, 0.20, 0.20, conf)
        .plant(0.51, 0.51, 0.20, 0.20, conf * 0.5)
        .plant(0.20, 0.70, 0.10, 0.10, conf * 0.8)
        .plant(0.80, 0.20, 0.005, 0.005, conf);

    let size = engine.input_size() as usize;
    let input = Array::zeros((1, 3, size, size)).into_dyn();
    engine.run(input.view())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // 配置: 精度决定默认阈值, 命令行可覆盖
    let mut config = DetectorConfig::for_precision(args.precision);
    if let Some(conf) = args.conf {
        config.confidence_threshold = conf;
    }
    config.iou_threshold = args.iou;
    config.max_results = args.max_results;

    // 图像尺寸: --image 优先, 否则必须显式给出
    let source_image = match &args.image {
        Some(path) => Some(
            image::open(path).with_context(|| format!("failed to open image {}", path.display()))?,
        ),
        None => None,
    };
    let (image_width, image_height) = match (&source_image, args.width, args.height) {
        (Some(img), _, _) => (img.width(), img.height()),
        (None, Some(w), Some(h)) => (w, h),
        _ => bail!("either --image or both --width and --height are required"),
    };

    // 原始输出张量
    let raw = if args.synth {
        println!("🧪 合成引擎自检模式");
        synth_output(&config)?
    } else {
        let path = args
            .tensor
            .as_ref()
            .context("--tensor is required unless --synth is set")?;
        load_tensor(path)?
    };

    let detector = Detector::new(config)?;

    let t_post = Instant::now();
    let (mut detections, stats) = detector.detect_with_stats(&raw, image_width, image_height)?;
    if args.profile {
        println!("[Postprocess]: {:?}", t_post.elapsed());
    }

    if args.distance {
        let t_dist = Instant::now();
        detector.annotate_distances(&mut detections);
        if args.profile {
            println!("[Distance]: {:?}", t_dist.elapsed());
        }
    }

    // 打印结果
    println!("\nDetection results ({}x{}):", image_width, image_height);
    if detections.is_empty() {
        println!("  No potholes detected");
    } else {
        println!("  Found {} potholes:", detections.len());
        for (i, det) in detections.iter().enumerate() {
            match det.distance {
                Some(d) => println!(
                    "    [{:2}] {} conf={:.5}, bbox=[{:.1}, {:.1}, {:.1}, {:.1}], distance={:.1}m",
                    i,
                    det.label,
                    det.confidence,
                    det.bbox.left(),
                    det.bbox.top(),
                    det.bbox.right(),
                    det.bbox.bottom(),
                    d
                ),
                None => println!(
                    "    [{:2}] {} conf={:.5}, bbox=[{:.1}, {:.1}, {:.1}, {:.1}]",
                    i,
                    det.label,
                    det.confidence,
                    det.bbox.left(),
                    det.bbox.top(),
                    det.bbox.right(),
                    det.bbox.bottom()
                ),
            }
        }
    }
    println!(
        "  Stages: decoded={} above_threshold={} after_filter={} after_nms={} returned={}",
        stats.decoded, stats.above_threshold, stats.after_filter, stats.after_nms, stats.returned
    );

    // JSON 报告
    if let Some(path) = &args.json {
        let report = Report {
            image_width,
            image_height,
            detections: &detections,
            stats,
        };
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json)
            .with_context(|| format!("failed to write JSON report {}", path.display()))?;
        println!("📄 JSON报告已保存: {}", path.display());
    }

    // 标注图
    if let Some(save_dir) = &args.save {
        let Some(img) = &source_image else {
            bail!("--save requires --image as the annotation base");
        };
        let font = match &args.font {
            Some(path) => Some(annotate::load_font(path)?),
            None => {
                println!("⚠️ 未提供字体文件, 标注图只画框不画字");
                None
            }
        };

        fs::create_dir_all(save_dir)
            .with_context(|| format!("failed to create output dir {}", save_dir.display()))?;
        let canvas = annotate::draw_detections(img, &detections, font.as_ref());
        let out_path = save_dir.join(format!("pothole_{}.png", gen_time_string("-")));
        canvas
            .save(&out_path)
            .with_context(|| format!("failed to save annotated image {}", out_path.display()))?;
        println!("💾 标注图已保存: {}", out_path.display());
    }

    Ok(())
}
