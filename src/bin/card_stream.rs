// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
//! 卡牌检测推送 - YOLOv5 检测 + 时序过滤 + WebSocket 推送
//!
//! 主程序入口 - 直接运行: cargo run --bin card-stream --features onnx --release -- -s frames/
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use card_stream::input::ImageSequence;
use card_stream::mapping::load_class_list;
use card_stream::models::yolov5::Device;
use card_stream::models::{Model, YOLOv5};
use card_stream::overlay::{load_font, FrameWriter, Overlay};
use card_stream::{Args, Pipeline, PipelineConfig, StreamClient};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    // 1. 配置 (无效配置直接退出)
    let config = PipelineConfig::load(&args.config)?;
    config.print_summary();

    // 2. 类别列表, 数量必须与模型类别数一致
    let class_names = load_class_list(&args.classes)?;
    config.check_class_list(&class_names)?;

    // 3. 推送线程先启动, 连接失败不影响检测
    let (client, transport) = StreamClient::connect(&args.endpoint)?;
    info!("📡 推送地址: {}", args.endpoint);

    // 4. 模型
    let device = if args.cuda { Device::Cuda(0) } else { Device::Cpu };
    let mut model = YOLOv5::new(&args.model, config.input_size, device)?;
    model.summary();

    // 5. 帧来源
    let mut source = ImageSequence::open(&args.source)?;

    // 标注输出: 类别名作为标签, 字体缺失时只画框
    let writer = match &args.save_dir {
        Some(dir) => {
            let font = match load_font(&args.font) {
                Ok(font) => {
                    info!("✅ 标签字体加载成功: {}", args.font.display());
                    Some(font)
                }
                Err(e) => {
                    warn!("⚠️ 标签字体加载失败, 只画检测框: {:#}", e);
                    None
                }
            };
            Some(FrameWriter::new(dir, Overlay::new(class_names, font))?)
        }
        None => None,
    };

    // Ctrl-C → 停止标志
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            info!("🛑 Ctrl-C");
            stop.store(true, Ordering::SeqCst);
        })
        .context("failed to install Ctrl-C handler")?;
    }

    let mut pipeline = Pipeline::new(&config, client.clone())?;
    pipeline.run(
        &mut model,
        &mut source,
        &stop,
        args.max_frames,
        writer.as_ref(),
    );

    // 关闭推送线程
    client.shutdown();
    if transport.join().is_err() {
        warn!("⚠️ 推送线程异常退出");
    }
    info!("👋 退出");
    Ok(())
}
