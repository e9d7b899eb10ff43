// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 处理主循环 (处理线程)
// 职责: 取帧 → 推理 → 解码 → NMS → ID映射 → 一致性过滤 → 推送
//
// 逐帧同步处理, 只在取帧时阻塞; 推送是非阻塞投递。

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::Result;
use image::{DynamicImage, GenericImageView};
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::consistency::{ConsistencyFilter, FrameObservationSet, StableReport};
use crate::detection::{
    suppress, FilteredDetection, LetterboxScale, SuppressionConfig, TensorDecoder,
};
use crate::error::{ConfigError, DecodeError};
use crate::input::FrameSource;
use crate::mapping::IdentifierMapper;
use crate::models::Model;
use crate::overlay::FrameWriter;
use crate::transport::{SendOutcome, StreamClient};

/// 每隔多少帧打印一次统计
const STATS_INTERVAL: u64 = 60;

/// 单帧处理结果
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    pub candidates: usize,
    pub kept: Vec<FilteredDetection>,
    pub invalid_ids: usize,
    pub reports: Vec<StableReport>,
    pub send: SendOutcome,
}

/// 整个运行的汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub failed_frames: u64,
    pub candidates: u64,
    pub kept: u64,
    pub reports: u64,
    pub sent: u64,
    pub dropped: u64,
    pub invalid_ids: u64,
}

pub struct Pipeline {
    decoder: TensorDecoder,
    suppression: SuppressionConfig,
    mapper: IdentifierMapper,
    filter: ConsistencyFilter,
    client: StreamClient,

    // 统计
    summary: RunSummary,
    count: u64,
    last: Instant,
    current_fps: f64,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig, client: StreamClient) -> Result<Self, ConfigError> {
        Ok(Self {
            decoder: TensorDecoder::new(config.decoder_config()),
            suppression: config.suppression_config(),
            mapper: config.identifier_mapper()?,
            filter: config.consistency_filter()?,
            client,
            summary: RunSummary::default(),
            count: 0,
            last: Instant::now(),
            current_fps: 0.0,
        })
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// 当前窗口内的帧数
    pub fn window_len(&self) -> usize {
        self.filter.len()
    }

    /// 推理输出 → 推送 (frame_width/frame_height 为原始帧尺寸)
    pub fn process_tensor(
        &mut self,
        tensor: &[f32],
        frame_width: u32,
        frame_height: u32,
    ) -> Result<FrameOutcome, DecodeError> {
        let scale =
            LetterboxScale::for_frame(frame_width, frame_height, self.decoder.config().input_size);
        let candidates = self.decoder.decode(tensor, scale)?;
        let kept = suppress(&candidates, self.suppression);

        let (observations, invalid_ids) = FrameObservationSet::from_detections(&kept, &self.mapper);
        let reports = self.filter.update(observations);
        let send = self.client.send(&reports);

        self.summary.frames += 1;
        self.summary.candidates += candidates.len() as u64;
        self.summary.kept += kept.len() as u64;
        self.summary.reports += reports.len() as u64;
        self.summary.invalid_ids += invalid_ids as u64;
        match send {
            SendOutcome::Sent => self.summary.sent += 1,
            SendOutcome::Dropped => self.summary.dropped += 1,
            SendOutcome::Skipped => {}
        }

        Ok(FrameOutcome {
            candidates: candidates.len(),
            kept,
            invalid_ids,
            reports,
            send,
        })
    }

    /// 单帧: 推理 + process_tensor
    pub fn process_frame<M: Model + ?Sized>(
        &mut self,
        model: &mut M,
        frame: &DynamicImage,
    ) -> Result<FrameOutcome> {
        let (w, h) = frame.dimensions();
        let t_infer = Instant::now();
        let ys = model.forward(frame)?;
        let infer_ms = t_infer.elapsed().as_secs_f64() * 1000.0;

        let outcome = self.process_tensor(&ys, w, h)?;
        debug!(
            "帧 {} | 推理 {:.1}ms | 候选 {} | 保留 {} | 上报 {}",
            self.summary.frames,
            infer_ms,
            outcome.candidates,
            outcome.kept.len(),
            outcome.reports.len()
        );
        Ok(outcome)
    }

    /// 主循环: 直到流结束、收到停止信号或达到帧数上限
    pub fn run<M, S>(
        &mut self,
        model: &mut M,
        source: &mut S,
        stop: &AtomicBool,
        max_frames: Option<u64>,
        writer: Option<&FrameWriter>,
    ) -> RunSummary
    where
        M: Model + ?Sized,
        S: FrameSource + ?Sized,
    {
        info!("🔍 处理线程启动: {}", source.describe());
        let mut frame_index: u64 = 0;

        loop {
            if stop.load(Ordering::SeqCst) {
                info!("🛑 收到停止信号");
                break;
            }
            if max_frames.is_some_and(|max| frame_index >= max) {
                info!("⏹️ 已达到帧数上限 {}", frame_index);
                break;
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("End of stream");
                    break;
                }
                Err(e) => {
                    error!("❌ 读取帧失败: {}", e);
                    break;
                }
            };
            frame_index += 1;

            match self.process_frame(model, &frame) {
                Ok(outcome) => {
                    if let Some(writer) = writer {
                        let fps = Some(self.current_fps);
                        if let Err(e) =
                            writer.write_annotated(frame_index, &frame, &outcome.kept, fps)
                        {
                            warn!("⚠️ 保存标注帧失败: {:#}", e);
                        }
                    }
                }
                Err(e) => {
                    self.summary.failed_frames += 1;
                    error!("❌ 帧 {} 处理失败: {:#}", frame_index, e);
                }
            }

            self.tick(frame_index);
        }

        info!(
            "✅ 处理结束: {} 帧 | 失败 {} | 候选 {} | 保留 {} | 上报 {} | 推送 {} | 丢弃 {} | 无效ID {}",
            self.summary.frames,
            self.summary.failed_frames,
            self.summary.candidates,
            self.summary.kept,
            self.summary.reports,
            self.summary.sent,
            self.summary.dropped,
            self.summary.invalid_ids
        );
        self.summary
    }

    /// 每读到一帧调用一次 (含处理失败的帧); 统计行按读帧计数触发, 返回本次是否打印
    fn tick(&mut self, frames_read: u64) -> bool {
        self.count += 1;
        let now = Instant::now();
        if now.duration_since(self.last).as_secs_f64() >= 1.0 {
            self.current_fps = self.count as f64 / now.duration_since(self.last).as_secs_f64();
            self.count = 0;
            self.last = now;
        }

        if frames_read == 0 || frames_read % STATS_INTERVAL != 0 {
            return false;
        }
        info!(
            "🎯 {} 帧 | {:.1}fps | 候选 {} | 保留 {} | 上报 {} | 窗口 {}/{} | 推送 {} | 丢弃 {} | 失败 {} | 无效ID {} | 连接: {}",
            frames_read,
            self.current_fps,
            self.summary.candidates,
            self.summary.kept,
            self.summary.reports,
            self.filter.len(),
            self.filter.window_size(),
            self.summary.sent,
            self.summary.dropped,
            self.summary.failed_frames,
            self.summary.invalid_ids,
            if self.client.is_connected() { "已连接" } else { "未连接" }
        );
        true
    }
}
