// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 卡牌检测流水线:
// 推理输出 → 张量解码 → NMS → 卡牌ID映射 → 时序一致性过滤 → WebSocket 推送
pub mod config; // 命令行与流水线参数
pub mod consistency; // 时序一致性过滤 (滑动窗口)
pub mod detection; // 张量解码与NMS
pub mod error;
pub mod input; // 视频帧来源
pub mod mapping; // 类别ID → 卡牌ID
pub mod models; // 推理后端
pub mod overlay; // 检测框可视化
pub mod pipeline; // 处理主循环
pub mod transport; // WebSocket 推送

pub use crate::config::{Args, PipelineConfig};
pub use crate::consistency::{ConsistencyFilter, FrameObservationSet, StableReport};
pub use crate::detection::{
    CandidateDetection, FilteredDetection, LetterboxScale, Position, Rect, TensorDecoder,
};
pub use crate::mapping::{ExternalId, IdentifierMapper};
pub use crate::pipeline::Pipeline;
pub use crate::transport::StreamClient;

/// 贪心 NMS, 返回保留框的下标 (按分数降序)
///
/// 分数 `<= score_threshold` 的框直接跳过; 与任一已保留框 IoU `> iou_threshold` 的框被抑制。
/// 分数相同的框保持输入顺序。
pub fn non_max_suppression(
    boxes: &[Rect],
    scores: &[f32],
    score_threshold: f32,
    iou_threshold: f32,
) -> Vec<usize> {
    let mut order: Vec<usize> = (0..boxes.len().min(scores.len()))
        .filter(|&i| scores[i] > score_threshold)
        .collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut keep: Vec<usize> = Vec::with_capacity(order.len());
    for index in order {
        let drop = keep
            .iter()
            .any(|&kept| boxes[kept].iou(&boxes[index]) > iou_threshold);
        if !drop {
            keep.push(index);
        }
    }
    keep
}
