// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// NMS 适配层: 候选框 → non_max_suppression → 保留框
//
// 注意: 所有类别混在一起做 NMS, 不同类别的高度重叠框也会互相抑制。

use super::types::{CandidateDetection, FilteredDetection, Rect};
use crate::non_max_suppression;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuppressionConfig {
    pub score_threshold: f32,
    pub iou_threshold: f32,
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.2,
            iou_threshold: 0.4,
        }
    }
}

pub fn suppress(
    candidates: &[CandidateDetection],
    config: SuppressionConfig,
) -> Vec<FilteredDetection> {
    let boxes: Vec<Rect> = candidates.iter().map(|c| c.rect).collect();
    let scores: Vec<f32> = candidates.iter().map(|c| c.confidence).collect();

    non_max_suppression(
        &boxes,
        &scores,
        config.score_threshold,
        config.iou_threshold,
    )
    .into_iter()
    .map(|idx| FilteredDetection::from(&candidates[idx]))
    .collect()
}
