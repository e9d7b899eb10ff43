// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv5 输出张量解码
// 行格式: [cx, cy, w, h, objectness, score_0 .. score_{N-1}]

use super::types::{CandidateDetection, Rect};
use crate::error::DecodeError;

/// cx, cy, w, h, objectness
pub const CXYWH_OBJ: usize = 5;
const OBJECTNESS: usize = 4;

/// 解码参数
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderConfig {
    pub input_size: u32,
    pub num_classes: usize,
    pub conf_threshold: f32,  // objectness >= 阈值才继续
    pub score_threshold: f32, // 最大类别分数 > 阈值才保留
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            input_size: 640,
            num_classes: 24,
            conf_threshold: 0.4,
            score_threshold: 0.2,
        }
    }
}

impl DecoderConfig {
    /// 每行的长度 (5 + 类别数)
    pub fn dimensions(&self) -> usize {
        CXYWH_OBJ + self.num_classes
    }
}

/// letterbox 方形输入 → 原始帧 的缩放系数
///
/// 预处理把帧的右侧/下方补零成边长 max(w, h) 的正方形,
/// 再缩放到模型输入尺寸, 所以两个方向的系数相同。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxScale {
    pub x_factor: f32,
    pub y_factor: f32,
}

impl LetterboxScale {
    pub fn for_frame(width: u32, height: u32, input_size: u32) -> Self {
        let side = width.max(height) as f32;
        Self {
            x_factor: side / input_size as f32,
            y_factor: side / input_size as f32,
        }
    }
}

pub struct TensorDecoder {
    config: DecoderConfig,
}

impl TensorDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// 行优先的扁平张量 → 候选框 (帧像素坐标)
    pub fn decode(
        &self,
        data: &[f32],
        scale: LetterboxScale,
    ) -> Result<Vec<CandidateDetection>, DecodeError> {
        let dimensions = self.config.dimensions();
        if data.len() % dimensions != 0 {
            return Err(DecodeError::Shape {
                len: data.len(),
                dimensions,
            });
        }

        let mut candidates = Vec::new();
        for row in data.chunks_exact(dimensions) {
            let objectness = row[OBJECTNESS];
            if objectness.is_nan() || objectness < self.config.conf_threshold {
                continue;
            }

            // 并列最大时取最小下标
            let (class_id, max_score) = row[CXYWH_OBJ..].iter().enumerate().fold(
                (0usize, f32::NEG_INFINITY),
                |best, (i, &s)| if s > best.1 { (i, s) } else { best },
            );
            if max_score <= self.config.score_threshold {
                continue;
            }

            candidates.push(CandidateDetection {
                class_id,
                confidence: objectness,
                rect: Self::decode_box(&row[..OBJECTNESS], scale),
            });
        }

        Ok(candidates)
    }

    // 截断取整 (向零), 不四舍五入
    fn decode_box(cxcywh: &[f32], scale: LetterboxScale) -> Rect {
        let (cx, cy, w, h) = (cxcywh[0], cxcywh[1], cxcywh[2], cxcywh[3]);
        let left = ((cx as f64 - 0.5 * w as f64) * scale.x_factor as f64) as i32;
        let top = ((cy as f64 - 0.5 * h as f64) * scale.y_factor as f64) as i32;
        let width = (w * scale.x_factor) as i32;
        let height = (h * scale.y_factor) as i32;
        Rect::new(left, top, width, height)
    }
}
