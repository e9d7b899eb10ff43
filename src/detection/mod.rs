/// 检测后处理 (Detection Postprocess)
///
/// - decoder:     YOLOv5 输出张量 → 候选框
/// - suppression: 候选框 → NMS 保留框 (类别无关)
/// - types:       检测框数据结构
pub mod decoder;
pub mod suppression;
pub mod types;

pub use decoder::{DecoderConfig, LetterboxScale, TensorDecoder};
pub use suppression::{suppress, SuppressionConfig};
pub use types::{CandidateDetection, FilteredDetection, Position, Rect};
