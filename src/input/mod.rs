/// 视频帧来源 (Frame Source)
///
/// - FrameSource:   逐帧读取, `None` 表示流结束
/// - ImageSequence: 目录内图片按文件名顺序作为帧序列
pub mod sequence;

pub use sequence::ImageSequence;

use image::DynamicImage;

use crate::error::SourceError;

pub trait FrameSource {
    /// 读取下一帧, 流结束返回 `Ok(None)`
    fn next_frame(&mut self) -> Result<Option<DynamicImage>, SourceError>;

    /// 来源描述 (日志用)
    fn describe(&self) -> String;
}
