//! 图片序列输入 - 目录中的图片按文件名排序后逐帧读取

use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use tracing::info;

use super::FrameSource;
use crate::error::SourceError;

pub struct ImageSequence {
    dir: PathBuf,
    frames: Vec<PathBuf>,
    cursor: usize,
}

impl ImageSequence {
    /// 打开目录; 目录不存在或没有可识别的图片时失败
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SourceError> {
        let dir = dir.as_ref().to_path_buf();
        let open_err = |reason: String| SourceError::Open {
            path: dir.display().to_string(),
            reason,
        };

        let entries = fs::read_dir(&dir).map_err(|e| open_err(e.to_string()))?;
        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && ImageFormat::from_path(p).is_ok())
            .collect();
        if frames.is_empty() {
            return Err(open_err("no image files found".to_string()));
        }
        frames.sort();

        info!("📹 图片序列: {} ({} 帧)", dir.display(), frames.len());
        Ok(Self {
            dir,
            frames,
            cursor: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<DynamicImage>, SourceError> {
        let Some(path) = self.frames.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        image::open(path).map(Some).map_err(|source| SourceError::Read {
            path: path.display().to_string(),
            source,
        })
    }

    fn describe(&self) -> String {
        format!("images:{}", self.dir.display())
    }
}
