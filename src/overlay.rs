// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 检测框可视化: 在帧副本上画框、类别标签和 FPS, 可选保存为 PNG
//
// 标签栏 (框上方 20 像素的色块) 总是绘制; 文字需要字体, 字体加载失败时只画框和色块。

use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect as DrawRect;

use crate::detection::FilteredDetection;

/// 按类别ID循环取色
pub const PALETTE: [(u8, u8, u8); 4] = [(0, 128, 128), (0, 255, 0), (255, 255, 0), (0, 0, 255)];

/// 默认标签字体
pub const DEFAULT_FONT: &str = "assets/font/DejaVuSans.ttf";

const LABEL_BAR: i32 = 20; // 标签栏高度
const LABEL_GAP: i32 = 5; // 文字框底边距框顶
const TEXT_SCALE: f32 = 16.0;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

pub fn color_for(class_id: usize) -> Rgb<u8> {
    let (r, g, b) = PALETTE[class_id % PALETTE.len()];
    Rgb([r, g, b])
}

pub fn load_font(path: impl AsRef<Path>) -> Result<FontVec> {
    let path = path.as_ref();
    let bytes = fs::read(path).with_context(|| format!("cannot read font {}", path.display()))?;
    FontVec::try_from_vec(bytes).map_err(|e| anyhow!("invalid font {}: {}", path.display(), e))
}

/// 置信度保留前 4 个字符 ("0.87"), 截断不四舍五入
fn confidence_text(confidence: f32) -> String {
    format!("{:.6}", confidence).chars().take(4).collect()
}

pub struct Overlay {
    class_names: Vec<String>,
    font: Option<FontVec>,
    scale: PxScale,
}

impl Overlay {
    pub fn new(class_names: Vec<String>, font: Option<FontVec>) -> Self {
        Self {
            class_names,
            font,
            scale: PxScale::from(TEXT_SCALE),
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// "<类别名> <置信度>", 类别越界时为 "Unknown"
    pub fn label(&self, det: &FilteredDetection) -> String {
        match self.class_names.get(det.class_id) {
            Some(name) => format!("{} {}", name, confidence_text(det.confidence)),
            None => "Unknown".to_string(),
        }
    }

    /// 画框 (2 像素) + 标签栏 + 标签文字 + 左上角 FPS; 宽高不为正的框跳过
    pub fn annotate(
        &self,
        frame: &DynamicImage,
        detections: &[FilteredDetection],
        fps: Option<f64>,
    ) -> RgbImage {
        let mut canvas = frame.to_rgb8();
        for det in detections {
            let r = det.rect;
            if r.width <= 0 || r.height <= 0 {
                continue;
            }
            let color = color_for(det.class_id);
            draw_hollow_rect_mut(
                &mut canvas,
                DrawRect::at(r.x, r.y).of_size(r.width as u32, r.height as u32),
                color,
            );
            if r.width > 2 && r.height > 2 {
                draw_hollow_rect_mut(
                    &mut canvas,
                    DrawRect::at(r.x + 1, r.y + 1).of_size(r.width as u32 - 2, r.height as u32 - 2),
                    color,
                );
            }
            draw_filled_rect_mut(
                &mut canvas,
                DrawRect::at(r.x, r.y - LABEL_BAR).of_size(r.width as u32, LABEL_BAR as u32),
                color,
            );

            if let Some(font) = &self.font {
                let label = self.label(det);
                self.draw_line(&mut canvas, font, &label, r.x, r.y - LABEL_GAP);
            }
        }

        if let (Some(font), Some(fps)) = (&self.font, fps) {
            self.draw_line(&mut canvas, font, &format!("FPS: {:.6}", fps), 10, 20);
        }
        canvas
    }

    // (x, bottom) 为文字框左下角
    fn draw_line(&self, canvas: &mut RgbImage, font: &FontVec, text: &str, x: i32, bottom: i32) {
        let (_, height) = text_size(self.scale, font, text);
        draw_text_mut(canvas, TEXT_COLOR, x, bottom - height as i32, self.scale, font, text);
    }
}

/// 标注帧写入目录: frame_000001.png, frame_000002.png, ...
pub struct FrameWriter {
    dir: PathBuf,
    overlay: Overlay,
}

impl FrameWriter {
    pub fn new(dir: impl Into<PathBuf>, overlay: Overlay) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("cannot create output directory {}", dir.display()))?;
        Ok(Self { dir, overlay })
    }

    pub fn write(&self, frame_index: u64, image: &RgbImage) -> Result<PathBuf> {
        let path = self.dir.join(format!("frame_{:06}.png", frame_index));
        image
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// 标注后写入
    pub fn write_annotated(
        &self,
        frame_index: u64,
        frame: &DynamicImage,
        detections: &[FilteredDetection],
        fps: Option<f64>,
    ) -> Result<PathBuf> {
        self.write(frame_index, &self.overlay.annotate(frame, detections, fps))
    }
}
