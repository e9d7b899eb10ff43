/// 推理后端统一接口
///
/// ## 核心流程
/// ```text
/// 原始帧 → letterbox (右/下补零成正方形) → to_blob (缩放 + 归一化, NCHW)
///        ↓
///   推理引擎 run
///        ↓
///   扁平输出张量 [rows × (5 + nc)] → detection::TensorDecoder
/// ```
///
/// letterbox 只在右侧/下方补零, 所以 `LetterboxScale` 的逆变换不需要平移量。
use anyhow::Result;
use image::{imageops, DynamicImage, GenericImageView, RgbImage};
use ndarray::{Array, Ix4};

#[cfg(feature = "onnx")]
pub mod yolov5;

#[cfg(feature = "onnx")]
pub use yolov5::YOLOv5;

pub trait Model {
    /// 预处理: 帧 → NCHW 张量 (batch = 1)
    fn preprocess(&mut self, frame: &DynamicImage) -> Result<Array<f32, Ix4>>;

    /// 推理: 返回行优先的扁平输出
    fn run(&mut self, xs: Array<f32, Ix4>) -> Result<Vec<f32>>;

    /// preprocess → run
    fn forward(&mut self, frame: &DynamicImage) -> Result<Vec<f32>> {
        let xs = self.preprocess(frame)?;
        self.run(xs)
    }

    /// 模型输入边长
    fn input_size(&self) -> u32;

    fn summary(&self);
}

/// 右侧/下方补零, 得到边长 max(w, h) 的正方形
pub fn letterbox(frame: &DynamicImage) -> RgbImage {
    let (w, h) = frame.dimensions();
    let side = w.max(h);
    let mut canvas = RgbImage::new(side, side);
    imageops::replace(&mut canvas, &frame.to_rgb8(), 0, 0);
    canvas
}

/// 正方形图像 → [1, 3, size, size], 像素值缩放到 [0, 1]
pub fn to_blob(square: &RgbImage, size: u32) -> Array<f32, Ix4> {
    let resized = if square.dimensions() == (size, size) {
        square.clone()
    } else {
        imageops::resize(square, size, size, imageops::FilterType::Triangle)
    };

    let mut ys = Array::zeros((1, 3, size as usize, size as usize));
    for (x, y, rgb) in resized.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = rgb.0;
        ys[[0, 0, y, x]] = (r as f32) / 255.0;
        ys[[0, 1, y, x]] = (g as f32) / 255.0;
        ys[[0, 2, y, x]] = (b as f32) / 255.0;
    }
    ys
}
