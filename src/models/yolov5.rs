// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv5 ONNX Runtime 推理
// 输出: [1, 25200, 5 + nc], 由 detection::TensorDecoder 解码

use anyhow::{Context, Result};
use image::DynamicImage;
use ndarray::{Array, Ix4};
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use tracing::info;

use super::{letterbox, to_blob, Model};

/// 推理设备
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda(i32),
}

pub struct YOLOv5 {
    session: Session,
    model_path: String,
    input_size: u32,
    device: Device,
}

impl YOLOv5 {
    pub fn new(model_path: &str, input_size: u32, device: Device) -> Result<Self> {
        info!("📦 加载模型: {}", model_path);

        let builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
        let builder = match device {
            Device::Cuda(id) => {
                info!("Attempting to use CUDA");
                builder.with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(id)
                    .build()])?
            }
            Device::Cpu => {
                info!("Running on CPU");
                builder
            }
        };
        let session = builder
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load the ONNX model from path: {}", model_path))?;

        Ok(Self {
            session,
            model_path: model_path.to_string(),
            input_size,
            device,
        })
    }
}

impl Model for YOLOv5 {
    fn preprocess(&mut self, frame: &DynamicImage) -> Result<Array<f32, Ix4>> {
        Ok(to_blob(&letterbox(frame), self.input_size))
    }

    fn run(&mut self, xs: Array<f32, Ix4>) -> Result<Vec<f32>> {
        let shape: Vec<usize> = xs.shape().to_vec();
        let (data, _) = xs.into_raw_vec_and_offset();
        let input = Value::from_array((shape.as_slice(), data.into_boxed_slice()))?;

        let outputs = self.session.run(ort::inputs![input])?;
        let (_, ys) = outputs[0].try_extract_tensor::<f32>()?;
        Ok(ys.to_vec())
    }

    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn summary(&self) {
        info!(
            "模型: YOLOv5 | 文件: {} | 输入: {}x{} | 设备: {:?}",
            self.model_path, self.input_size, self.input_size, self.device
        );
    }
}
