// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 命令行参数 + 流水线参数 (JSON 文件)

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::consistency::ConsistencyFilter;
use crate::detection::{DecoderConfig, SuppressionConfig};
use crate::error::ConfigError;
use crate::mapping::IdentifierMapper;
use crate::overlay::DEFAULT_FONT;
use crate::transport::DEFAULT_ENDPOINT;

/// 卡牌检测推送程序
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "YOLOv5 卡牌检测 + WebSocket 推送", long_about = None)]
pub struct Args {
    /// ONNX 模型路径
    #[arg(long, default_value = "models/yolov5s.onnx")]
    pub model: String,

    /// 类别名称文件 (每行一个)
    #[arg(long, default_value = "data/classes.names")]
    pub classes: String,

    /// 视频帧目录 (按文件名顺序读取)
    #[arg(short, long)]
    pub source: PathBuf,

    /// WebSocket 推送地址
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// 流水线参数文件
    #[arg(short, long, default_value = "card-stream.json")]
    pub config: String,

    /// 使用 CUDA 推理
    #[arg(long)]
    pub cuda: bool,

    /// 保存带检测框的帧
    #[arg(long)]
    pub save_dir: Option<PathBuf>,

    /// 标签字体 (加载失败时只画检测框)
    #[arg(long, default_value = DEFAULT_FONT)]
    pub font: PathBuf,

    /// 最多处理的帧数
    #[arg(long)]
    pub max_frames: Option<u64>,

    /// 日志级别 (RUST_LOG 优先)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// 流水线参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // === 模型 ===
    pub input_size: u32,    // 模型输入边长
    pub num_classes: usize, // 类别数

    // === 解码/NMS ===
    pub confidence_threshold: f32, // objectness 阈值
    pub score_threshold: f32,      // 类别分数阈值 (同时作为NMS分数下限)
    pub nms_threshold: f32,        // NMS IOU阈值

    // === 时序一致性 ===
    pub window_size: usize,           // 滑动窗口帧数
    pub consistency_threshold: usize, // 上报所需最少出现帧数

    // === 卡牌ID映射 (可选覆盖) ===
    pub id_table: Option<Vec<i32>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_size: 640,
            num_classes: 24,
            confidence_threshold: 0.4,
            score_threshold: 0.2,
            nms_threshold: 0.4,
            window_size: 10,
            consistency_threshold: 7,
            id_table: None,
        }
    }
}

impl PipelineConfig {
    /// 从JSON文件加载配置; 文件不存在时写出默认配置
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config = match fs::read_to_string(path) {
            Ok(json) => {
                let config: Self = serde_json::from_str(&json)?;
                info!("✅ 配置已从 {} 加载", path);
                config
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                config.save(path)?;
                config
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_string(),
                    source,
                })
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &str) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        info!("💾 配置已保存到 {}", path);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("score_threshold", self.score_threshold),
            ("nms_threshold", self.nms_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid {
                    name,
                    reason: format!("must be within [0, 1], got {}", value),
                });
            }
        }
        if self.input_size == 0 {
            return Err(ConfigError::Invalid {
                name: "input_size",
                reason: "must be positive".to_string(),
            });
        }
        if self.num_classes == 0 {
            return Err(ConfigError::Invalid {
                name: "num_classes",
                reason: "must be positive".to_string(),
            });
        }
        self.consistency_filter()?;
        let mapper = self.identifier_mapper()?;
        if mapper.len() != self.num_classes {
            return Err(ConfigError::IdTable(format!(
                "{} entries for {} classes",
                mapper.len(),
                self.num_classes
            )));
        }
        Ok(())
    }

    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            input_size: self.input_size,
            num_classes: self.num_classes,
            conf_threshold: self.confidence_threshold,
            score_threshold: self.score_threshold,
        }
    }

    pub fn suppression_config(&self) -> SuppressionConfig {
        SuppressionConfig {
            score_threshold: self.score_threshold,
            iou_threshold: self.nms_threshold,
        }
    }

    pub fn consistency_filter(&self) -> Result<ConsistencyFilter, ConfigError> {
        ConsistencyFilter::new(self.window_size, self.consistency_threshold)
    }

    pub fn identifier_mapper(&self) -> Result<IdentifierMapper, ConfigError> {
        match &self.id_table {
            Some(table) => IdentifierMapper::from_table(table),
            None => Ok(IdentifierMapper::default()),
        }
    }

    /// 类别名称文件必须与类别数一致
    pub fn check_class_list(&self, names: &[String]) -> Result<(), ConfigError> {
        if names.len() != self.num_classes {
            return Err(ConfigError::ClassCount {
                expected: self.num_classes,
                found: names.len(),
            });
        }
        Ok(())
    }

    pub fn print_summary(&self) {
        info!("🎛️  当前流水线配置:");
        info!(
            "  置信度阈值: {:.2} | 类别分数阈值: {:.2} | NMS IOU: {:.2}",
            self.confidence_threshold, self.score_threshold, self.nms_threshold
        );
        info!(
            "  一致性窗口: {} 帧内至少出现 {} 帧",
            self.window_size, self.consistency_threshold
        );
        info!(
            "  输入尺寸: {} | 类别数: {} | 映射表: {}",
            self.input_size,
            self.num_classes,
            if self.id_table.is_some() { "自定义" } else { "内置" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.decoder_config(), DecoderConfig::default());
        assert_eq!(config.suppression_config(), SuppressionConfig::default());
    }

    #[test]
    fn test_missing_file_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        let path = path.to_str().unwrap();

        let config = PipelineConfig::load(path).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!(std::path::Path::new(path).exists());

        // 第二次从文件读取
        assert_eq!(PipelineConfig::load(path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(&path, r#"{"window_size": 5, "consistency_threshold": 3}"#).unwrap();

        let config = PipelineConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.window_size, 5);
        assert_eq!(config.consistency_threshold, 3);
        assert_eq!(config.nms_threshold, 0.4);
    }

    #[test]
    fn test_invalid_files_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        let path_str = path.to_str().unwrap();

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            PipelineConfig::load(path_str),
            Err(ConfigError::Parse(_))
        ));

        fs::write(&path, r#"{"window_size": 5, "consistency_threshold": 6}"#).unwrap();
        assert!(PipelineConfig::load(path_str).is_err());

        fs::write(&path, r#"{"confidence_threshold": 1.5}"#).unwrap();
        assert!(PipelineConfig::load(path_str).is_err());

        fs::write(&path, r#"{"id_table": [1, 2, 3]}"#).unwrap();
        assert!(matches!(
            PipelineConfig::load(path_str),
            Err(ConfigError::IdTable(_))
        ));
    }

    #[test]
    fn test_custom_id_table() {
        let config = PipelineConfig {
            num_classes: 3,
            id_table: Some(vec![30, 10, 20]),
            ..Default::default()
        };
        config.validate().unwrap();
        let mapper = config.identifier_mapper().unwrap();
        assert_eq!(mapper.map(1).0, 10);
    }

    #[test]
    fn test_class_list_count() {
        let config = PipelineConfig::default();
        let names: Vec<String> = (0..24).map(|i| format!("card{}", i)).collect();
        config.check_class_list(&names).unwrap();
        assert!(config.check_class_list(&names[..23]).is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["card-stream", "--source", "frames", "--cuda"]);
        assert_eq!(args.endpoint, "ws://localhost:8080");
        assert_eq!(args.source, PathBuf::from("frames"));
        assert!(args.cuda);
        assert!(args.save_dir.is_none());
        assert_eq!(args.font, PathBuf::from(DEFAULT_FONT));

        let args = Args::parse_from(["card-stream", "-s", "f", "--font", "fonts/label.ttf"]);
        assert_eq!(args.font, PathBuf::from("fonts/label.ttf"));
    }
}
