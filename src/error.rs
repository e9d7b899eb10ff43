// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 错误类型定义

use thiserror::Error;

/// 输出张量解码错误
#[derive(Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("tensor length {len} is not a multiple of row dimensions {dimensions}")]
    Shape { len: usize, dimensions: usize },
}

/// 配置错误 (启动阶段致命)
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid parameter `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("identifier table: {0}")]
    IdTable(String),

    #[error("class list {path}: {source}")]
    ClassList {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("class list has {found} names but the model is configured for {expected} classes")]
    ClassCount { expected: usize, found: usize },

    #[error("config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config file parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// 视频帧来源错误
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("cannot open frame source {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("failed to read frame {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// WebSocket 推送错误
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid endpoint {0}: expected a ws:// URL")]
    Endpoint(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
