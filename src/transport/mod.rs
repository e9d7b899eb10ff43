// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// WebSocket 推送
//
// 独立I/O线程运行 tokio 单线程运行时, 持有唯一一条长连接。
// 连接打开时把发送通道写入共享槽位, 处理线程的 send 在同一把锁下读取槽位并非阻塞投递。
// 尽力而为: 未连接/已断开/发送队列已满时直接丢弃, 不重试, 不重连。
pub mod message;

use std::sync::Arc;
use std::thread::JoinHandle;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

pub use message::{OutboundMessage, WireDetection};

use crate::consistency::StableReport;
use crate::error::TransportError;

pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8080";

/// 待发送消息队列上限, 对端不读时多出的消息直接丢弃
pub const OUTGOING_QUEUE: usize = 64;

type Slot = Arc<Mutex<Option<mpsc::Sender<String>>>>;

/// send 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// 空结果集, 没有任何网络活动
    Skipped,
    /// 已交给I/O线程
    Sent,
    /// 未连接、连接已关闭或队列已满, 消息丢弃
    Dropped,
}

/// 推送客户端句柄, 可在线程间克隆
#[derive(Clone, Default)]
pub struct StreamClient {
    slot: Slot,
    shutdown: Arc<Notify>,
}

impl StreamClient {
    /// 不连接任何端点的客户端, 所有发送都会被丢弃
    pub fn new() -> Self {
        Self::default()
    }

    /// 启动I/O线程并发起连接 (不等待连接完成)
    pub fn connect(endpoint: &str) -> Result<(Self, JoinHandle<()>), TransportError> {
        if !endpoint.starts_with("ws://") {
            return Err(TransportError::Endpoint(endpoint.to_string()));
        }

        let client = Self::new();
        let slot = client.slot.clone();
        let shutdown = client.shutdown.clone();
        let endpoint = endpoint.to_string();

        let handle = std::thread::Builder::new()
            .name("ws-transport".to_string())
            .spawn(move || communication_thread(endpoint, slot, shutdown))?;

        Ok((client, handle))
    }

    #[cfg(test)]
    pub(crate) fn attached(tx: mpsc::Sender<String>) -> Self {
        let client = Self::new();
        *client.slot.lock() = Some(tx);
        client
    }

    pub fn is_connected(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// 序列化并投递一帧的稳定上报, 从不阻塞在网络上
    pub fn send(&self, reports: &[StableReport]) -> SendOutcome {
        if reports.is_empty() {
            return SendOutcome::Skipped;
        }

        let text = match OutboundMessage::from_reports(reports).to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!("⚠️ 消息序列化失败: {}", e);
                return SendOutcome::Dropped;
            }
        };
        debug!("📤 Sending message: {}", text);

        let result = match self.slot.lock().as_ref() {
            Some(tx) => tx.try_send(text),
            None => return SendOutcome::Dropped,
        };
        match result {
            Ok(()) => SendOutcome::Sent,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("⚠️ 发送队列已满 ({}), 丢弃本帧消息", OUTGOING_QUEUE);
                SendOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => SendOutcome::Dropped,
        }
    }

    /// 通知I/O线程关闭连接并退出
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

fn communication_thread(endpoint: String, slot: Slot, shutdown: Arc<Notify>) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("❌ 推送线程运行时创建失败: {}", e);
            return;
        }
    };

    if let Err(e) = runtime.block_on(run_connection(&endpoint, &slot, &shutdown)) {
        error!("❌ WebSocket 连接异常 ({}): {}", endpoint, e);
    }
    // 断开后槽位清空, 后续发送全部丢弃
    slot.lock().take();
}

async fn run_connection(
    endpoint: &str,
    slot: &Slot,
    shutdown: &Notify,
) -> Result<(), TransportError> {
    info!("🔗 正在连接 {}", endpoint);
    let ws = tokio::select! {
        res = connect_async(endpoint) => res?.0,
        _ = shutdown.notified() => return Ok(()),
    };

    let (tx, mut rx) = mpsc::channel::<String>(OUTGOING_QUEUE);
    *slot.lock() = Some(tx);
    info!("✅ Connected to server.");

    let (mut sink, mut stream) = ws.split();
    let result = loop {
        tokio::select! {
            outgoing = rx.recv() => match outgoing {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        break Err(e.into());
                    }
                }
                None => break Ok(()),
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => info!("📩 Received message: {}", text),
                Some(Ok(Message::Close(frame))) => {
                    debug!("close frame: {:?}", frame);
                    break Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break Err(e.into()),
                None => break Ok(()),
            },
            _ = shutdown.notified() => {
                if let Err(e) = sink.close().await {
                    warn!("⚠️ WebSocket 关闭失败: {}", e);
                }
                break Ok(());
            }
        }
    };

    slot.lock().take();
    info!("🔌 Connection closed.");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Position;
    use crate::mapping::ExternalId;

    fn reports() -> Vec<StableReport> {
        vec![StableReport {
            id: ExternalId(5),
            position: Position::new(100, 200),
        }]
    }

    #[test]
    fn test_empty_send_has_no_activity() {
        let (tx, mut rx) = mpsc::channel(OUTGOING_QUEUE);
        let client = StreamClient::attached(tx);
        for _ in 0..5 {
            assert_eq!(client.send(&[]), SendOutcome::Skipped);
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_when_attached() {
        let (tx, mut rx) = mpsc::channel(OUTGOING_QUEUE);
        let client = StreamClient::attached(tx);
        assert_eq!(client.send(&reports()), SendOutcome::Sent);
        assert_eq!(
            rx.try_recv().unwrap(),
            r#"{"Array":[{"id":5,"pos_x":100,"pos_y":200}]}"#
        );
    }

    #[test]
    fn test_send_without_connection_drops() {
        let client = StreamClient::new();
        assert!(!client.is_connected());
        assert_eq!(client.send(&reports()), SendOutcome::Dropped);
    }

    #[test]
    fn test_send_after_receiver_gone_drops() {
        let (tx, rx) = mpsc::channel(OUTGOING_QUEUE);
        let client = StreamClient::attached(tx);
        drop(rx);
        assert_eq!(client.send(&reports()), SendOutcome::Dropped);
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let (tx, mut rx) = mpsc::channel(2);
        let client = StreamClient::attached(tx);
        assert_eq!(client.send(&reports()), SendOutcome::Sent);
        assert_eq!(client.send(&reports()), SendOutcome::Sent);
        // 对端不读: 第三条直接丢弃
        assert_eq!(client.send(&reports()), SendOutcome::Dropped);
        assert!(client.is_connected());

        rx.try_recv().unwrap();
        assert_eq!(client.send(&reports()), SendOutcome::Sent);
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        assert!(matches!(
            StreamClient::connect("http://localhost:8080"),
            Err(TransportError::Endpoint(_))
        ));
    }

    #[test]
    fn test_unreachable_endpoint_drops_sends() {
        // 端口 1 通常无人监听, 连接失败后线程退出
        let (client, handle) = StreamClient::connect("ws://127.0.0.1:1").unwrap();
        handle.join().unwrap();
        assert!(!client.is_connected());
        assert_eq!(client.send(&reports()), SendOutcome::Dropped);
    }
}
