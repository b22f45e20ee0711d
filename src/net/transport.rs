use serde::{Deserialize, Serialize};

use super::error::NetError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Listening,
    Connecting,
    Connected,
    Closed,
}

/// 传输层回调统一转换成事件，由会话层轮询。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Data(String),
    Closed,
    Failed(NetError),
}

/// 点对点传输：房主 `listen`，访客 `connect`，双方只有一条通道。
pub trait PeerTransport {
    fn listen(&mut self, address: &str) -> Result<(), NetError>;

    fn connect(&mut self, address: &str) -> Result<(), NetError>;

    fn send(&mut self, payload: &str) -> Result<(), NetError>;

    /// 取出下一条待处理事件，按到达顺序。
    fn poll_event(&mut self) -> Option<TransportEvent>;

    /// 关闭通道并释放底层资源，可重复调用。
    fn close(&mut self);
}
