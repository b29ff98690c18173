use crate::error::TransportError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 对端标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// 传输协议（外部协作方）
///
/// - 只负责把字节入队发往对端，`send` 返回即视为已入队；
/// - 保证同一发送方的报文按发送顺序到达（FIFO），不提供重试；
/// - 收到的字节由宿主交给 `Bus::receive`。
pub trait Transport: Send + Sync {
    /// 本节点标识
    fn local_peer(&self) -> PeerId;

    /// 当前可达的权威节点；不可达时返回 `None`
    fn authority(&self) -> Option<PeerId>;

    /// 已连接的对端（不含本节点）；仅权威节点广播时使用
    fn connected_peers(&self) -> Vec<PeerId>;

    /// 网络会话是否处于活动状态
    fn is_active(&self) -> bool {
        true
    }

    fn send(&self, peers: &[PeerId], bytes: &[u8]) -> Result<(), TransportError>;

    fn is_authority(&self) -> bool {
        self.authority() == Some(self.local_peer())
    }
}
