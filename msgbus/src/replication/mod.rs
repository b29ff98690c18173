//! 复制（Replication）
//!
//! 在“一个权威节点 + N 个对端”的拓扑上按投递策略复制消息：
//! - `Delivery`：`Everyone` / `HostOnly` / `OwnerOnly` 三种策略；
//! - `Transport`：外部传输协议，仅负责把字节送到对端；
//! - `Frame`：报文外层的路由帧；
//! - `controller`：发布与接收两侧的状态机；
//! - `LocalNetwork`：基于 tokio 通道的内存网络，用于测试与示例。
//!
pub(crate) mod controller;
mod frame;
#[cfg(feature = "local-network")]
mod local;
mod policy;
mod transport;

pub use controller::{Published, Received};
pub use frame::Frame;
#[cfg(feature = "local-network")]
pub use local::{Inbound, Inbox, LocalNetwork, LocalTransport};
pub use policy::Delivery;
pub use transport::{PeerId, Transport};
