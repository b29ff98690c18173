//! msgbus：按类型或事件名分发的发布-订阅消息总线
//!
//! - 订阅者以 `Callbacks` 声明类型化能力与命名回调；
//! - 分发器在注册表快照上逐个解析并隔离调用；
//! - 报文编解码与三种投递策略（`Everyone` / `HostOnly` / `OwnerOnly`）
//!   支持在“一个权威节点 + N 个对端”的拓扑上复制消息；
//! - `Binding` 将订阅关系交给外部生命周期管理。
//!
//! ```ignore
//! let bus = Bus::new();
//! let _listener = bus.listen::<i64, _>(|n| { println!("{n}"); Ok(()) });
//! bus.publish(&42_i64)?;
//! ```
//!
extern crate self as msgbus;

pub mod binder;
pub mod bus;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod packet;
pub mod registry;
pub mod replication;
pub mod sender;
pub mod subscriber;

pub use msgbus_macros::message;

pub use binder::{Binding, UnbindPolicy};
pub use bus::Bus;
pub use config::BusConfig;
pub use dispatcher::DispatchReport;
pub use error::{BusError, BusResult, TransportError};
pub use message::{Arg, ArgValue, Args, Envelope, Message, MessageType};
pub use packet::Packet;
pub use registry::SubscriberKey;
pub use replication::{Delivery, PeerId, Published, Received, Transport};
pub use sender::EventSender;
pub use subscriber::{CallbackResult, Callbacks, Listener, Subscribe, Subscriber};

#[cfg(feature = "local-network")]
pub use replication::{Inbox, LocalNetwork, LocalTransport};
