//! 消息（Message）与消息信封（Envelope）
//!
//! 定义载荷需要实现的最小接口（`Message`）、用于跨节点还原形状的 `MessageType`，
//! 以及在一次发布中只借用载荷的不可变 `Envelope`。

mod args;
mod envelope;
mod message_trait;

pub use args::{Arg, ArgValue, Args};
pub use envelope::{Discriminator, Envelope, Payload};
pub use message_trait::{Message, MessageType};

pub(crate) use message_trait::builtin_types;
