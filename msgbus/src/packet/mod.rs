//! 报文（Packet）与编解码
//!
//! - `Packet`：跨节点传输的两字段报文（类型判别串 + 序列化载荷）；
//! - `TypeRegistry`：接收方将类型判别串还原为具体形状；
//! - `codec`：`Envelope` ↔ `Packet` 的编码与校验解码。
//!
mod codec;
#[allow(clippy::module_inception)]
mod packet;
mod type_registry;

pub use codec::{DecodedMessage, EVENT_DISCRIMINATOR, decode, encode};
pub use packet::Packet;
pub use type_registry::TypeRegistry;
