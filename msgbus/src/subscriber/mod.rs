//! 订阅者（Subscriber）
//!
//! 订阅者以引用身份区分，在订阅或绑定时构建一次 `Callbacks` 回调表，
//! 分发器据此按类型或事件名解析应调用的回调，无需中心化的类型→处理器索引。

mod callbacks;
mod listener;
mod subscriber_trait;

pub use callbacks::Callbacks;
pub use listener::Listener;
pub use subscriber_trait::{CallbackResult, Subscribe, Subscriber};

pub(crate) use callbacks::NamedInvoke;
pub(crate) use listener::FnSubscriber;
