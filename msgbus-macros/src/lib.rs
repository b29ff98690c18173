//! msgbus 过程宏
//!
//! - `#[message]`：为结构体/枚举补齐消息所需的派生，并实现 `::msgbus::message::Message`
//!
use proc_macro::TokenStream;

mod derives;
mod message;

/// 消息宏
/// - 合并默认派生：`Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize`
/// - 生成 `::msgbus::message::Message` 实现，`TYPE_NAME` 默认为 `模块路径::类型名`
/// - 支持参数：`#[message(name = "...")]` 显式指定跨节点稳定的类型名
#[proc_macro_attribute]
pub fn message(attr: TokenStream, item: TokenStream) -> TokenStream {
    message::expand(attr, item)
}
