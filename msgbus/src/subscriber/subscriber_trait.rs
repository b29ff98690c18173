use super::Callbacks;
use crate::message::Message;

/// 回调返回值：`Err` 会被记录为 `CallbackFailure`，不影响其它回调
pub type CallbackResult = anyhow::Result<()>;

/// 订阅者：以引用身份区分，在订阅/绑定时一次性声明自己的回调表
///
/// - `callbacks`：声明类型化能力与命名回调（见 `Callbacks`）；
/// - `is_alive`：宿主生命周期是否仍有效；返回 `false` 时会在分发中被惰性移除。
pub trait Subscriber: Send + Sync + Sized + 'static {
    fn callbacks(&self) -> Callbacks<Self>;

    fn is_alive(&self) -> bool {
        true
    }
}

/// 类型化能力：以类型 `M` 的载荷调用
///
/// 通过 `Callbacks::subscribe::<M>()` 挂入回调表；同一订阅者对同一 `M` 至多一项。
pub trait Subscribe<M: Message>: Send + Sync {
    fn on_published(&self, message: &M) -> CallbackResult;
}
