use super::{CallbackResult, Callbacks, Subscriber};
use crate::bus::Bus;
use crate::message::Message;
use crate::registry::SubscriberKey;
use std::fmt;

/// 以闭包实现的单类型订阅者
pub(crate) struct FnSubscriber<M> {
    f: Box<dyn Fn(&M) -> CallbackResult + Send + Sync>,
}

impl<M: Message> FnSubscriber<M> {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: Fn(&M) -> CallbackResult + Send + Sync + 'static,
    {
        Self { f: Box::new(f) }
    }
}

impl<M: Message> Subscriber for FnSubscriber<M> {
    fn callbacks(&self) -> Callbacks<Self> {
        Callbacks::<Self>::new().on::<M, _>(|s, message| (s.f)(message))
    }
}

/// 闭包监听句柄：释放时自动取消订阅
#[must_use = "dropping a Listener unsubscribes it immediately"]
pub struct Listener {
    bus: Bus,
    key: SubscriberKey,
    message: &'static str,
}

impl Listener {
    pub(crate) fn new(bus: Bus, key: SubscriberKey, message: &'static str) -> Self {
        Self { bus, key, message }
    }

    pub fn key(&self) -> SubscriberKey {
        self.key
    }

    /// 是否仍在注册表中
    pub fn is_active(&self) -> bool {
        self.bus.contains_key(self.key)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("key", &self.key)
            .field("message", &self.message)
            .finish()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.bus.unsubscribe_key(self.key);
    }
}
