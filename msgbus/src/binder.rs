//! 订阅生命周期绑定（Binder）
//!
//! 宿主按自身生命周期依次调用钩子：`on_activate` ≤ `on_deactivate`* ≤ `on_destroy`，
//! 激活/停用可重复，销毁为终态。
//!
//! | 策略 | on_activate | on_deactivate | on_destroy |
//! |------|-------------|---------------|------------|
//! | `OnDeactivate` | 注册 | 注销 | 若仍注册则注销 |
//! | `OnDestroyOnly` | 注册 | 无操作 | 注销 |
//!
//! 绑定只弱引用订阅者：宿主拥有订阅者，宿主未调用钩子就释放订阅者时，
//! 分发会把它识别为失效并移除。
//!
use crate::bus::Bus;
use crate::registry::{Entry, SubscriberKey};
use crate::subscriber::Subscriber;
use std::any::type_name;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, warn};

/// 注销时机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnbindPolicy {
    /// 停用即注销
    #[default]
    OnDeactivate,
    /// 仅在销毁时注销
    OnDestroyOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Bound,
    Active,
    Inactive,
    Destroyed,
}

/// 生命周期绑定句柄；释放时执行 `on_destroy`
///
/// 钩子在状态锁内完成注册/注销，并发调用时销毁仍是终态：
/// 销毁之后不会再出现注册。
pub struct Binding<S: Subscriber> {
    bus: Bus,
    subscriber: Weak<S>,
    key: SubscriberKey,
    policy: UnbindPolicy,
    state: Mutex<State>,
}

impl<S: Subscriber> Binding<S> {
    pub(crate) fn new(bus: Bus, subscriber: &Arc<S>, policy: UnbindPolicy) -> Self {
        Self {
            bus,
            key: SubscriberKey::of(subscriber),
            subscriber: Arc::downgrade(subscriber),
            policy,
            state: Mutex::new(State::Bound),
        }
    }

    pub fn policy(&self) -> UnbindPolicy {
        self.policy
    }

    pub fn key(&self) -> SubscriberKey {
        self.key
    }

    pub fn is_registered(&self) -> bool {
        self.bus.contains_key(self.key)
    }

    pub fn is_active(&self) -> bool {
        *self.state() == State::Active
    }

    pub fn is_destroyed(&self) -> bool {
        *self.state() == State::Destroyed
    }

    /// 激活：注册（幂等）；返回是否新增了注册
    pub fn on_activate(&self) -> bool {
        let mut state = self.state();
        if self.rejected(*state, "on_activate") {
            return false;
        }
        let Some(subscriber) = self.subscriber.upgrade() else {
            warn!(subscriber = type_name::<S>(), "subscriber dropped before activation");
            return false;
        };

        *state = State::Active;
        self.bus.register_entry(Entry::weak(&subscriber))
    }

    /// 停用：仅 `OnDeactivate` 策略下注销
    pub fn on_deactivate(&self) -> bool {
        let mut state = self.state();
        if self.rejected(*state, "on_deactivate") {
            return false;
        }

        *state = State::Inactive;
        match self.policy {
            UnbindPolicy::OnDeactivate => self.bus.unsubscribe_key(self.key),
            UnbindPolicy::OnDestroyOnly => false,
        }
    }

    /// 销毁：注销（若仍注册），之后的钩子全部忽略
    pub fn on_destroy(&self) -> bool {
        let mut state = self.state();
        if self.rejected(*state, "on_destroy") {
            return false;
        }

        *state = State::Destroyed;
        debug!(subscriber = type_name::<S>(), "binding destroyed");
        self.bus.unsubscribe_key(self.key)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn rejected(&self, state: State, hook: &'static str) -> bool {
        if state == State::Destroyed {
            warn!(
                subscriber = type_name::<S>(),
                hook, "binding already destroyed, hook ignored"
            );
            return true;
        }
        false
    }
}

impl<S: Subscriber> Drop for Binding<S> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if *state != State::Destroyed {
            *state = State::Destroyed;
            self.bus.unsubscribe_key(self.key);
        }
    }
}

impl<S: Subscriber> fmt::Debug for Binding<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("subscriber", &type_name::<S>())
            .field("policy", &self.policy)
            .field("state", &*self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::Callbacks;

    struct Widget;

    impl Subscriber for Widget {
        fn callbacks(&self) -> Callbacks<Self> {
            Callbacks::new().method("Refresh", &[], |_| Ok(()))
        }
    }

    #[test]
    fn unbind_on_deactivate() {
        let bus = Bus::new();
        let widget = Arc::new(Widget);
        let binding = bus.bind(&widget, UnbindPolicy::OnDeactivate);
        assert!(!binding.is_registered());

        assert!(binding.on_activate());
        assert!(!binding.on_activate());
        assert!(binding.is_registered());

        assert!(binding.on_deactivate());
        assert!(!binding.is_registered());

        // 重新激活后再次注册
        assert!(binding.on_activate());
        assert!(binding.on_destroy());
        assert!(!binding.is_registered());
        assert!(!binding.on_destroy());
    }

    #[test]
    fn unbind_on_destroy_only() {
        let bus = Bus::new();
        let widget = Arc::new(Widget);
        let binding = bus.bind(&widget, UnbindPolicy::OnDestroyOnly);

        binding.on_activate();
        assert!(!binding.on_deactivate());
        assert!(binding.is_registered());

        assert!(binding.on_destroy());
        assert!(!binding.is_registered());
    }

    #[test]
    fn destroy_is_terminal() {
        let bus = Bus::new();
        let widget = Arc::new(Widget);
        let binding = bus.bind(&widget, UnbindPolicy::default());

        binding.on_destroy();
        assert!(!binding.on_activate());
        assert!(!binding.is_registered());
        assert!(binding.is_destroyed());
    }

    #[test]
    fn dropping_the_binding_unregisters() {
        let bus = Bus::new();
        let widget = Arc::new(Widget);
        {
            let binding = bus.bind(&widget, UnbindPolicy::OnDestroyOnly);
            binding.on_activate();
            assert_eq!(bus.subscriber_count(), 1);
        }
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn host_dropping_the_subscriber_is_detected_at_dispatch() {
        let bus = Bus::new();
        let widget = Arc::new(Widget);
        let binding = bus.bind(&widget, UnbindPolicy::OnDestroyOnly);
        binding.on_activate();
        drop(widget);

        let published = bus.publish_event("Refresh").unwrap();
        let report = published.report().unwrap();
        assert_eq!(report.expired, 1);
        assert_eq!(report.invoked, 0);
        assert!(!binding.is_registered());
    }

    #[test]
    fn concurrent_destroy_leaves_nothing_registered() {
        use std::sync::Barrier;
        use std::thread;

        let bus = Bus::new();
        let widget = Arc::new(Widget);
        for _ in 0..500 {
            let binding = Arc::new(bus.bind(&widget, UnbindPolicy::OnDestroyOnly));
            let barrier = Arc::new(Barrier::new(2));

            let activator = {
                let binding = Arc::clone(&binding);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    binding.on_activate();
                })
            };
            barrier.wait();
            binding.on_destroy();
            activator.join().unwrap();

            assert!(binding.is_destroyed());
            assert!(!binding.is_registered());
        }
        assert_eq!(bus.subscriber_count(), 0);
    }
}
