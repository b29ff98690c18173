//! 订阅者注册表（Registry）
//!
//! 写时复制的有序订阅者序列：
//! - `register` / `unregister`：以 `rcu`（比较并交换循环）替换整张表，幂等且无丢失更新；
//! - `snapshot`：仅克隆一次 `Arc`，分发期间遍历的是某一时刻的快照而非实时序列，
//!   回调内部增删订阅者不会破坏本轮遍历。
//!
use crate::dispatcher::{self, Invoker};
use crate::message::Envelope;
use crate::subscriber::{Callbacks, Subscriber};
use arc_swap::ArcSwap;
use std::any::type_name;
use std::fmt;
use std::sync::{Arc, Weak};

/// 订阅者身份：订阅者 `Arc` 分配的地址（引用相等，而非值相等）
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberKey(usize);

impl SubscriberKey {
    pub fn of<S>(subscriber: &Arc<S>) -> Self {
        Self(Arc::as_ptr(subscriber) as *const () as usize)
    }
}

impl fmt::Debug for SubscriberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriberKey({:#x})", self.0)
    }
}

/// 本轮分发中某个订阅者的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Liveness {
    Alive,
    Expired,
}

/// 类型擦除后的注册项
pub(crate) trait Registered: Send + Sync {
    fn key(&self) -> SubscriberKey;

    fn label(&self) -> &'static str;

    fn deliver(&self, envelope: &Envelope<'_>, invoker: &mut Invoker<'_>) -> Liveness;
}

/// 注册项对订阅者的持有方式：
/// - `Strong`：直接订阅，由注册表保持存活；
/// - `Weak`：生命周期绑定，宿主拥有订阅者，宿主释放后在分发时被识别为失效。
enum Target<S> {
    Strong(Arc<S>),
    Weak(Weak<S>),
}

pub(crate) struct Entry<S: Subscriber> {
    target: Target<S>,
    key: SubscriberKey,
    callbacks: Callbacks<S>,
}

impl<S: Subscriber> Entry<S> {
    pub(crate) fn strong(subscriber: &Arc<S>) -> Self {
        Self {
            key: SubscriberKey::of(subscriber),
            callbacks: subscriber.callbacks(),
            target: Target::Strong(Arc::clone(subscriber)),
        }
    }

    pub(crate) fn weak(subscriber: &Arc<S>) -> Self {
        Self {
            key: SubscriberKey::of(subscriber),
            callbacks: subscriber.callbacks(),
            target: Target::Weak(Arc::downgrade(subscriber)),
        }
    }

    pub(crate) fn callbacks(&self) -> &Callbacks<S> {
        &self.callbacks
    }
}

impl<S: Subscriber> Registered for Entry<S> {
    fn key(&self) -> SubscriberKey {
        self.key
    }

    fn label(&self) -> &'static str {
        type_name::<S>()
    }

    fn deliver(&self, envelope: &Envelope<'_>, invoker: &mut Invoker<'_>) -> Liveness {
        let subscriber = match &self.target {
            Target::Strong(s) => Arc::clone(s),
            Target::Weak(w) => match w.upgrade() {
                Some(s) => s,
                None => return Liveness::Expired,
            },
        };

        if !subscriber.is_alive() {
            return Liveness::Expired;
        }

        dispatcher::resolve(subscriber.as_ref(), &self.callbacks, envelope, invoker);
        Liveness::Alive
    }
}

pub(crate) type Snapshot = Arc<Vec<Arc<dyn Registered>>>;

/// 订阅者注册表
pub(crate) struct Registry {
    entries: ArcSwap<Vec<Arc<dyn Registered>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
        }
    }
}

impl Registry {
    /// 幂等添加；已存在同一身份时不做任何事并返回 `false`
    pub(crate) fn register(&self, entry: Arc<dyn Registered>) -> bool {
        let key = entry.key();
        let mut added = false;

        self.entries.rcu(|current| {
            if current.iter().any(|e| e.key() == key) {
                added = false;
                return Arc::clone(current);
            }
            added = true;
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&entry));
            Arc::new(next)
        });

        added
    }

    /// 幂等移除；不存在时返回 `false`
    pub(crate) fn unregister(&self, key: SubscriberKey) -> bool {
        let mut removed = false;

        self.entries.rcu(|current| {
            if !current.iter().any(|e| e.key() == key) {
                removed = false;
                return Arc::clone(current);
            }
            removed = true;
            let next: Vec<_> = current.iter().filter(|e| e.key() != key).cloned().collect();
            Arc::new(next)
        });

        removed
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        self.entries.load_full()
    }

    pub(crate) fn contains(&self, key: SubscriberKey) -> bool {
        self.entries.load().iter().any(|e| e.key() == key)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.load().len()
    }
}
