//! 消息总线（Bus）
//!
//! 显式的总线对象，内部为 `Arc`，克隆后共享同一注册表与会话：
//! - 订阅：`subscribe` / `unsubscribe` / `bind` / `listen`；
//! - 发布：`publish*`，按投递策略交给复制控制器；
//! - 网络：`attach` / `detach` 挂接传输，`receive` 处理入站字节。
//!
//! `Bus::global()` 提供进程级默认实例，核心逻辑不依赖它。
//!
use crate::binder::{Binding, UnbindPolicy};
use crate::config::BusConfig;
use crate::dispatcher::{self, DispatchReport};
use crate::error::{BusError, BusResult};
use crate::message::{Envelope, Message};
use crate::packet::TypeRegistry;
use crate::registry::{Entry, Registry, SubscriberKey};
use crate::replication::controller::{self, Session};
use crate::replication::{Delivery, PeerId, Published, Received, Transport};
use crate::subscriber::{CallbackResult, FnSubscriber, Listener, Subscriber};
use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use std::any::{TypeId, type_name};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;

struct BusInner {
    registry: Registry,
    types: TypeRegistry,
    /// 已绑定生命周期的订阅者类型，不可作为载荷发布
    bound_types: DashMap<TypeId, &'static str>,
    session: ArcSwapOption<Session>,
    config: BusConfig,
}

/// 消息总线
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus {
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    pub fn with_config(config: BusConfig) -> Self {
        Self {
            inner: Arc::new(BusInner {
                registry: Registry::default(),
                types: TypeRegistry::new(),
                bound_types: DashMap::new(),
                session: ArcSwapOption::empty(),
                config,
            }),
        }
    }

    /// 进程级默认实例
    pub fn global() -> &'static Bus {
        static GLOBAL: OnceLock<Bus> = OnceLock::new();
        GLOBAL.get_or_init(Bus::new)
    }

    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    // ---- 订阅 ----

    /// 订阅；同一订阅者重复订阅不做任何事并返回 `false`
    pub fn subscribe<S: Subscriber>(&self, subscriber: &Arc<S>) -> bool {
        self.register_entry(Entry::strong(subscriber))
    }

    pub fn unsubscribe<S>(&self, subscriber: &Arc<S>) -> bool {
        self.unsubscribe_key(SubscriberKey::of(subscriber))
    }

    pub fn is_subscribed<S>(&self, subscriber: &Arc<S>) -> bool {
        self.contains_key(SubscriberKey::of(subscriber))
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// 将订阅者的注册关系交给外部生命周期管理
    ///
    /// 绑定本身不注册，宿主在激活时调用 `Binding::on_activate`。
    ///
    /// 绑定后 `S` 在本总线（及其克隆）上不能再作为载荷发布，返回 `InvalidMessageShape`；
    /// 该限制从首次 `bind` 起生效，绑定前的发布不受影响，其它 `Bus` 实例也不受影响。
    pub fn bind<S: Subscriber>(&self, subscriber: &Arc<S>, policy: UnbindPolicy) -> Binding<S> {
        self.inner
            .bound_types
            .entry(TypeId::of::<S>())
            .or_insert(type_name::<S>());
        Binding::new(self.clone(), subscriber, policy)
    }

    /// 以闭包订阅单一类型，返回的句柄释放时自动取消订阅
    pub fn listen<M, F>(&self, f: F) -> Listener
    where
        M: Message,
        F: Fn(&M) -> CallbackResult + Send + Sync + 'static,
    {
        let subscriber = Arc::new(FnSubscriber::<M>::new(f));
        self.subscribe(&subscriber);
        Listener::new(self.clone(), SubscriberKey::of(&subscriber), M::TYPE_NAME)
    }

    pub(crate) fn register_entry<S: Subscriber>(&self, entry: Entry<S>) -> bool {
        for ty in entry.callbacks().message_types() {
            self.inner.types.register(ty);
        }
        let added = self.inner.registry.register(Arc::new(entry));
        if added {
            debug!(subscriber = type_name::<S>(), "subscribed");
        }
        added
    }

    pub(crate) fn contains_key(&self, key: SubscriberKey) -> bool {
        self.inner.registry.contains(key)
    }

    pub(crate) fn unsubscribe_key(&self, key: SubscriberKey) -> bool {
        let removed = self.inner.registry.unregister(key);
        if removed {
            debug!(?key, "unsubscribed");
        }
        removed
    }

    // ---- 类型 ----

    /// 显式登记可在接收侧还原的载荷形状
    pub fn register_message<M: Message>(&self) -> bool {
        self.inner.types.register_message::<M>()
    }

    pub fn known_types(&self) -> Vec<&'static str> {
        self.inner.types.names()
    }

    pub(crate) fn types(&self) -> &TypeRegistry {
        &self.inner.types
    }

    // ---- 网络会话 ----

    /// 挂接传输，替换已有会话
    pub fn attach<T: Transport + 'static>(&self, transport: T) {
        debug!(peer = %transport.local_peer(), "transport attached");
        self.inner
            .session
            .store(Some(Arc::new(Session::new(Arc::new(transport)))));
    }

    /// 卸下传输；其后所有发布都在本地完成
    pub fn detach(&self) -> bool {
        self.inner.session.swap(None).is_some()
    }

    pub fn is_networked(&self) -> bool {
        self.session().is_some_and(|s| s.transport().is_active())
    }

    pub(crate) fn session(&self) -> Option<Arc<Session>> {
        self.inner.session.load_full()
    }

    // ---- 发布 ----

    pub fn publish<M: Message>(&self, message: &M) -> BusResult<Published> {
        self.publish_with(message, Delivery::default())
    }

    /// 按指定策略发布
    ///
    /// 需要跨节点时，序列化为空对象的载荷（如无字段的结构体）无法在接收侧还原，
    /// 在发送前以 `InvalidMessage` 返回；本地投递不受此限制。
    ///
    /// 已交给 `bind` 管理生命周期的订阅者类型不能作为载荷，见 [`Bus::bind`]。
    pub fn publish_with<M: Message>(&self, message: &M, policy: Delivery) -> BusResult<Published> {
        self.prepare::<M>()?;
        controller::publish(self, &Envelope::typed(message), policy)
    }

    pub fn publish_event(&self, name: &str) -> BusResult<Published> {
        self.publish_event_with(name, Delivery::default())
    }

    pub fn publish_event_with(&self, name: &str, policy: Delivery) -> BusResult<Published> {
        let envelope = Envelope::event(name);
        envelope.validate()?;
        controller::publish(self, &envelope, policy)
    }

    pub fn publish_named<M: Message>(&self, name: &str, value: &M) -> BusResult<Published> {
        self.publish_named_with(name, value, Delivery::default())
    }

    pub fn publish_named_with<M: Message>(
        &self,
        name: &str,
        value: &M,
        policy: Delivery,
    ) -> BusResult<Published> {
        let envelope = Envelope::named(name, value);
        envelope.validate()?;
        self.prepare::<M>()?;
        controller::publish(self, &envelope, policy)
    }

    /// 处理传输送达的入站字节
    pub fn receive(&self, from: PeerId, bytes: &[u8]) -> BusResult<Received> {
        controller::receive(self, from, bytes)
    }

    pub(crate) fn dispatch_local(&self, envelope: &Envelope<'_>) -> DispatchReport {
        dispatcher::dispatch(&self.inner.registry, &self.inner.config, envelope)
    }

    /// 载荷形状检查并登记
    fn prepare<M: Message>(&self) -> BusResult<()> {
        if let Some(bound) = self.inner.bound_types.get(&TypeId::of::<M>()) {
            return Err(BusError::InvalidMessageShape {
                type_name: *bound.value(),
            });
        }
        self.inner.types.register_message::<M>();
        Ok(())
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("subscribers", &self.subscriber_count())
            .field("networked", &self.is_networked())
            .field("config", &self.inner.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::{Callbacks, Subscribe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        hits: AtomicUsize,
    }

    impl Subscribe<u32> for Counter {
        fn on_published(&self, _: &u32) -> CallbackResult {
            self.hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Subscriber for Counter {
        fn callbacks(&self) -> Callbacks<Self> {
            Callbacks::new().subscribe::<u32>()
        }
    }

    #[test]
    fn publish_without_session_dispatches_locally() {
        let bus = Bus::new();
        let counter = Arc::new(Counter::default());
        assert!(bus.subscribe(&counter));
        assert!(!bus.subscribe(&counter));

        let published = bus.publish(&5_u32).unwrap();
        assert!(matches!(published, Published::Dispatched(ref r) if r.invoked == 1));
        assert_eq!(counter.hits.load(Ordering::SeqCst), 1);

        assert!(bus.unsubscribe(&counter));
        bus.publish(&5_u32).unwrap();
        assert_eq!(counter.hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn blank_event_name_is_rejected() {
        let bus = Bus::new();
        assert!(matches!(
            bus.publish_event("  "),
            Err(BusError::InvalidMessage { .. })
        ));
        assert!(matches!(
            bus.publish_named("", &1_i32),
            Err(BusError::InvalidMessage { .. })
        ));
    }

    #[test]
    fn subscribing_registers_declared_shapes() {
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Score(u8);
        impl Message for Score {
            const TYPE_NAME: &'static str = "bus_test::Score";
        }

        let bus = Bus::new();
        assert!(!bus.known_types().contains(&"bus_test::Score"));

        let _listener = bus.listen::<Score, _>(|_| Ok(()));
        assert!(bus.known_types().contains(&"bus_test::Score"));
    }

    #[test]
    fn global_instance_is_shared() {
        assert!(std::ptr::eq(Bus::global(), Bus::global()));
    }
}
