//! 回调表（Callbacks）
//!
//! 订阅者在订阅时构建一次的显式注册表：
//! - 类型化能力：载荷类型 → 单个回调；
//! - 命名回调：方法名（默认事件名）+ 额外事件名 → 回调，按声明顺序保存。
//!
//! 一个方法可绑定多个事件名，一个事件名也可对应多个方法。
//!
use super::{CallbackResult, Subscribe};
use crate::message::{Message, MessageType};
use std::any::{Any, type_name};
use std::fmt;
use tracing::warn;

type TypedFn<S> = Box<dyn Fn(&S, &(dyn Any + Send + Sync)) -> CallbackResult + Send + Sync>;
type NullaryFn<S> = Box<dyn Fn(&S) -> CallbackResult + Send + Sync>;

pub(crate) struct TypedCallback<S> {
    pub(crate) ty: MessageType,
    pub(crate) call: TypedFn<S>,
}

pub(crate) enum NamedInvoke<S> {
    Nullary(NullaryFn<S>),
    Unary { ty: MessageType, call: TypedFn<S> },
}

pub(crate) struct NamedCallback<S> {
    pub(crate) method: &'static str,
    pub(crate) events: Vec<String>,
    pub(crate) invoke: NamedInvoke<S>,
}

impl<S> NamedCallback<S> {
    /// 注册名或方法名与事件名相同即命中
    pub(crate) fn matches(&self, event: &str) -> bool {
        self.method == event || self.events.iter().any(|e| e == event)
    }
}

/// 订阅者的回调表
pub struct Callbacks<S> {
    typed: Vec<TypedCallback<S>>,
    named: Vec<NamedCallback<S>>,
}

impl<S> Default for Callbacks<S> {
    fn default() -> Self {
        Self {
            typed: Vec::new(),
            named: Vec::new(),
        }
    }
}

impl<S: Send + Sync + 'static> Callbacks<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以 `Subscribe<M>` 实现注册类型化能力
    pub fn subscribe<M>(self) -> Self
    where
        M: Message,
        S: Subscribe<M>,
    {
        self.on::<M, _>(|subscriber, message| {
            <S as Subscribe<M>>::on_published(subscriber, message)
        })
    }

    /// 以闭包注册类型化能力；同一类型重复注册时保留第一项
    pub fn on<M, F>(mut self, f: F) -> Self
    where
        M: Message,
        F: Fn(&S, &M) -> CallbackResult + Send + Sync + 'static,
    {
        let ty = MessageType::of::<M>();
        if self.typed.iter().any(|t| t.ty == ty) {
            warn!(
                subscriber = type_name::<S>(),
                message = ty.name(),
                "duplicate typed capability ignored"
            );
            return self;
        }

        self.typed.push(TypedCallback {
            ty,
            call: erase::<S, M, F>(f),
        });
        self
    }

    /// 注册无参命名回调；`events` 为空时仅以方法名作为事件名
    pub fn method<F>(mut self, method: &'static str, events: &[&str], f: F) -> Self
    where
        F: Fn(&S) -> CallbackResult + Send + Sync + 'static,
    {
        self.named.push(NamedCallback {
            method,
            events: events.iter().map(|e| e.to_string()).collect(),
            invoke: NamedInvoke::Nullary(Box::new(f)),
        });
        self
    }

    /// 注册单参命名回调；仅当事件载荷类型恰为 `T` 时触发
    pub fn method_with<T, F>(mut self, method: &'static str, events: &[&str], f: F) -> Self
    where
        T: Message,
        F: Fn(&S, &T) -> CallbackResult + Send + Sync + 'static,
    {
        self.named.push(NamedCallback {
            method,
            events: events.iter().map(|e| e.to_string()).collect(),
            invoke: NamedInvoke::Unary {
                ty: MessageType::of::<T>(),
                call: erase::<S, T, F>(f),
            },
        });
        self
    }

    pub(crate) fn typed_for(&self, ty: MessageType) -> Option<&TypedCallback<S>> {
        self.typed.iter().find(|t| t.ty == ty)
    }

    pub(crate) fn named_for<'a>(
        &'a self,
        event: &'a str,
    ) -> impl Iterator<Item = &'a NamedCallback<S>> + 'a {
        self.named.iter().filter(move |n| n.matches(event))
    }

    /// 回调表涉及的全部载荷形状（用于接收方解码注册）
    pub(crate) fn message_types(&self) -> impl Iterator<Item = MessageType> + '_ {
        let typed = self.typed.iter().map(|t| t.ty);
        let named = self.named.iter().filter_map(|n| match &n.invoke {
            NamedInvoke::Unary { ty, .. } => Some(*ty),
            NamedInvoke::Nullary(_) => None,
        });
        typed.chain(named)
    }

    pub fn typed_len(&self) -> usize {
        self.typed.len()
    }

    pub fn named_len(&self) -> usize {
        self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.typed.is_empty() && self.named.is_empty()
    }
}

impl<S> fmt::Debug for Callbacks<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let typed: Vec<&str> = self.typed.iter().map(|t| t.ty.name()).collect();
        let named: Vec<&str> = self.named.iter().map(|n| n.method).collect();
        f.debug_struct("Callbacks")
            .field("typed", &typed)
            .field("named", &named)
            .finish()
    }
}

fn erase<S, M, F>(f: F) -> TypedFn<S>
where
    S: 'static,
    M: Message,
    F: Fn(&S, &M) -> CallbackResult + Send + Sync + 'static,
{
    Box::new(
        move |subscriber: &S, value: &(dyn Any + Send + Sync)| match value.downcast_ref::<M>() {
            Some(message) => f(subscriber, message),
            None => Err(anyhow::anyhow!(
                "type mismatch: expected={}",
                type_name::<M>()
            )),
        },
    )
}
