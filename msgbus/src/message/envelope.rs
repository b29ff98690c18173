use super::{Message, MessageType};
use crate::error::{BusError, BusResult};
use std::any::Any;
use std::fmt;

/// 消息判别：结构化类型标识，或自由格式的事件名
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discriminator<'a> {
    Type(MessageType),
    Event(&'a str),
}

/// 借用的消息载荷：类型标识 + 类型擦除的值引用
#[derive(Clone, Copy)]
pub struct Payload<'a> {
    ty: MessageType,
    value: &'a (dyn Any + Send + Sync),
}

impl<'a> Payload<'a> {
    pub fn of<M: Message>(message: &'a M) -> Self {
        Self {
            ty: MessageType::of::<M>(),
            value: message,
        }
    }

    /// 由已解码的值构造；调用方保证 `ty` 与 `value` 同源
    pub(crate) fn from_parts(ty: MessageType, value: &'a (dyn Any + Send + Sync)) -> Self {
        Self { ty, value }
    }

    pub fn message_type(&self) -> MessageType {
        self.ty
    }

    pub fn downcast_ref<M: 'static>(&self) -> Option<&'a M> {
        self.value.downcast_ref::<M>()
    }

    pub(crate) fn value(&self) -> &'a (dyn Any + Send + Sync) {
        self.value
    }
}

impl fmt::Debug for Payload<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload").field("type", &self.ty.name()).finish()
    }
}

/// 消息信封：判别 + 可选载荷
///
/// 信封只借用载荷，构造后不可变；本地分发全程不复制、不分配。
#[derive(Debug, Clone, Copy)]
pub struct Envelope<'a> {
    discriminator: Discriminator<'a>,
    payload: Option<Payload<'a>>,
}

impl<'a> Envelope<'a> {
    /// 按类型寻址的消息
    pub fn typed<M: Message>(message: &'a M) -> Self {
        let payload = Payload::of(message);
        Self {
            discriminator: Discriminator::Type(payload.message_type()),
            payload: Some(payload),
        }
    }

    /// 无参的命名事件
    pub fn event(name: &'a str) -> Self {
        Self {
            discriminator: Discriminator::Event(name),
            payload: None,
        }
    }

    /// 携带载荷的命名事件
    pub fn named<M: Message>(name: &'a str, value: &'a M) -> Self {
        Self {
            discriminator: Discriminator::Event(name),
            payload: Some(Payload::of(value)),
        }
    }

    pub(crate) fn from_parts(discriminator: Discriminator<'a>, payload: Option<Payload<'a>>) -> Self {
        Self {
            discriminator,
            payload,
        }
    }

    pub fn discriminator(&self) -> Discriminator<'a> {
        self.discriminator
    }

    pub fn payload(&self) -> Option<Payload<'a>> {
        self.payload
    }

    pub fn event_name(&self) -> Option<&'a str> {
        match self.discriminator {
            Discriminator::Event(name) => Some(name),
            Discriminator::Type(_) => None,
        }
    }

    /// 用于日志的简短标签
    pub fn label(&self) -> &'a str {
        match self.discriminator {
            Discriminator::Event(name) => name,
            Discriminator::Type(ty) => ty.name(),
        }
    }

    /// 发布前校验：事件名不可为空白
    pub fn validate(&self) -> BusResult<()> {
        if let Discriminator::Event(name) = self.discriminator {
            if name.trim().is_empty() {
                return Err(BusError::invalid_message("event name is empty"));
            }
        }
        Ok(())
    }
}
