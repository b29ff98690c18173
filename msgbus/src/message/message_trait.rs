use crate::error::{BusError, BusResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId, type_name};
use std::fmt;

/// 消息载荷需要满足的通用能力边界
///
/// `TYPE_NAME` 是跨节点稳定且全局唯一的形状名，接收方据此还原具体类型；
/// 通常由 `#[message]` 宏生成（默认 `模块路径::类型名`）。
pub trait Message:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const TYPE_NAME: &'static str;
}

type EncodeFn = fn(&(dyn Any + Send + Sync)) -> BusResult<String>;
type DecodeFn = fn(&str) -> serde_json::Result<Box<dyn Any + Send + Sync>>;

/// 消息形状：类型标识 + 单态化的编解码函数
///
/// 全部字段均为 `Copy`，构造与复制不涉及堆分配。
#[derive(Clone, Copy)]
pub struct MessageType {
    name: &'static str,
    rust_name: &'static str,
    id: TypeId,
    encode: EncodeFn,
    decode: DecodeFn,
}

impl MessageType {
    pub fn of<M: Message>() -> Self {
        Self {
            name: M::TYPE_NAME,
            rust_name: type_name::<M>(),
            id: TypeId::of::<M>(),
            encode: encode_erased::<M>,
            decode: decode_erased::<M>,
        }
    }

    /// 跨节点稳定的类型名（即 `Message::TYPE_NAME`）
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 进程内的 Rust 类型名（仅用于日志）
    pub fn rust_name(&self) -> &'static str {
        self.rust_name
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    pub fn is<M: 'static>(&self) -> bool {
        self.id == TypeId::of::<M>()
    }

    pub(crate) fn encode(&self, value: &(dyn Any + Send + Sync)) -> BusResult<String> {
        (self.encode)(value)
    }

    pub(crate) fn decode(&self, data: &str) -> serde_json::Result<Box<dyn Any + Send + Sync>> {
        (self.decode)(data)
    }
}

impl PartialEq for MessageType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MessageType {}

impl fmt::Debug for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageType")
            .field("name", &self.name)
            .field("rust_name", &self.rust_name)
            .finish()
    }
}

fn encode_erased<M: Message>(value: &(dyn Any + Send + Sync)) -> BusResult<String> {
    // 正常情况下这里的 downcast 永远不会失败（MessageType 与值同源于泛型 M）
    let message = value
        .downcast_ref::<M>()
        .ok_or(BusError::TypeMismatch {
            expected: type_name::<M>(),
            found: "unknown",
        })?;
    Ok(serde_json::to_string(message)?)
}

fn decode_erased<M: Message>(data: &str) -> serde_json::Result<Box<dyn Any + Send + Sync>> {
    let message: M = serde_json::from_str(data)?;
    Ok(Box::new(message))
}

macro_rules! impl_builtin_message {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl Message for $ty {
                const TYPE_NAME: &'static str = $name;
            }
        )*
    };
}

impl_builtin_message! {
    () => "()",
    bool => "bool",
    char => "char",
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    f32 => "f32",
    f64 => "f64",
    String => "String",
}

/// 内置形状，接收方无需显式注册即可解码
pub(crate) fn builtin_types() -> [MessageType; 15] {
    [
        MessageType::of::<()>(),
        MessageType::of::<bool>(),
        MessageType::of::<char>(),
        MessageType::of::<i8>(),
        MessageType::of::<i16>(),
        MessageType::of::<i32>(),
        MessageType::of::<i64>(),
        MessageType::of::<u8>(),
        MessageType::of::<u16>(),
        MessageType::of::<u32>(),
        MessageType::of::<u64>(),
        MessageType::of::<f32>(),
        MessageType::of::<f64>(),
        MessageType::of::<String>(),
        MessageType::of::<super::Args>(),
    ]
}
