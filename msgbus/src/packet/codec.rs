//! 报文编解码
//!
//! 判别串约定：
//! - 类型寻址：`Message::TYPE_NAME`，数据为载荷的 JSON；
//! - 无参命名事件：`@event`，数据为 `{"name": ...}`；
//! - 带载荷命名事件：`@event:<载荷类型名>`，数据为 `{"name": ..., "value": ...}`。
//!
//! `@event` 为保留前缀，`TypeRegistry` 拒绝以其开头的类型名。
//!
use super::{Packet, TypeRegistry};
use crate::error::{BusError, BusResult};
use crate::message::{Discriminator, Envelope, MessageType, Payload};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::any::Any;
use std::fmt;

/// 命名事件的保留判别串
pub const EVENT_DISCRIMINATOR: &str = "@event";

const EVENT_TYPE_SEPARATOR: char = ':';

#[derive(Serialize)]
struct NamedBodyRef<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a RawValue>,
}

#[derive(Deserialize)]
struct NamedBody {
    name: String,
    #[serde(default)]
    value: Option<Box<RawValue>>,
}

/// 将信封编码为报文
pub fn encode(envelope: &Envelope<'_>) -> BusResult<Packet> {
    match envelope.discriminator() {
        Discriminator::Type(ty) => {
            let payload = envelope
                .payload()
                .ok_or_else(|| BusError::invalid_message("typed envelope without payload"))?;
            Ok(Packet::new(ty.name(), ty.encode(payload.value())?))
        }
        Discriminator::Event(name) => match envelope.payload() {
            None => {
                let body = NamedBodyRef { name, value: None };
                Ok(Packet::new(EVENT_DISCRIMINATOR, serde_json::to_string(&body)?))
            }
            Some(payload) => {
                let ty = payload.message_type();
                let raw = RawValue::from_string(ty.encode(payload.value())?)?;
                let body = NamedBodyRef {
                    name,
                    value: Some(&*raw),
                };
                Ok(Packet::new(
                    format!("{EVENT_DISCRIMINATOR}{EVENT_TYPE_SEPARATOR}{}", ty.name()),
                    serde_json::to_string(&body)?,
                ))
            }
        },
    }
}

/// 校验并解码报文；载荷形状必须为接收方已知
pub fn decode(types: &TypeRegistry, packet: &Packet) -> BusResult<DecodedMessage> {
    packet.validate()?;
    let discriminator = packet.type_discriminator();

    let Some(rest) = discriminator.strip_prefix(EVENT_DISCRIMINATOR) else {
        let ty = types.resolve(discriminator)?;
        let value = ty
            .decode(packet.data())
            .map_err(|e| deserialization_failure(discriminator, e))?;
        return Ok(DecodedMessage(Decoded::Typed { ty, value }));
    };

    let payload_type = if rest.is_empty() {
        None
    } else {
        let name = rest.strip_prefix(EVENT_TYPE_SEPARATOR).ok_or_else(|| {
            BusError::invalid_packet(format!("malformed event discriminator: {discriminator}"))
        })?;
        Some(types.resolve(name)?)
    };

    let body: NamedBody = serde_json::from_str(packet.data())
        .map_err(|e| deserialization_failure(discriminator, e))?;
    if body.name.trim().is_empty() {
        return Err(BusError::invalid_packet("empty event name"));
    }

    let payload = match payload_type {
        None => None,
        Some(ty) => {
            // `null` 载荷（如 `()`）在 Option<Box<RawValue>> 中会被读成 None
            let raw = body.value.as_deref().map(RawValue::get).unwrap_or("null");
            let value = ty
                .decode(raw)
                .map_err(|e| deserialization_failure(ty.name(), e))?;
            Some((ty, value))
        }
    };

    Ok(DecodedMessage(Decoded::Event {
        name: body.name,
        payload,
    }))
}

fn deserialization_failure(type_name: &str, err: serde_json::Error) -> BusError {
    BusError::DeserializationFailure {
        type_name: type_name.to_string(),
        reason: err.to_string(),
    }
}

enum Decoded {
    Typed {
        ty: MessageType,
        value: Box<dyn Any + Send + Sync>,
    },
    Event {
        name: String,
        payload: Option<(MessageType, Box<dyn Any + Send + Sync>)>,
    },
}

/// 解码结果：拥有载荷的值，可借出信封用于本地分发
pub struct DecodedMessage(Decoded);

impl DecodedMessage {
    pub fn envelope(&self) -> Envelope<'_> {
        match &self.0 {
            Decoded::Typed { ty, value } => Envelope::from_parts(
                Discriminator::Type(*ty),
                Some(Payload::from_parts(*ty, &**value)),
            ),
            Decoded::Event { name, payload } => Envelope::from_parts(
                Discriminator::Event(name.as_str()),
                payload
                    .as_ref()
                    .map(|(ty, value)| Payload::from_parts(*ty, &**value)),
            ),
        }
    }

    pub fn event_name(&self) -> Option<&str> {
        match &self.0 {
            Decoded::Event { name, .. } => Some(name.as_str()),
            Decoded::Typed { .. } => None,
        }
    }

    pub fn message_type(&self) -> Option<MessageType> {
        match &self.0 {
            Decoded::Typed { ty, .. } => Some(*ty),
            Decoded::Event { payload, .. } => payload.as_ref().map(|(ty, _)| *ty),
        }
    }

    pub fn downcast_ref<M: 'static>(&self) -> Option<&M> {
        match &self.0 {
            Decoded::Typed { value, .. } => value.downcast_ref::<M>(),
            Decoded::Event { payload, .. } => payload.as_ref()?.1.downcast_ref::<M>(),
        }
    }
}

impl fmt::Debug for DecodedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedMessage")
            .field("event", &self.event_name())
            .field("type", &self.message_type().map(|t| t.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Arg, Args, Message};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Position {
        x: f32,
        y: f32,
    }

    impl Message for Position {
        const TYPE_NAME: &'static str = "test::Position";
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Nothing {}

    impl Message for Nothing {
        const TYPE_NAME: &'static str = "test::Nothing";
    }

    fn types() -> TypeRegistry {
        let types = TypeRegistry::new();
        types.register_message::<Position>();
        types.register_message::<Nothing>();
        types
    }

    #[test]
    fn typed_round_trip() {
        let pos = Position { x: 0.69, y: 4.2 };
        let packet = encode(&Envelope::typed(&pos)).unwrap();
        assert_eq!(packet.type_discriminator(), "test::Position");

        let decoded = decode(&types(), &packet).unwrap();
        assert_eq!(decoded.downcast_ref::<Position>(), Some(&pos));
        assert_eq!(
            decoded.envelope().discriminator(),
            Discriminator::Type(MessageType::of::<Position>())
        );
    }

    #[test]
    fn named_round_trip_with_and_without_payload() {
        let packet = encode(&Envelope::event("Ping")).unwrap();
        assert_eq!(packet.type_discriminator(), EVENT_DISCRIMINATOR);
        assert_eq!(packet.data(), r#"{"name":"Ping"}"#);
        let decoded = decode(&types(), &packet).unwrap();
        assert_eq!(decoded.event_name(), Some("Ping"));
        assert!(decoded.envelope().payload().is_none());

        let args = Args::new().with(Arg::text("who", "p1"));
        let packet = encode(&Envelope::named("Spawn", &args)).unwrap();
        assert_eq!(packet.type_discriminator(), "@event:msgbus::Args");
        let decoded = decode(&types(), &packet).unwrap();
        assert_eq!(decoded.event_name(), Some("Spawn"));
        assert_eq!(decoded.downcast_ref::<Args>(), Some(&args));
    }

    #[test]
    fn unit_payload_is_distinct_from_absent_payload() {
        let packet = encode(&Envelope::named("Tick", &())).unwrap();
        let decoded = decode(&types(), &packet).unwrap();

        let payload = decoded.envelope().payload().unwrap();
        assert!(payload.message_type().is::<()>());
    }

    #[test]
    fn empty_fields_are_invalid_packets() {
        for packet in [Packet::new("", "42"), Packet::new("i32", "")] {
            let err = decode(&types(), &packet).unwrap_err();
            assert!(matches!(err, BusError::InvalidPacket { .. }));
        }

        // 无字段结构体编码为 `{}`，按约定不可传输
        let packet = encode(&Envelope::typed(&Nothing {})).unwrap();
        assert!(!packet.is_valid());
        assert!(matches!(
            decode(&types(), &packet),
            Err(BusError::InvalidPacket { .. })
        ));
    }

    #[test]
    fn unknown_and_malformed_payloads() {
        let err = decode(&types(), &Packet::new("game::Unknown", "1")).unwrap_err();
        assert!(matches!(err, BusError::UnknownType { .. }));

        let err = decode(&types(), &Packet::new("@event:game::Unknown", r#"{"name":"x"}"#))
            .unwrap_err();
        assert!(matches!(err, BusError::UnknownType { .. }));

        let err = decode(&types(), &Packet::new("test::Position", r#"{"x":"nope"}"#))
            .unwrap_err();
        assert!(matches!(err, BusError::DeserializationFailure { .. }));

        let err = decode(&types(), &Packet::new("@event:i32", r#"{"name":"x","value":"s"}"#))
            .unwrap_err();
        assert!(matches!(err, BusError::DeserializationFailure { .. }));

        let err = decode(&types(), &Packet::new("@eventful", r#"{"name":"x"}"#)).unwrap_err();
        assert!(matches!(err, BusError::InvalidPacket { .. }));
    }
}
