use crate::error::{BusError, BusResult};
use crate::message::{Message, MessageType, builtin_types};
use dashmap::DashMap;
use tracing::warn;

use super::EVENT_DISCRIMINATOR;

/// 类型注册表：稳定类型名 → 消息形状
///
/// 接收方只能还原本节点已知的形状；发布、订阅声明与显式注册都会写入此表。
pub struct TypeRegistry {
    by_name: DashMap<&'static str, MessageType>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        let registry = Self {
            by_name: DashMap::new(),
        };
        for ty in builtin_types() {
            registry.register(ty);
        }
        registry
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册形状；同名但不同类型时保留先注册者并返回 `false`
    pub fn register(&self, ty: MessageType) -> bool {
        if ty.name().starts_with(EVENT_DISCRIMINATOR) {
            warn!(
                name = ty.name(),
                rust_type = ty.rust_name(),
                "type name uses the reserved event prefix, not registered"
            );
            return false;
        }

        let existing = *self.by_name.entry(ty.name()).or_insert(ty);
        if existing != ty {
            warn!(
                name = ty.name(),
                registered = existing.rust_name(),
                rejected = ty.rust_name(),
                "type name collision, keeping the first registration"
            );
            return false;
        }
        true
    }

    pub fn register_message<M: Message>(&self) -> bool {
        self.register(MessageType::of::<M>())
    }

    pub fn resolve(&self, name: &str) -> BusResult<MessageType> {
        self.by_name
            .get(name)
            .map(|e| *e.value())
            .ok_or_else(|| BusError::UnknownType {
                type_name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// 已注册的类型名（排序后）
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.by_name.iter().map(|e| *e.key()).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Shadow(i32);

    impl Message for Shadow {
        const TYPE_NAME: &'static str = "i32";
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sneaky;

    impl Message for Sneaky {
        const TYPE_NAME: &'static str = "@event:sneaky";
    }

    #[test]
    fn builtins_are_known() {
        let registry = TypeRegistry::new();
        for name in ["()", "bool", "i64", "f64", "String", "msgbus::Args"] {
            assert!(registry.contains(name), "{name}");
        }
        assert!(registry.resolve("i64").unwrap().is::<i64>());
    }

    #[test]
    fn unknown_names_fail_to_resolve() {
        let err = TypeRegistry::new().resolve("game::Missing").unwrap_err();
        assert!(matches!(err, BusError::UnknownType { type_name } if type_name == "game::Missing"));
    }

    #[test]
    fn collisions_and_reserved_names_are_rejected() {
        let registry = TypeRegistry::new();
        assert!(!registry.register_message::<Shadow>());
        assert!(registry.resolve("i32").unwrap().is::<i32>());

        assert!(!registry.register_message::<Sneaky>());
        assert!(!registry.contains("@event:sneaky"));

        // 重复注册同一类型是幂等的
        assert!(registry.register_message::<i32>());
    }
}
