use crate::error::{BusError, BusResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 空对象的规范编码；载荷为此值的报文视为无效
const EMPTY_OBJECT: &str = "{}";

/// 跨节点传输的报文；构造后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    /// 载荷形状的稳定名称，接收方据此还原类型
    type_discriminator: String,
    /// 序列化后的载荷
    data: String,
}

impl Packet {
    pub fn new(type_discriminator: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            type_discriminator: type_discriminator.into(),
            data: data.into(),
        }
    }

    pub fn type_discriminator(&self) -> &str {
        &self.type_discriminator
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    /// 两个字段均非空，且载荷不是空对象
    pub fn is_valid(&self) -> bool {
        !self.type_discriminator.is_empty() && !self.data.is_empty() && self.data != EMPTY_OBJECT
    }

    pub fn validate(&self) -> BusResult<()> {
        if self.type_discriminator.is_empty() {
            return Err(BusError::invalid_packet("empty type discriminator"));
        }
        if self.data.is_empty() {
            return Err(BusError::invalid_packet("empty data"));
        }
        if self.data == EMPTY_OBJECT {
            return Err(BusError::invalid_packet(format!(
                "empty object data for {}",
                self.type_discriminator
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_discriminator, self.data)
    }
}
