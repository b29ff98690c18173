//! 事件参数（Args）
//!
//! 命名事件可携带一组键值参数，值为文本、数值或标志三类之一；
//! `Args` 为内置消息形状，可直接作为命名事件的载荷跨节点传输。
//!
use msgbus_macros::message;
use serde::{Deserialize, Serialize, Serializer, ser::Error as _};

/// 参数值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ArgValue {
    Text(String),
    /// 仅限有限值：NaN 与无穷在 JSON 中没有表示，序列化时报错
    Number(#[serde(serialize_with = "finite")] f64),
    /// 仅表示“存在”，无附带值
    Flag,
}

fn finite<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if !value.is_finite() {
        return Err(S::Error::custom(format!("non-finite number argument: {value}")));
    }
    serializer.serialize_f64(*value)
}

/// 单个参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arg {
    pub key: String,
    pub value: ArgValue,
}

impl Arg {
    pub fn text(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: ArgValue::Text(value.into()),
        }
    }

    pub fn number(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value: ArgValue::Number(value),
        }
    }

    pub fn flag(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: ArgValue::Flag,
        }
    }
}

/// 有序参数列表；同名键以首个为准
#[message(name = "msgbus::Args")]
#[derive(Default)]
#[serde(transparent)]
pub struct Args {
    args: Vec<Arg>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn push(&mut self, arg: Arg) {
        self.args.push(arg);
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.args.iter().find(|a| a.key == key).map(|a| &a.value)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            ArgValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            ArgValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some(ArgValue::Flag))
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arg> {
        self.args.iter()
    }
}

impl FromIterator<Arg> for Args {
    fn from_iter<I: IntoIterator<Item = Arg>>(iter: I) -> Self {
        Self {
            args: iter.into_iter().collect(),
        }
    }
}
