//! 事件（Event）与参数列表（Params）
//!
//! 事件本身没有标识与生命周期：每次 raise 构造一个 `Event` 并立即消费。
//! 事件类型是区分大小写的不透明字符串，约定使用点分段，如 `"order.placed"`。
//!
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::{EventError, EventResult};

/// 有序的事件参数列表
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Vec<Value>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }

    /// 按位置取出并反序列化为具体类型
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> EventResult<T> {
        let value = self.0.get(index).ok_or_else(|| EventError::BindingResolution {
            expression: format!("param[{index}]"),
            reason: format!("only {} parameter(s) supplied", self.0.len()),
        })?;
        Ok(serde_json::from_value(value.clone())?)
    }

    #[doc(hidden)]
    pub fn from_json_array(value: Value) -> Self {
        match value {
            Value::Array(values) => Self(values),
            other => Self(vec![other]),
        }
    }

    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl FromIterator<Value> for Params {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// 以 `json!` 语法构造参数列表：`params!["alice", 42, {"vip": true}]`
#[macro_export]
macro_rules! params {
    () => {
        $crate::event::Params::new()
    };
    ($($tt:tt)+) => {
        $crate::event::Params::from_json_array($crate::serde_json::json!([$($tt)+]))
    };
}

/// 一次事件投递的载体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    event_type: String,
    params: Params,
}

impl Event {
    pub fn new(event_type: impl Into<String>, params: Params) -> Self {
        Self {
            event_type: event_type.into(),
            params,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn params(&self) -> &Params {
        &self.params
    }
}
