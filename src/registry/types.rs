use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 一个模型及其各窗口的限额。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    /// 窗口名 -> 上限。按窗口名排序，保证逐窗口判断的顺序固定。
    #[serde(default)]
    pub limits: BTreeMap<String, u64>,
    /// 调用方自带的附加信息，原样透传。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            limits: BTreeMap::new(),
            metadata: None,
        }
    }

    pub fn with_limit(mut self, window: impl Into<String>, limit: u64) -> Self {
        self.limits.insert(window.into(), limit);
        self
    }
}

/// 一组可轮换的 key 与模型。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Api {
    pub name: String,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub models: Vec<Model>,
}

impl Api {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: Vec::new(),
            models: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.keys.push(key.into());
        self
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.models.push(model);
        self
    }

    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.name == name)
    }
}
