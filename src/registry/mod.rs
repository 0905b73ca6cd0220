//! API / key / 模型 / 限额定义的内存注册表。
//!
//! 运行时只允许修改模型限额（`update_limits`），写入立即对后续判断可见；
//! 并发写入按“后写者胜出”处理，不做版本管理或回滚。

mod types;

pub use types::{Api, Model};

use crate::error::{Error, Result};
use crate::window::Keyspace;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug)]
pub struct Registry {
    keyspace: Arc<Keyspace>,
    apis: RwLock<Vec<Api>>,
}

impl Registry {
    /// 校验并装载全部 API 定义：名称唯一、限额只引用已注册窗口。
    pub fn new(apis: Vec<Api>, keyspace: Arc<Keyspace>) -> Result<Self> {
        validate_definitions(&apis, &keyspace)?;
        Ok(Self {
            keyspace,
            apis: RwLock::new(apis),
        })
    }

    /// 返回 API 定义的快照。
    pub async fn find_api(&self, name: &str) -> Result<Api> {
        let apis = self.apis.read().await;
        apis.iter()
            .find(|a| a.name == name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("API 不存在: {name}")))
    }

    pub async fn find_model(&self, api_name: &str, model_name: &str) -> Result<Model> {
        let api = self.find_api(api_name).await?;
        api.model(model_name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("模型不存在: {api_name}/{model_name}")))
    }

    pub async fn api_names(&self) -> Vec<String> {
        let apis = self.apis.read().await;
        apis.iter().map(|a| a.name.clone()).collect()
    }

    /// 局部更新模型限额：未出现在 `new_limits` 里的窗口保持不变。
    ///
    /// 所有条目先全部校验，任一条目非法则整体不生效。返回合并后的限额。
    pub async fn update_limits(
        &self,
        api_name: &str,
        model_name: &str,
        new_limits: &BTreeMap<String, serde_json::Value>,
    ) -> Result<BTreeMap<String, u64>> {
        let mut parsed = BTreeMap::new();
        for (window, value) in new_limits {
            if !self.keyspace.is_known(window) {
                return Err(Error::configuration(format!("未注册的窗口: {window}")));
            }
            parsed.insert(window.clone(), parse_limit(window, value)?);
        }

        let mut apis = self.apis.write().await;
        let api = apis
            .iter_mut()
            .find(|a| a.name == api_name)
            .ok_or_else(|| Error::not_found(format!("API 不存在: {api_name}")))?;
        let model = api
            .models
            .iter_mut()
            .find(|m| m.name == model_name)
            .ok_or_else(|| Error::not_found(format!("模型不存在: {api_name}/{model_name}")))?;

        model.limits.extend(parsed);
        tracing::info!(
            api = api_name,
            model = model_name,
            limits = ?model.limits,
            "模型限额已更新"
        );
        Ok(model.limits.clone())
    }
}

fn validate_definitions(apis: &[Api], keyspace: &Keyspace) -> Result<()> {
    let mut api_names = HashSet::new();
    for api in apis {
        if !api_names.insert(api.name.as_str()) {
            return Err(Error::configuration(format!("API 名称重复: {}", api.name)));
        }

        let mut model_names = HashSet::new();
        for model in &api.models {
            if !model_names.insert(model.name.as_str()) {
                return Err(Error::configuration(format!(
                    "API {} 下模型名称重复: {}",
                    api.name, model.name
                )));
            }
            if let Some(window) = model.limits.keys().find(|w| !keyspace.is_known(w)) {
                return Err(Error::configuration(format!(
                    "模型 {}/{} 引用了未注册的窗口: {window}",
                    api.name, model.name
                )));
            }
        }
    }
    Ok(())
}

/// 限额必须是非负整数；`10.0` 这类整值浮点也接受。
fn parse_limit(window: &str, value: &serde_json::Value) -> Result<u64> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    if let Some(f) = value.as_f64()
        && f.is_finite()
        && f >= 0.0
        && f.fract() == 0.0
        && f <= u64::MAX as f64
    {
        return Ok(f as u64);
    }
    Err(Error::validation(format!(
        "窗口 {window} 的限额必须是非负整数，实际为 {value}"
    )))
}
