use crate::error::{Error, Result};
use crate::registry::Api;
use crate::selection::{Strategy, StrategySettings};
use crate::window::MONTH;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "keyrota.toml";
const CONFIG_PATH_ENV: &str = "KEYROTA_CONFIG";
const ENV_PREFIX: &str = "KEYROTA_";

const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1/";
const DEFAULT_KEY_PREFIX: &str = "ratelimit";
const DEFAULT_METRIC_PREFIX: &str = "metrics";

const STRATEGY_FIELDS: [&str; 2] = ["key_strategy", "model_strategy"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub redis_url: String,
    /// 计数 key 前缀；同前缀的实例共享计数。
    pub key_prefix: String,
    pub metric_prefix: String,
    pub metrics_enabled: bool,
    pub default_batch_size: usize,
    pub key_strategy: Strategy,
    pub model_strategy: Strategy,
    /// 额外窗口（秒），在 minute/hour/day/month 基础上扩展或覆盖。
    pub windows: BTreeMap<String, u64>,
    /// 不可借用的窗口。
    pub final_window: String,
    /// 日志级别：off / low / high。
    pub debug: String,
    /// 以 JSON 行输出日志。
    pub log_json: bool,
    pub apis: Vec<Api>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            metric_prefix: DEFAULT_METRIC_PREFIX.to_string(),
            metrics_enabled: true,
            default_batch_size: 1,
            key_strategy: Strategy::Ascending,
            model_strategy: Strategy::Ascending,
            windows: BTreeMap::new(),
            final_window: MONTH.to_string(),
            debug: "low".to_string(),
            log_json: false,
            apis: Vec::new(),
        }
    }
}

impl Settings {
    /// 默认值 <- 配置文件（`KEYROTA_CONFIG`，缺省 `keyrota.toml`）<- `KEYROTA_*` 环境变量。
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path)
    }

    /// 文件不存在时只使用默认值与环境变量。
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::figment(path)
            .extract::<Settings>()
            .map_err(extract_error)?
            .validated()
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .ignore(&["config"])
                    .split("__"),
            )
    }

    fn validated(self) -> Result<Self> {
        if self.default_batch_size == 0 {
            return Err(Error::validation("default_batch_size 必须大于 0"));
        }
        if self.key_prefix.trim().is_empty() || self.metric_prefix.trim().is_empty() {
            return Err(Error::configuration("key_prefix / metric_prefix 不能为空"));
        }
        Ok(self)
    }

    pub fn strategies(&self) -> StrategySettings {
        StrategySettings {
            key: self.key_strategy,
            model: self.model_strategy,
        }
    }

    pub fn log_level(&self) -> crate::logging::LogLevel {
        crate::logging::LogLevel::parse(&self.debug)
    }
}

/// 策略名称无法识别属于参数错误，与运行时切换策略保持一致；其余均为配置错误。
fn extract_error(e: figment::Error) -> Error {
    let message = format!("加载配置失败: {e}");
    let on_strategy = e
        .path
        .last()
        .is_some_and(|field| STRATEGY_FIELDS.contains(&field.as_str()));
    if on_strategy {
        Error::validation(message)
    } else {
        Error::configuration(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_file() {
        Jail::expect_with(|jail| {
            let settings = Settings::load_from(&jail.directory().join("missing.toml")).unwrap();
            assert_eq!(settings, Settings::default());
            assert_eq!(settings.final_window, "month");
            Ok(())
        });
    }

    #[test]
    fn file_then_env_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "keyrota.toml",
                r#"
                key_prefix = "quota"
                key_strategy = "round-robin"
                metrics_enabled = false
                default_batch_size = 3

                [windows]
                second = 1

                [[apis]]
                name = "openai"
                keys = ["sk-a", "sk-b"]

                [[apis.models]]
                name = "gpt"
                limits = { minute = 2, day = 100 }
                metadata = { tier = "pro" }
                "#,
            )?;
            jail.set_env("KEYROTA_MODEL_STRATEGY", "random");
            jail.set_env("KEYROTA_KEY_PREFIX", "from-env");

            let settings = Settings::load_from(Path::new("keyrota.toml")).unwrap();
            assert_eq!(settings.key_prefix, "from-env");
            assert_eq!(settings.key_strategy, Strategy::RoundRobin);
            assert_eq!(settings.model_strategy, Strategy::Random);
            assert!(!settings.metrics_enabled);
            assert_eq!(settings.default_batch_size, 3);
            assert_eq!(settings.windows.get("second"), Some(&1));

            let api = &settings.apis[0];
            assert_eq!(api.keys, vec!["sk-a".to_string(), "sk-b".to_string()]);
            assert_eq!(api.models[0].limits.get("minute"), Some(&2));
            assert_eq!(
                api.models[0].metadata,
                Some(serde_json::json!({ "tier": "pro" }))
            );
            Ok(())
        });
    }

    #[test]
    fn strategy_aliases_load_from_file_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file("keyrota.toml", r#"key_strategy = "round_robin""#)?;
            jail.set_env("KEYROTA_MODEL_STRATEGY", "RoundRobin");

            let settings = Settings::load_from(Path::new("keyrota.toml")).unwrap();
            assert_eq!(settings.key_strategy, Strategy::RoundRobin);
            assert_eq!(settings.model_strategy, Strategy::RoundRobin);
            Ok(())
        });
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("keyrota.toml", r#"key_strategy = "weighted""#)?;
            let err = Settings::load_from(Path::new("keyrota.toml")).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));

            jail.create_file("keyrota.toml", r#"redis_url = ["not", "a", "string"]"#)?;
            let err = Settings::load_from(Path::new("keyrota.toml")).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)));

            jail.create_file("keyrota.toml", "default_batch_size = 0")?;
            let err = Settings::load_from(Path::new("keyrota.toml")).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
            Ok(())
        });
    }
}
