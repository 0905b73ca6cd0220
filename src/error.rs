use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// 引用了未注册的窗口，或配置本身不自洽。
    #[error("配置错误: {0}")]
    Configuration(String),

    /// API 或模型不存在。
    #[error("未找到: {0}")]
    NotFound(String),

    /// 限额数值非法，或策略名称无法识别。
    #[error("参数错误: {0}")]
    Validation(String),

    /// 后端存储错误（连接/超时等），原样向上传递，不做重试。
    #[error(transparent)]
    Store(#[from] redis::RedisError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// 调用方据此区分“使用方式错误”与“后端故障”。
    pub fn is_store(&self) -> bool {
        matches!(self, Error::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_are_transparent() {
        let err: Error = redis::RedisError::from((redis::ErrorKind::IoError, "连接断开")).into();
        assert!(err.is_store());
        assert!(err.to_string().contains("连接断开"));

        let err = Error::configuration("未知窗口 fortnight");
        assert!(!err.is_store());
        assert_eq!(err.to_string(), "配置错误: 未知窗口 fortnight");
    }
}
