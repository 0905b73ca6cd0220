use tracing_subscriber::EnvFilter;

const CRATE_TARGET: &str = "keyrota";

/// 日志等级：
/// - off：完全关闭
/// - low：本项目 info 级别（接纳/拒绝汇总、策略切换、限额更新）
/// - high：本项目 debug 级别（逐个候选的冻结、借用、回滚细节）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Low = 1,
    High = 2,
}

impl LogLevel {
    pub fn parse(debug: &str) -> Self {
        match debug.trim().to_lowercase().as_str() {
            "off" | "none" => Self::Off,
            "high" | "debug" | "all" => Self::High,
            _ => Self::Low,
        }
    }

    fn crate_directive(self) -> String {
        match self {
            LogLevel::Off => format!("{CRATE_TARGET}=off"),
            LogLevel::Low => format!("{CRATE_TARGET}=info"),
            LogLevel::High => format!("{CRATE_TARGET}=debug"),
        }
    }
}

/// 依赖库日志默认压到 warn；`RUST_LOG` 未显式提及本项目时，按等级补上本项目的指令。
pub fn env_filter(level: LogLevel, rust_log: &str) -> EnvFilter {
    if level == LogLevel::Off {
        return EnvFilter::new("off");
    }

    let env = rust_log.trim();
    if env.is_empty() {
        EnvFilter::new(format!("warn,{}", level.crate_directive()))
    } else if env.contains(CRATE_TARGET) {
        EnvFilter::new(env)
    } else {
        EnvFilter::new(format!("{env},{}", level.crate_directive()))
    }
}

pub fn init_tracing(level: LogLevel, json: bool) {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_default();
    let filter = env_filter(level, &rust_log);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_levels() {
        assert_eq!(LogLevel::parse("off"), LogLevel::Off);
        assert_eq!(LogLevel::parse("  HIGH "), LogLevel::High);
        assert_eq!(LogLevel::parse("low"), LogLevel::Low);
        assert_eq!(LogLevel::parse(""), LogLevel::Low);
        assert!(LogLevel::High > LogLevel::Low);
    }

    #[test]
    fn filter_keeps_crate_logs_visible() {
        use tracing_subscriber::filter::LevelFilter;

        assert_eq!(
            env_filter(LogLevel::Low, "").max_level_hint(),
            Some(LevelFilter::INFO)
        );
        assert_eq!(
            env_filter(LogLevel::High, "redis=warn").max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
        assert_eq!(
            env_filter(LogLevel::Low, "keyrota=trace").max_level_hint(),
            Some(LevelFilter::TRACE)
        );
        assert_eq!(
            env_filter(LogLevel::Off, "keyrota=trace").max_level_hint(),
            Some(LevelFilter::OFF)
        );
    }
}
