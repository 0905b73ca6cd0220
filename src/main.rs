use anyhow::{Context, anyhow, bail};
use keyrota::{QuotaManager, Settings, logging};

const USAGE: &str = "用法:
  keyrota pick <api> [--borrow]
  keyrota batch <api> [size]
  keyrota stats <api> <key> <model>
  keyrota freeze <key> <model> <seconds>
  keyrota frozen <api>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut settings = Settings::load().context("加载配置失败")?;

    // 命令行覆盖：-debug <level>
    let mut args: Vec<String> = Vec::new();
    let mut raw = std::env::args().skip(1);
    while let Some(arg) = raw.next() {
        if arg == "-debug"
            && let Some(v) = raw.next()
        {
            settings.debug = v;
            continue;
        }
        args.push(arg);
    }

    logging::init_tracing(settings.log_level(), settings.log_json);

    let Some((command, rest)) = args.split_first() else {
        bail!("{USAGE}");
    };

    let manager = QuotaManager::connect(&settings)
        .await
        .context("初始化配额管理器失败")?;

    let output = match (command.as_str(), rest) {
        ("pick", [api, flags @ ..]) => {
            let borrow = flags.iter().any(|f| f == "--borrow");
            match manager.get_model(api, borrow).await? {
                Some(selection) => serde_json::to_value(selection)?,
                None => serde_json::json!({ "available": false }),
            }
        }
        ("batch", [api, size @ ..]) => {
            let size = match size.first() {
                Some(s) => Some(s.parse::<usize>().context("批量大小必须是正整数")?),
                None => None,
            };
            match manager.get_batch(api, size).await? {
                Some(batch) => serde_json::to_value(batch)?,
                None => serde_json::json!({ "available": false }),
            }
        }
        ("stats", [api, key, model]) => {
            serde_json::to_value(manager.get_usage_stats(api, key, model).await?)?
        }
        ("freeze", [key, model, seconds]) => {
            let seconds: u64 = seconds.parse().context("冻结秒数必须是正整数")?;
            manager.freeze_model(key, model, seconds).await?;
            serde_json::json!({ "frozen": true, "seconds": seconds })
        }
        ("frozen", [api]) => serde_json::to_value(manager.frozen_pairs(api).await?)?,
        _ => return Err(anyhow!("无法识别的命令\n{USAGE}")),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
