use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::CoordinatorConfig;

/// 配置加载器，提供便捷的配置加载方法
///
/// 优先级：
/// 1. 环境变量 CMQUEUE_CONFIG_PATH 指定的配置文件
/// 2. 默认配置文件 config/cmqueue.toml
/// 3. 内置默认值
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load() -> Result<CoordinatorConfig> {
        if let Ok(config_path) = env::var("CMQUEUE_CONFIG_PATH") {
            return Self::load_from_file(&config_path)
                .with_context(|| format!("加载指定配置文件失败: {config_path}"));
        }

        let default_file = "config/cmqueue.toml";
        if Path::new(default_file).exists() {
            Self::load_from_file(default_file)
                .with_context(|| format!("加载默认配置文件失败: {default_file}"))
        } else {
            info!("未找到配置文件，使用内置默认配置");
            let config = CoordinatorConfig::default();
            config.validate().context("配置验证失败")?;
            Ok(config)
        }
    }

    /// 从指定文件加载配置，支持 CMQUEUE__ 前缀的环境变量覆盖
    pub fn load_from_file(path: &str) -> Result<CoordinatorConfig> {
        let settings = config::Config::builder()
            .add_source(config::File::from(Path::new(path)))
            .add_source(config::Environment::with_prefix("CMQUEUE").separator("__"))
            .build()
            .with_context(|| format!("读取配置文件失败: {path}"))?;

        let config: CoordinatorConfig = settings
            .try_deserialize()
            .context("解析配置内容失败")?;

        config.validate().context("配置验证失败")?;
        Ok(config)
    }
}
