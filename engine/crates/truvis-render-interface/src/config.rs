use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// render system 的配置，从 TOML 文件加载
///
/// ```toml
/// max_frames_in_flight = 3
/// log_level = "debug"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSystemConfig {
    /// GPU 最多落后 CPU 的帧数，也是资源延迟销毁的帧数
    pub max_frames_in_flight: u32,
    pub log_level: String,
}
impl Default for RenderSystemConfig {
    fn default() -> Self {
        Self {
            max_frames_in_flight: 2,
            log_level: "info".to_string(),
        }
    }
}
impl RenderSystemConfig {
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: RenderSystemConfig = toml::from_str(content).context("解析 TOML 配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).with_context(|| format!("读取配置文件失败: {:?}", path.as_ref()))?;
        Self::from_toml_str(&content).with_context(|| format!("加载配置文件失败: {:?}", path.as_ref()))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.max_frames_in_flight >= 1, "max_frames_in_flight 至少为 1");
        self.log_level_filter()?;
        Ok(())
    }

    pub fn log_level_filter(&self) -> anyhow::Result<log::LevelFilter> {
        self.log_level
            .parse::<log::LevelFilter>()
            .map_err(|_| anyhow::anyhow!("无效的日志级别: {}", self.log_level))
    }
}
