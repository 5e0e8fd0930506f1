//! 顶层 JSON 配置.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use vigil_format::DemuxConfig;

use crate::logging::LoggingConfig;

/// 顶层配置, 缺省的段使用默认值
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct VigilConfig {
    pub logging: LoggingConfig,
    pub demux: DemuxConfig,
}

/// 从 JSON 文件加载配置, 分帧配置会经过校验
pub fn load_config(path: impl AsRef<Path>) -> Result<VigilConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("读取配置文件失败, path={}", path.display()))?;
    let config: VigilConfig = serde_json::from_str(&text)
        .with_context(|| format!("解析配置文件失败, path={}", path.display()))?;
    config
        .demux
        .validate()
        .with_context(|| format!("分帧配置无效, path={}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: VigilConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.demux, DemuxConfig::default());
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.directory.is_none());
    }
}
