//! 配置管理
//!
//! 配置文件与环境变量（ODMS_ 前缀）分层加载，未提供时使用默认值

use config::{Config, Environment, File};
use odms_core::{OdmsError, Result};
use odms_matching::MatchingPolicy;
use serde::{Deserialize, Serialize};

/// ODMS完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OdmsConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// 匹配策略
    pub matching: MatchingPolicy,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl OdmsConfig {
    /// 加载配置
    ///
    /// 环境变量覆盖配置文件，例如 ODMS_SERVER__PORT=9090
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        builder
            .add_source(Environment::with_prefix("ODMS").separator("__"))
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| OdmsError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_sources() {
        let config = OdmsConfig::load(None).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.matching.minimum_score_threshold, 50);
    }
}
