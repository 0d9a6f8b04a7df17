use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Service configuration, loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Address the HTTP server binds to
    pub listen: String,
    /// API description documents, one per v3-style version
    pub api_documents: Vec<PathBuf>,
    /// Base path of the geo-temporal (v4) API
    pub v4_base_path: String,
    /// Data-provider gateway
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8000".to_string(),
            api_documents: vec![PathBuf::from("configs/apiv3.json")],
            v4_base_path: "/apiv4".to_string(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080".to_string(),
            timeout_secs: 60,
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AdapterConfig {
    /// Load configuration from a YAML file. Relative document paths are
    /// resolved against the file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let mut config = Self::parse(&contents)?;
        if let Some(dir) = path.parent() {
            for document in &mut config.api_documents {
                if document.is_relative() {
                    *document = dir.join(&*document);
                }
            }
        }
        Ok(config)
    }

    /// Parse configuration from a YAML string
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_documents.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one API document is required".to_string(),
            ));
        }
        self.listen_addr()?;
        if !self.v4_base_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "v4_base_path '{}' must start with '/'",
                self.v4_base_path
            )));
        }
        if self.gateway.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "gateway.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("listen '{}': {}", self.listen, e)))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AdapterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_addr().unwrap().port(), 8000);
        assert_eq!(config.gateway.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AdapterConfig::parse("gateway:\n  url: http://provider:9000\n").unwrap();
        assert_eq!(config.gateway.url, "http://provider:9000");
        assert_eq!(config.gateway.timeout_secs, 60);
        assert_eq!(config.v4_base_path, "/apiv4");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            AdapterConfig::parse("listen: nowhere\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AdapterConfig::parse("api_documents: []\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AdapterConfig::parse("v4_base_path: apiv4\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AdapterConfig::parse("gateway:\n  timeout_secs: 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AdapterConfig::parse("listen: [1, 2"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_from_file_resolves_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adapter.yaml");
        std::fs::write(
            &path,
            "listen: 0.0.0.0:9000\napi_documents:\n  - apiv3.json\n  - /srv/docs/apiv3b.json\n",
        )
        .unwrap();
        let config = AdapterConfig::from_file(&path).unwrap();
        assert_eq!(config.api_documents[0], dir.path().join("apiv3.json"));
        assert_eq!(config.api_documents[1], PathBuf::from("/srv/docs/apiv3b.json"));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            AdapterConfig::from_file("/nonexistent/adapter.yaml"),
            Err(ConfigError::IoError(_))
        ));
    }
}
