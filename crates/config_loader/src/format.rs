//! 配置文件格式
//!
//! 格式只由扩展名决定，TOML 与 JSON 共用同一套 serde 定义。

use std::path::Path;

use contracts::{ContractError, RelayBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (推荐)
    Toml,
    Json,
}

impl ConfigFormat {
    /// 按扩展名识别格式，大小写不敏感
    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| {
                ContractError::config_parse(format!(
                    "{}: relay config needs a .toml or .json extension",
                    path.display()
                ))
            })?;

        match ext.to_ascii_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            other => Err(ContractError::config_parse(format!(
                "{}: unsupported config format .{other} (expected .toml or .json)",
                path.display()
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }

    /// 反序列化为 `RelayBlueprint`，不做校验
    pub(crate) fn parse(self, content: &str) -> Result<RelayBlueprint, ContractError> {
        match self {
            Self::Toml => toml::from_str(content).map_err(|e| self.parse_error(e)),
            Self::Json => serde_json::from_str(content).map_err(|e| self.parse_error(e)),
        }
    }

    fn parse_error<E>(self, source: E) -> ContractError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ContractError::ConfigParse {
            message: format!("{} parse error: {source}", self.name()),
            source: Some(Box::new(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::RouteKind;

    #[test]
    fn test_toml_routes() {
        let content = r#"
[store]
url = "redis://127.0.0.1:6379"

[[routes]]
name = "live"
kind = "publish"
format = "stream:project:{projectId}:ingress"
"#;
        let bp = ConfigFormat::Toml.parse(content).unwrap();
        assert_eq!(bp.store.url, "redis://127.0.0.1:6379");
        assert_eq!(bp.routes.len(), 1);
        assert_eq!(bp.routes[0].kind, RouteKind::Publish);
    }

    #[test]
    fn test_json_routes() {
        let content = r#"{
            "store": { "url": "redis://127.0.0.1:6379" },
            "dispatch": { "flush_interval_ms": 250 },
            "rate_limit": { "rate": 10, "size": 500, "key": "projectId" },
            "routes": [
                { "name": "history", "kind": "list", "format": "h:{projectId}", "size": 100 }
            ]
        }"#;
        let bp = ConfigFormat::Json.parse(content).unwrap();
        assert_eq!(bp.dispatch.flush_interval_ms, 250);
        assert_eq!(bp.routes[0].size, Some(100));
    }

    #[test]
    fn test_parse_error_names_format() {
        let err = ConfigFormat::Toml.parse("invalid toml [[[").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
        assert!(err.to_string().contains("TOML"));

        let err = ConfigFormat::Json.parse("{").unwrap_err();
        assert!(err.to_string().contains("JSON"));
    }

    #[test]
    fn test_unknown_route_kind() {
        let content = r#"
[store]
url = "redis://127.0.0.1:6379"

[[routes]]
name = "x"
kind = "stream"
format = "k"
"#;
        assert!(ConfigFormat::Toml.parse(content).is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("relay.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("conf/RELAY.TOML")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("relay.json")).unwrap(),
            ConfigFormat::Json
        );

        let err = ConfigFormat::from_path(Path::new("relay.yaml")).unwrap_err();
        assert!(err.to_string().contains(".yaml"));
        assert!(ConfigFormat::from_path(Path::new("relay")).is_err());
    }
}
