//! 配置校验模块
//!
//! 校验规则：
//! - 字段级约束 (`validator` derive：url 非空、计数 > 0、flush_interval_ms >= 0)
//! - route name 唯一
//! - route format 可编译
//! - list route 的 size > 0
//! - source.kind = "file" 时 path 必填

use std::collections::HashSet;

use contracts::{ContractError, RelayBlueprint, RouteKind, SourceKind};
use template::Template;
use validator::Validate;

/// 校验 RelayBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|e| ContractError::config_validation("blueprint", e.to_string()))?;
    validate_route_names(blueprint)?;
    validate_route_formats(blueprint)?;
    validate_list_sizes(blueprint)?;
    validate_source(blueprint)?;
    Ok(())
}

/// 不阻止启动、但值得提示的配置问题
pub fn warnings(blueprint: &RelayBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.routes.is_empty() {
        warnings.push("no routes configured: every message will be acked and dropped".to_string());
    }

    if let Some(rl) = &blueprint.rate_limit {
        let referenced = blueprint.routes.iter().any(|r| {
            Template::compile(&r.format)
                .map(|t| t.paths().any(|p| p == rl.key))
                .unwrap_or(false)
        });
        if !referenced && !blueprint.routes.is_empty() {
            warnings.push(format!(
                "rate_limit.key '{}' is not referenced by any route format",
                rl.key
            ));
        }
    }

    if blueprint.dispatch.flush_interval_ms > 0 && blueprint.consumer.concurrency > 1 {
        warnings.push(format!(
            "batched flushing serializes all {} workers on one connection",
            blueprint.consumer.concurrency
        ));
    }

    warnings
}

/// 校验 route name 唯一性
fn validate_route_names(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for route in &blueprint.routes {
        if !seen.insert(route.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("routes[name={}]", route.name),
                "duplicate route name",
            ));
        }
    }
    Ok(())
}

/// 校验 route format 可编译
fn validate_route_formats(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    for route in &blueprint.routes {
        Template::compile(&route.format).map_err(|e| {
            ContractError::config_validation(format!("routes[{}].format", route.name), e.to_string())
        })?;
    }
    Ok(())
}

/// 校验 list route 的 size
fn validate_list_sizes(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    for route in blueprint.routes.iter().filter(|r| r.kind == RouteKind::List) {
        match route.size {
            Some(size) if size > 0 && size <= i64::from(u32::MAX) => {}
            Some(size) => {
                return Err(ContractError::config_validation(
                    format!("routes[{}].size", route.name),
                    format!("size must be in 1..={}, got {size}", u32::MAX),
                ));
            }
            None => {
                return Err(ContractError::config_validation(
                    format!("routes[{}].size", route.name),
                    "list routes require a size",
                ));
            }
        }
    }
    Ok(())
}

/// 校验消息源
fn validate_source(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    if blueprint.source.kind == SourceKind::File && blueprint.source.path.is_none() {
        return Err(ContractError::config_validation(
            "source.path",
            "path is required when kind = \"file\"",
        ));
    }
    Ok(())
}
