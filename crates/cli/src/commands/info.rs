//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{RelayBlueprint, RouteKind};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    store: StoreInfo,
    consumer: ConsumerInfo,
    source: String,
    flush: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_limit: Option<RateLimitInfo>,
    route_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    routes: Vec<RouteInfo>,
}

#[derive(Serialize)]
struct StoreInfo {
    url: String,
    connect_timeout_ms: u64,
}

#[derive(Serialize)]
struct ConsumerInfo {
    concurrency: usize,
    max_attempts: u16,
    requeue_delay_ms: u64,
    queue_capacity: usize,
}

#[derive(Serialize)]
struct RateLimitInfo {
    rate: u32,
    size: usize,
    key: String,
}

#[derive(Serialize)]
struct RouteInfo {
    name: String,
    kind: String,
    format: String,
    /// Dotted paths the format reads from each message
    fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<i64>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn describe_flush(blueprint: &RelayBlueprint) -> String {
    match blueprint.dispatch.flush_interval_ms {
        0 => "per message".to_string(),
        ms => format!("batched every {ms}ms"),
    }
}

fn describe_source(blueprint: &RelayBlueprint) -> String {
    match &blueprint.source.path {
        Some(path) => format!("{:?} ({})", blueprint.source.kind, path.display()),
        None => format!("{:?}", blueprint.source.kind),
    }
}

fn route_fields(format: &str) -> Vec<String> {
    template::Template::compile(format)
        .map(|t| t.paths().map(str::to_string).collect())
        .unwrap_or_default()
}

fn build_config_info(blueprint: &RelayBlueprint, args: &InfoArgs) -> ConfigInfo {
    let routes = if args.routes {
        blueprint
            .routes
            .iter()
            .map(|r| RouteInfo {
                name: r.name.clone(),
                kind: format!("{:?}", r.kind),
                format: r.format.clone(),
                fields: route_fields(&r.format),
                size: r.size,
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        store: StoreInfo {
            url: blueprint.store.url.clone(),
            connect_timeout_ms: blueprint.store.connect_timeout_ms,
        },
        consumer: ConsumerInfo {
            concurrency: blueprint.consumer.concurrency,
            max_attempts: blueprint.consumer.max_attempts,
            requeue_delay_ms: blueprint.consumer.requeue_delay_ms,
            queue_capacity: blueprint.consumer.queue_capacity,
        },
        source: describe_source(blueprint),
        flush: describe_flush(blueprint),
        rate_limit: blueprint.rate_limit.as_ref().map(|rl| RateLimitInfo {
            rate: rl.rate,
            size: rl.size,
            key: rl.key.clone(),
        }),
        route_count: blueprint.routes.len(),
        routes,
    }
}

fn print_config_info(blueprint: &RelayBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 Redis Relay Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🗄  Store");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ URL: {}", blueprint.store.url);
    println!("   └─ Connect timeout: {}ms", blueprint.store.connect_timeout_ms);

    let c = &blueprint.consumer;
    println!("\n📥 Consumer");
    println!("   ├─ Source: {}", describe_source(blueprint));
    println!("   ├─ Concurrency: {}", c.concurrency);
    println!("   ├─ Max attempts: {}", c.max_attempts);
    println!("   └─ Requeue delay: {}ms", c.requeue_delay_ms);

    println!("\n⚙️  Dispatch");
    println!("   ├─ Flush: {}", describe_flush(blueprint));
    match &blueprint.rate_limit {
        Some(rl) => println!(
            "   └─ Rate limit: {}/s per '{}' ({} keys max)",
            rl.rate, rl.key, rl.size
        ),
        None => println!("   └─ Rate limit: disabled"),
    }

    println!("\n📤 Routes ({})", blueprint.routes.len());
    for (i, route) in blueprint.routes.iter().enumerate() {
        let is_last = i == blueprint.routes.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!("   {} {} ({:?})", prefix, route.name, route.kind);

        if args.routes {
            println!("   {}  ├─ Format: {}", child_prefix, route.format);
            if let (RouteKind::List, Some(size)) = (route.kind, route.size) {
                println!("   {}  ├─ Keeps last: {}", child_prefix, size);
            }
            println!(
                "   {}  └─ Fields: {:?}",
                child_prefix,
                route_fields(&route.format)
            );
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_fields() {
        assert_eq!(route_fields("events:{projectId}:{user.id}"), ["projectId", "user.id"]);
        assert!(route_fields("static").is_empty());
    }

    #[test]
    fn test_config_info_lists_routes_on_request() {
        let blueprint = config_loader::ConfigLoader::load_from_str(
            r#"
[store]
url = "redis://127.0.0.1:6379"

[dispatch]
flush_interval_ms = 25

[[routes]]
name = "recent"
kind = "list"
format = "recent:{projectId}"
size = 10
"#,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let mut args = InfoArgs {
            config: "relay.toml".into(),
            json: true,
            routes: false,
        };
        let info = build_config_info(&blueprint, &args);
        assert_eq!(info.route_count, 1);
        assert!(info.routes.is_empty());
        assert_eq!(info.flush, "batched every 25ms");

        args.routes = true;
        let info = build_config_info(&blueprint, &args);
        assert_eq!(info.routes[0].fields, ["projectId"]);
        assert_eq!(info.routes[0].size, Some(10));
    }
}
