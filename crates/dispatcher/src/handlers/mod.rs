//! Routing handlers built from `[[routes]]`

mod list;
mod publish;

use std::num::NonZeroU32;

pub use list::ListHandler;
pub use publish::PublishHandler;

use contracts::{Handler, RouteConfig, RouteKind};
use template::Template;

use crate::error::DispatcherError;

/// Build the handler for one configured route
///
/// Compiles the route's format string; an unterminated reference or a
/// list route without a positive size is rejected here, never per message.
pub fn from_route(route: &RouteConfig) -> Result<Box<dyn Handler>, DispatcherError> {
    let template = Template::compile(&route.format)
        .map_err(|e| DispatcherError::handler_creation(&route.name, e.to_string()))?;

    match route.kind {
        RouteKind::Publish => Ok(Box::new(PublishHandler::new(&route.name, template))),
        RouteKind::List => {
            let size = route.size.ok_or_else(|| {
                DispatcherError::handler_creation(&route.name, "list route requires `size`")
            })?;
            let size = u32::try_from(size)
                .ok()
                .and_then(NonZeroU32::new)
                .ok_or_else(|| {
                    DispatcherError::handler_creation(
                        &route.name,
                        format!("list size must be in 1..={}, got {size}", u32::MAX),
                    )
                })?;
            Ok(Box::new(ListHandler::new(&route.name, template, size)))
        }
    }
}

/// Build handlers for every route, preserving configuration order
pub fn from_routes(routes: &[RouteConfig]) -> Result<Vec<Box<dyn Handler>>, DispatcherError> {
    routes.iter().map(from_route).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(kind: RouteKind, format: &str, size: Option<i64>) -> RouteConfig {
        RouteConfig {
            name: "r".to_string(),
            kind,
            format: format.to_string(),
            size,
        }
    }

    #[test]
    fn test_from_route_builds_both_kinds() {
        let publish = from_route(&route(RouteKind::Publish, "chan:{id}", None)).unwrap();
        assert_eq!(publish.name(), "r");

        let list = from_route(&route(RouteKind::List, "list:{id}", Some(10))).unwrap();
        assert_eq!(list.name(), "r");
    }

    #[test]
    fn test_unterminated_format_is_rejected() {
        let err = from_route(&route(RouteKind::Publish, "chan:{id", None)).err().unwrap();
        assert!(matches!(err, DispatcherError::HandlerCreation { .. }));
    }

    #[test]
    fn test_list_route_needs_positive_size() {
        assert!(from_route(&route(RouteKind::List, "k", None)).is_err());
        assert!(from_route(&route(RouteKind::List, "k", Some(0))).is_err());
        assert!(from_route(&route(RouteKind::List, "k", Some(-5))).is_err());
        assert!(from_route(&route(RouteKind::List, "k", Some(i64::MIN))).is_err());
        assert!(from_route(&route(RouteKind::List, "k", Some(i64::from(u32::MAX) + 1))).is_err());
    }

    #[test]
    fn test_from_routes_keeps_order() {
        let mut a = route(RouteKind::Publish, "a", None);
        a.name = "a".into();
        let mut b = route(RouteKind::List, "b", Some(1));
        b.name = "b".into();

        let handlers = from_routes(&[a, b]).unwrap();
        let names: Vec<_> = handlers.iter().map(|h| h.name()).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
