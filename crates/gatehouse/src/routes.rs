//! Route lookup contract
//!
//! A route maps a short name (the `{target}` in `/proxy/{target}`) to one
//! backend base URL and the set of users allowed to reach it.

/// Answers authorization and resolution questions for named routes
pub trait RouteStore: Send + Sync {
    /// Whether `username` may use `route`
    ///
    /// Returns `false` for unknown routes.
    fn is_user_allowed(&self, route: &str, username: &str) -> bool;

    /// Backend base URL for `route`, exactly as configured
    fn resolve_destination(&self, route: &str) -> Option<String>;
}

impl<T: RouteStore + ?Sized> RouteStore for std::sync::Arc<T> {
    fn is_user_allowed(&self, route: &str, username: &str) -> bool {
        (**self).is_user_allowed(route, username)
    }

    fn resolve_destination(&self, route: &str) -> Option<String> {
        (**self).resolve_destination(route)
    }
}
