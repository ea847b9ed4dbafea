/// String key/value store.
///
/// Two instances back the tracker: a volatile tab-scoped store (cleared
/// when the tab closes) and a durable origin-scoped store shared across
/// tabs. Methods take `&self`; implementations use interior mutability.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Expiring cookie store holding the persistent authenticated session.
pub trait CookieStore {
    fn get(&self, name: &str) -> Option<String>;
    /// Sets `name` to `value`, expiring `expires_days` days from now.
    fn set(&self, name: &str, value: &str, expires_days: i64);
    fn remove(&self, name: &str);
}
