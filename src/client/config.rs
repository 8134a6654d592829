//! Client configuration and the layered option store.
//!
//! [`ClientConfig`] carries the fixed settings a client is created with: base URL,
//! user agent and the built-in transport defaults. [`ConfigStore`] holds the
//! mutable, namespaced option bags consulted on every request build.
//!
//! # Configuration Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `base_url` | `""` | URI every request is resolved against |
//! | `user_agent` | `""` | Prepended to the default user agent |
//! | `connect_timeout_secs` | 30 | Built-in `connect_timeout` directive |
//! | `timeout_secs` | 30 | Built-in `timeout` directive |
//! | `max_redirects` | 20 | Built-in `max_redirects` directive |
//! | `enable_logging` | false | Log every built request at debug level |
//!
//! # Option Namespaces
//!
//! | Namespace | Holds |
//! |-----------|-------|
//! | `curl.options` | Transport directives applied to every request |
//! | `request.options.headers` | Default headers |
//! | `request.options.directives` | Client-wide request directives |
//!
//! # Examples
//!
//! ```
//! use gulp_http::client::{ClientConfig, ConfigStore};
//! use serde_json::json;
//!
//! let config = ClientConfig {
//!     base_url: "https://api.example.com/v1/".into(),
//!     timeout_secs: 10,
//!     ..Default::default()
//! };
//! assert_eq!(config.max_redirects, 20);
//!
//! let store = ConfigStore::new();
//! store.set("request.options.headers", "Accept", json!("application/json"));
//! assert_eq!(
//!     store.get("request.options.headers", "Accept"),
//!     Some(json!("application/json"))
//! );
//! ```

use crate::error::{GulpError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Prefix of the per-request option namespaces.
pub const REQUEST_OPTIONS: &str = "request.options.";

/// Namespace of transport directives applied to every request.
pub const CURL_OPTIONS: &str = "curl.options";

/// Bag of default headers under [`REQUEST_OPTIONS`].
pub const HEADERS_BAG: &str = "headers";

/// Bag of client-wide request directives under [`REQUEST_OPTIONS`].
pub const DIRECTIVES_BAG: &str = "directives";

/// Settings a client is created with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// URI every request is resolved against.
    pub base_url: String,

    /// Application user agent, prepended to the default one.
    pub user_agent: String,

    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Whole-transfer timeout in seconds.
    pub timeout_secs: u64,

    /// Maximum redirects followed.
    pub max_redirects: u32,

    /// Enable request logging.
    ///
    /// When enabled, every built request is logged at debug level with `tracing`.
    pub enable_logging: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: String::new(),
            user_agent: String::new(),
            connect_timeout_secs: 30,
            timeout_secs: 30,
            max_redirects: 20,
            enable_logging: false,
        }
    }
}

impl ClientConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// [`GulpError::Json`] if `json` is not a valid configuration object.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// An ordered key → value bag.
pub type Bag = Map<String, Value>;

/// An immutable view of every bag at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSnapshot {
    bags: BTreeMap<String, Bag>,
}

impl ConfigSnapshot {
    /// A namespace's bag, if it exists.
    pub fn bag(&self, namespace: &str) -> Option<&Bag> {
        self.bags.get(namespace)
    }

    /// A single value.
    pub fn get(&self, namespace: &str, key: &str) -> Option<&Value> {
        self.bags.get(namespace)?.get(key)
    }

    /// Namespaces present, sorted.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.bags.keys().map(String::as_str)
    }
}

/// Namespaced option bags shared by a client and its clones.
///
/// Writes are copy-on-write: a writer clones the current snapshot, modifies it and
/// swaps it in under the write lock. Readers only hold the lock long enough to clone
/// an `Arc`, so a request build always sees one consistent snapshot.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    current: Arc<RwLock<Arc<ConfigSnapshot>>>,
}

impl ConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a JSON object of `namespace → {key: value}`.
    ///
    /// # Errors
    ///
    /// [`GulpError::InvalidOption`] if the value or any namespace entry is not an object.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(namespaces) = value else {
            return Err(GulpError::InvalidOption(format!(
                "Config must be an object of option bags, got {}",
                value
            )));
        };

        let mut bags = BTreeMap::new();
        for (namespace, bag) in namespaces {
            match bag {
                Value::Object(bag) => {
                    bags.insert(namespace, bag);
                }
                other => {
                    return Err(GulpError::InvalidOption(format!(
                        "Option bag '{}' must be an object, got {}",
                        namespace, other
                    )))
                }
            }
        }

        Ok(ConfigStore {
            current: Arc::new(RwLock::new(Arc::new(ConfigSnapshot { bags }))),
        })
    }

    /// Map a bag name to its namespace.
    ///
    /// A name containing a dot is already a namespace (`curl.options`); a dot-free
    /// name lives under [`REQUEST_OPTIONS`].
    pub fn namespace_for(bag: &str) -> String {
        if bag.contains('.') {
            bag.to_string()
        } else {
            format!("{}{}", REQUEST_OPTIONS, bag)
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Set one value.
    pub fn set(&self, namespace: &str, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.update(|snapshot| {
            snapshot
                .bags
                .entry(namespace.to_string())
                .or_default()
                .insert(key, value);
        });
    }

    /// Set many values in one swap.
    pub fn set_many<I, K>(&self, namespace: &str, entries: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let entries: Vec<(String, Value)> =
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.update(|snapshot| {
            let bag = snapshot.bags.entry(namespace.to_string()).or_default();
            for (key, value) in entries {
                bag.insert(key, value);
            }
        });
    }

    /// Remove a value, returning it.
    pub fn remove(&self, namespace: &str, key: &str) -> Option<Value> {
        let mut removed = None;
        self.update(|snapshot| {
            if let Some(bag) = snapshot.bags.get_mut(namespace) {
                removed = bag.shift_remove(key);
            }
        });
        removed
    }

    /// Read one value from the current snapshot.
    pub fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        self.snapshot().get(namespace, key).cloned()
    }

    fn update(&self, apply: impl FnOnce(&mut ConfigSnapshot)) {
        let mut guard = self.current.write();
        let mut next = ConfigSnapshot::clone(&guard);
        apply(&mut next);
        *guard = Arc::new(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_from_json() {
        let config = ClientConfig::from_json(r#"{"base_url": "http://h/", "timeout_secs": 5}"#).unwrap();
        assert_eq!(config.base_url, "http://h/");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.max_redirects, 20);

        let err = ClientConfig::from_json(r#"{"timeout_secs": "soon"}"#).unwrap_err();
        assert!(matches!(err, GulpError::Json(_)));
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.connect_timeout_secs, 30);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_redirects, 20);
        assert!(!config.enable_logging);
        assert!(config.base_url.is_empty());
    }

    #[test]
    fn test_partial_override() {
        let config = ClientConfig {
            max_redirects: 3,
            ..Default::default()
        };
        assert_eq!(config.max_redirects, 3);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: ClientConfig =
            serde_json::from_value(json!({"base_url": "http://h/", "timeout_secs": 5})).unwrap();
        assert_eq!(config.base_url, "http://h/");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.max_redirects, 20);
    }

    #[test]
    fn test_namespace_for() {
        assert_eq!(ConfigStore::namespace_for("headers"), "request.options.headers");
        assert_eq!(ConfigStore::namespace_for("curl.options"), "curl.options");
    }

    #[test]
    fn test_snapshot_is_stable_across_writes() {
        let store = ConfigStore::new();
        store.set(CURL_OPTIONS, "timeout", json!(10));
        let before = store.snapshot();

        store.set(CURL_OPTIONS, "timeout", json!(99));

        assert_eq!(before.get(CURL_OPTIONS, "timeout"), Some(&json!(10)));
        assert_eq!(store.get(CURL_OPTIONS, "timeout"), Some(json!(99)));
    }

    #[test]
    fn test_clones_share_state() {
        let store = ConfigStore::new();
        let other = store.clone();
        other.set("request.options.headers", "Accept", json!("*/*"));
        assert_eq!(store.get("request.options.headers", "Accept"), Some(json!("*/*")));
    }

    #[test]
    fn test_set_many_and_remove() {
        let store = ConfigStore::new();
        store.set_many(
            "request.options.headers",
            [("A", json!("1")), ("B", json!("2"))],
        );
        let snapshot = store.snapshot();
        let keys: Vec<_> = snapshot
            .bag("request.options.headers")
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, vec!["A", "B"]);
        assert_eq!(store.remove("request.options.headers", "A"), Some(json!("1")));
        assert_eq!(store.get("request.options.headers", "A"), None);
    }

    #[test]
    fn test_from_value() {
        let store = ConfigStore::from_value(json!({
            "curl.options": {"timeout": 5},
            "request.options.headers": {"X-Api": "k"}
        }))
        .unwrap();
        assert_eq!(store.get(CURL_OPTIONS, "timeout"), Some(json!(5)));
        assert!(ConfigStore::from_value(json!(["nope"])).is_err());
        assert!(ConfigStore::from_value(json!({"curl.options": 1})).is_err());
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let store = ConfigStore::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        store.set_many(
                            CURL_OPTIONS,
                            [("a", json!(i * 100 + j)), ("b", json!(i * 100 + j))],
                        );
                        let snap = store.snapshot();
                        assert_eq!(snap.get(CURL_OPTIONS, "a"), snap.get(CURL_OPTIONS, "b"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
