//! Transport directives: low-level transfer settings passed opaquely to a transport.
//!
//! A directive is addressed either by name (`"connect_timeout"`) or by a numeric
//! index. Indexes follow the libcurl option numbers, so configuration written for a
//! curl-based transport keeps its meaning. Unknown indexes and names are kept as
//! [`Directive::Raw`] and [`Directive::Custom`] and handed through untouched.
//!
//! # Known Directives
//!
//! | Directive | Index | Name | Default |
//! |-----------|-------|------|---------|
//! | `AutoReferer` | 58 | `auto_referer` | `true` |
//! | `FollowLocation` | 52 | `follow_location` | `true` |
//! | `ForbidReuse` | 75 | `forbid_reuse` | `false` |
//! | `MaxRedirects` | 68 | `max_redirects` | `20` |
//! | `Protocols` | 181 | `protocols` | `"http,https"` |
//! | `RedirectProtocols` | 182 | `redirect_protocols` | `"http,https"` |
//! | `ConnectTimeout` | 78 | `connect_timeout` | `30` (seconds) |
//! | `Timeout` | 13 | `timeout` | `30` (seconds) |
//! | `Encoding` | 10102 | `encoding` | `""` (any) |
//! | `UserAgent` | 10018 | `user_agent` | client user agent |
//! | `HttpAuth` | 107 | `http_auth` | |
//! | `UserPwd` | 10005 | `user_pwd` | |
//! | `Proxy` | 10004 | `proxy` | |
//! | `ProxyPort` | 59 | `proxy_port` | |
//! | `ProxyTunnel` | 61 | `proxy_tunnel` | |
//! | `ProxyUserPwd` | 10006 | `proxy_user_pwd` | |
//! | `SslVerifyPeer` | 64 | `ssl_verify_peer` | |
//! | `SslVerifyHost` | 81 | `ssl_verify_host` | |
//! | `CaInfo` | 10065 | `ca_info` | |
//! | `CaPath` | 10097 | `ca_path` | |
//! | `CookieJar` | 10082 | `cookie_jar` | |
//! | `CookieFile` | 10031 | `cookie_file` | |

use crate::client::config::ClientConfig;
use crate::error::{GulpError, Result};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A transport directive key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Directive {
    AutoReferer,
    FollowLocation,
    ForbidReuse,
    MaxRedirects,
    Protocols,
    RedirectProtocols,
    ConnectTimeout,
    Timeout,
    Encoding,
    UserAgent,
    HttpAuth,
    UserPwd,
    Proxy,
    ProxyPort,
    ProxyTunnel,
    ProxyUserPwd,
    SslVerifyPeer,
    SslVerifyHost,
    CaInfo,
    CaPath,
    CookieJar,
    CookieFile,
    /// An index with no known meaning.
    Raw(u32),
    /// A name with no known meaning.
    Custom(String),
}

const KNOWN: [Directive; 22] = [
    Directive::AutoReferer,
    Directive::FollowLocation,
    Directive::ForbidReuse,
    Directive::MaxRedirects,
    Directive::Protocols,
    Directive::RedirectProtocols,
    Directive::ConnectTimeout,
    Directive::Timeout,
    Directive::Encoding,
    Directive::UserAgent,
    Directive::HttpAuth,
    Directive::UserPwd,
    Directive::Proxy,
    Directive::ProxyPort,
    Directive::ProxyTunnel,
    Directive::ProxyUserPwd,
    Directive::SslVerifyPeer,
    Directive::SslVerifyHost,
    Directive::CaInfo,
    Directive::CaPath,
    Directive::CookieJar,
    Directive::CookieFile,
];

impl Directive {
    /// Numeric index, if the directive has one.
    pub fn index(&self) -> Option<u32> {
        let idx = match self {
            Directive::AutoReferer => 58,
            Directive::FollowLocation => 52,
            Directive::ForbidReuse => 75,
            Directive::MaxRedirects => 68,
            Directive::Protocols => 181,
            Directive::RedirectProtocols => 182,
            Directive::ConnectTimeout => 78,
            Directive::Timeout => 13,
            Directive::Encoding => 10102,
            Directive::UserAgent => 10018,
            Directive::HttpAuth => 107,
            Directive::UserPwd => 10005,
            Directive::Proxy => 10004,
            Directive::ProxyPort => 59,
            Directive::ProxyTunnel => 61,
            Directive::ProxyUserPwd => 10006,
            Directive::SslVerifyPeer => 64,
            Directive::SslVerifyHost => 81,
            Directive::CaInfo => 10065,
            Directive::CaPath => 10097,
            Directive::CookieJar => 10082,
            Directive::CookieFile => 10031,
            Directive::Raw(idx) => *idx,
            Directive::Custom(_) => return None,
        };
        Some(idx)
    }

    /// Name, if the directive has one.
    pub fn name(&self) -> Option<&str> {
        let name = match self {
            Directive::AutoReferer => "auto_referer",
            Directive::FollowLocation => "follow_location",
            Directive::ForbidReuse => "forbid_reuse",
            Directive::MaxRedirects => "max_redirects",
            Directive::Protocols => "protocols",
            Directive::RedirectProtocols => "redirect_protocols",
            Directive::ConnectTimeout => "connect_timeout",
            Directive::Timeout => "timeout",
            Directive::Encoding => "encoding",
            Directive::UserAgent => "user_agent",
            Directive::HttpAuth => "http_auth",
            Directive::UserPwd => "user_pwd",
            Directive::Proxy => "proxy",
            Directive::ProxyPort => "proxy_port",
            Directive::ProxyTunnel => "proxy_tunnel",
            Directive::ProxyUserPwd => "proxy_user_pwd",
            Directive::SslVerifyPeer => "ssl_verify_peer",
            Directive::SslVerifyHost => "ssl_verify_host",
            Directive::CaInfo => "ca_info",
            Directive::CaPath => "ca_path",
            Directive::CookieJar => "cookie_jar",
            Directive::CookieFile => "cookie_file",
            Directive::Raw(_) => return None,
            Directive::Custom(name) => name,
        };
        Some(name)
    }

    /// Map an index to a known directive, or [`Directive::Raw`].
    pub fn from_index(idx: u32) -> Self {
        KNOWN
            .into_iter()
            .find(|d| d.index() == Some(idx))
            .unwrap_or(Directive::Raw(idx))
    }

    /// Map a name to a known directive, or [`Directive::Custom`].
    ///
    /// Names are matched case-insensitively.
    pub fn from_name(name: &str) -> Self {
        KNOWN
            .into_iter()
            .find(|d| d.name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
            .unwrap_or_else(|| Directive::Custom(name.to_string()))
    }

    /// Whether this is one of the known directives.
    pub fn is_known(&self) -> bool {
        !matches!(self, Directive::Raw(_) | Directive::Custom(_))
    }
}

impl FromStr for Directive {
    type Err = GulpError;

    /// Parse a configuration key: digits are an index, anything else a name.
    ///
    /// Empty keys and negative or overflowing indexes are rejected.
    fn from_str(key: &str) -> Result<Self> {
        let key = key.trim();
        if key.is_empty() {
            return Err(GulpError::InvalidOption("Empty directive key".into()));
        }

        let numeric = key.strip_prefix('-').unwrap_or(key);
        if numeric.bytes().all(|b| b.is_ascii_digit()) {
            if key.starts_with('-') {
                return Err(GulpError::InvalidOption(format!(
                    "Directive index must be non-negative, got {}",
                    key
                )));
            }
            let idx = key.parse::<u32>().map_err(|_| {
                GulpError::InvalidOption(format!("Directive index out of range: {}", key))
            })?;
            return Ok(Directive::from_index(idx));
        }

        Ok(Directive::from_name(key))
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name(), self.index()) {
            (Some(name), _) => f.write_str(name),
            (None, Some(idx)) => write!(f, "#{}", idx),
            (None, None) => f.write_str("?"),
        }
    }
}

/// HTTP authentication schemes for [`Directive::HttpAuth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
    /// `Basic`
    Basic,
    /// `Digest`
    Digest,
    /// `Negotiate` (GSS-API)
    Negotiate,
    /// `NTLM`
    Ntlm,
    /// Let the transport pick any scheme the server offers.
    #[default]
    Any,
    /// Any scheme except `Basic`.
    AnySafe,
}

impl AuthScheme {
    /// Directive value for this scheme.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthScheme::Basic => "basic",
            AuthScheme::Digest => "digest",
            AuthScheme::Negotiate => "negotiate",
            AuthScheme::Ntlm => "ntlm",
            AuthScheme::Any => "any",
            AuthScheme::AnySafe => "anysafe",
        }
    }
}

impl FromStr for AuthScheme {
    type Err = GulpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(AuthScheme::Basic),
            "digest" => Ok(AuthScheme::Digest),
            "negotiate" | "gssnegotiate" => Ok(AuthScheme::Negotiate),
            "ntlm" => Ok(AuthScheme::Ntlm),
            "any" => Ok(AuthScheme::Any),
            "anysafe" => Ok(AuthScheme::AnySafe),
            other => Err(GulpError::InvalidOption(format!(
                "Unknown auth scheme: {}",
                other
            ))),
        }
    }
}

/// Ordered directive → value mapping. Writing an existing directive overrides it in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectiveSet {
    entries: Vec<(Directive, Value)>,
}

impl DirectiveSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in defaults, the lowest-precedence layer.
    pub fn defaults(config: &ClientConfig, user_agent: &str) -> Self {
        let mut set = DirectiveSet::new();
        set.set(Directive::AutoReferer, true)
            .set(Directive::FollowLocation, true)
            .set(Directive::ForbidReuse, false)
            .set(Directive::MaxRedirects, config.max_redirects)
            .set(Directive::Protocols, "http,https")
            .set(Directive::RedirectProtocols, "http,https")
            .set(Directive::ConnectTimeout, config.connect_timeout_secs)
            .set(Directive::Timeout, config.timeout_secs)
            .set(Directive::Encoding, "");
        if !user_agent.is_empty() {
            set.set(Directive::UserAgent, user_agent);
        }
        set
    }

    /// Set a directive.
    pub fn set(&mut self, directive: Directive, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        match self.entries.iter_mut().find(|(d, _)| *d == directive) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((directive, value)),
        }
        self
    }

    /// Set a directive from an untyped configuration entry.
    ///
    /// # Errors
    ///
    /// [`GulpError::InvalidOption`] for a malformed key or a non-scalar value.
    pub fn set_raw(&mut self, key: &str, value: &Value) -> Result<&mut Self> {
        let directive: Directive = key.parse()?;
        if value.is_object() || value.is_array() {
            return Err(GulpError::InvalidOption(format!(
                "Directive '{}' must be a scalar, got {}",
                directive, value
            )));
        }
        Ok(self.set(directive, value.clone()))
    }

    /// Remove a directive.
    pub fn remove(&mut self, directive: &Directive) -> Option<Value> {
        let idx = self.entries.iter().position(|(d, _)| d == directive)?;
        Some(self.entries.remove(idx).1)
    }

    /// Overlay `other` key by key.
    pub fn merge(&mut self, other: &DirectiveSet) -> &mut Self {
        for (directive, value) in &other.entries {
            self.set(directive.clone(), value.clone());
        }
        self
    }

    /// Raw value.
    pub fn get(&self, directive: &Directive) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(d, _)| d == directive)
            .map(|(_, v)| v)
    }

    /// Value as a boolean; numbers are truthy when non-zero.
    pub fn get_bool(&self, directive: &Directive) -> Option<bool> {
        match self.get(directive)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_f64().map(|f| f != 0.0),
            Value::String(s) => match s.as_str() {
                "1" | "true" => Some(true),
                "0" | "false" | "" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Value as an unsigned integer; numeric strings are accepted.
    pub fn get_u64(&self, directive: &Directive) -> Option<u64> {
        match self.get(directive)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Value as a string; `null` reads as absent.
    pub fn get_str(&self, directive: &Directive) -> Option<&str> {
        self.get(directive)?.as_str()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Directive, &Value)> {
        self.entries.iter().map(|(d, v)| (d, v))
    }

    /// Number of directives.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as a JSON object keyed by directive display name.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(d, v)| (d.to_string(), v.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_index_and_name_round_trip() {
        for directive in KNOWN {
            let idx = directive.index().unwrap();
            assert_eq!(Directive::from_index(idx), directive);
            let name = directive.name().unwrap();
            assert_eq!(Directive::from_name(name), directive);
        }
    }

    #[test]
    fn test_unknown_directives_pass_through() {
        assert_eq!(Directive::from_index(99999), Directive::Raw(99999));
        assert_eq!(
            Directive::from_name("tcp_nodelay"),
            Directive::Custom("tcp_nodelay".into())
        );
        assert!(!Directive::Raw(1).is_known());
    }

    #[test]
    fn test_parse_keys() {
        assert_eq!("13".parse::<Directive>().unwrap(), Directive::Timeout);
        assert_eq!("Timeout".parse::<Directive>().unwrap(), Directive::Timeout);
        assert!(matches!("".parse::<Directive>(), Err(GulpError::InvalidOption(_))));
        assert!(matches!("-5".parse::<Directive>(), Err(GulpError::InvalidOption(_))));
        assert!(matches!(
            "99999999999".parse::<Directive>(),
            Err(GulpError::InvalidOption(_))
        ));
    }

    #[test]
    fn test_set_raw_rejects_non_scalar() {
        let mut set = DirectiveSet::new();
        assert!(set.set_raw("timeout", &json!(5)).is_ok());
        assert!(matches!(
            set.set_raw("proxy", &json!({"host": "x"})),
            Err(GulpError::InvalidOption(_))
        ));
        assert_eq!(set.get_u64(&Directive::Timeout), Some(5));
    }

    #[test]
    fn test_defaults() {
        let set = DirectiveSet::defaults(&ClientConfig::default(), "ua/1");
        assert_eq!(set.get_u64(&Directive::MaxRedirects), Some(20));
        assert_eq!(set.get_u64(&Directive::ConnectTimeout), Some(30));
        assert_eq!(set.get_bool(&Directive::FollowLocation), Some(true));
        assert_eq!(set.get_str(&Directive::Protocols), Some("http,https"));
        assert_eq!(set.get_str(&Directive::UserAgent), Some("ua/1"));
    }

    #[test]
    fn test_merge_overrides_key_by_key() {
        let mut base = DirectiveSet::new();
        base.set(Directive::Timeout, 30).set(Directive::MaxRedirects, 20);
        let mut over = DirectiveSet::new();
        over.set(Directive::Timeout, 5);
        base.merge(&over);
        assert_eq!(base.get_u64(&Directive::Timeout), Some(5));
        assert_eq!(base.get_u64(&Directive::MaxRedirects), Some(20));
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn test_auth_scheme_parse() {
        assert_eq!("NTLM".parse::<AuthScheme>().unwrap(), AuthScheme::Ntlm);
        assert!("kerberos5".parse::<AuthScheme>().is_err());
    }
}
