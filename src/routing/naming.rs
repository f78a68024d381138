//! # Naming Convention Resolver
//!
//! Maps a method name such as `GetDetail` to an HTTP verb and a sub-path (`GET` + `detail`)
//! using an ordered prefix table and a caller-replaceable naming rule.
//!
//! Tie-break: when several configured prefixes match, the longest one wins. Entries with an
//! identical prefix are resolved by table order (first configured wins); such tables are
//! considered ambiguous and are reported by [`NamingResolver::ambiguous_prefixes`].

use axum::http::Method;
use axum::routing::MethodFilter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::core::error::RouterError;

/// HTTP verbs a route can be registered under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Verb {
    pub const ALL: [Verb; 7] = [
        Verb::Get,
        Verb::Post,
        Verb::Put,
        Verb::Delete,
        Verb::Patch,
        Verb::Head,
        Verb::Options,
    ];

    /// Upper-case wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
            Verb::Patch => "PATCH",
            Verb::Head => "HEAD",
            Verb::Options => "OPTIONS",
        }
    }

    /// Lower-case name, as used for document keys
    pub fn lowercase(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Post => "post",
            Verb::Put => "put",
            Verb::Delete => "delete",
            Verb::Patch => "patch",
            Verb::Head => "head",
            Verb::Options => "options",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
            Verb::Put => Method::PUT,
            Verb::Delete => Method::DELETE,
            Verb::Patch => Method::PATCH,
            Verb::Head => Method::HEAD,
            Verb::Options => Method::OPTIONS,
        }
    }

    pub fn method_filter(&self) -> MethodFilter {
        match self {
            Verb::Get => MethodFilter::GET,
            Verb::Post => MethodFilter::POST,
            Verb::Put => MethodFilter::PUT,
            Verb::Delete => MethodFilter::DELETE,
            Verb::Patch => MethodFilter::PATCH,
            Verb::Head => MethodFilter::HEAD,
            Verb::Options => MethodFilter::OPTIONS,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Verb::Get),
            "POST" => Ok(Verb::Post),
            "PUT" => Ok(Verb::Put),
            "DELETE" => Ok(Verb::Delete),
            "PATCH" => Ok(Verb::Patch),
            "HEAD" => Ok(Verb::Head),
            "OPTIONS" | "OPTION" => Ok(Verb::Options),
            other => Err(RouterError::config(format!("unsupported HTTP verb: {}", other))),
        }
    }
}

/// One entry of the prefix table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpMethodPrefix {
    pub prefix: String,
    pub verb: Verb,
}

impl HttpMethodPrefix {
    pub fn new(prefix: impl Into<String>, verb: Verb) -> Self {
        Self {
            prefix: prefix.into(),
            verb,
        }
    }
}

/// The default prefix table: `Get`, `Post`, `Put`, `Delete`, `Patch`, `Head`, `Option`
pub fn default_prefixes() -> Vec<HttpMethodPrefix> {
    vec![
        HttpMethodPrefix::new("Get", Verb::Get),
        HttpMethodPrefix::new("Post", Verb::Post),
        HttpMethodPrefix::new("Put", Verb::Put),
        HttpMethodPrefix::new("Delete", Verb::Delete),
        HttpMethodPrefix::new("Patch", Verb::Patch),
        HttpMethodPrefix::new("Head", Verb::Head),
        HttpMethodPrefix::new("Option", Verb::Options),
    ]
}

/// Turns a name fragment into a path segment
pub type NamingRule = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Lower-case the first character only: `DetailInfo` -> `detailInfo`
pub fn lower_camel(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

pub fn default_naming_rule() -> NamingRule {
    Arc::new(lower_camel)
}

/// Verb and sub-path derived from a method name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub verb: Verb,
    pub sub_path: String,
}

/// Resolves method names against a prefix table
#[derive(Clone)]
pub struct NamingResolver {
    prefixes: Vec<HttpMethodPrefix>,
    naming_rule: NamingRule,
    default_verb: Option<Verb>,
}

impl NamingResolver {
    pub fn new(prefixes: Vec<HttpMethodPrefix>, naming_rule: NamingRule) -> Self {
        Self {
            prefixes,
            naming_rule,
            default_verb: None,
        }
    }

    /// Route method names that match no prefix under `verb` instead of skipping them
    pub fn with_default_verb(mut self, verb: Option<Verb>) -> Self {
        self.default_verb = verb;
        self
    }

    pub fn prefixes(&self) -> &[HttpMethodPrefix] {
        &self.prefixes
    }

    /// Apply the naming rule to a fragment
    pub fn apply(&self, name: &str) -> String {
        (self.naming_rule)(name)
    }

    /// Resolve a method name to a verb and sub-path
    ///
    /// # Example
    /// ```rust
    /// use ctrl_router::routing::naming::{NamingResolver, Verb};
    ///
    /// let resolver = NamingResolver::default();
    /// let route = resolver.resolve("GetDetail").unwrap();
    /// assert_eq!(route.verb, Verb::Get);
    /// assert_eq!(route.sub_path, "detail");
    /// assert!(resolver.resolve("Ping").is_none());
    /// ```
    pub fn resolve(&self, method_name: &str) -> Option<ResolvedRoute> {
        let matched = self
            .prefixes
            .iter()
            .filter(|entry| !entry.prefix.is_empty() && method_name.starts_with(&entry.prefix))
            .fold(None::<&HttpMethodPrefix>, |best, entry| match best {
                Some(current) if current.prefix.len() >= entry.prefix.len() => Some(current),
                _ => Some(entry),
            });

        match matched {
            Some(entry) => {
                let remainder = &method_name[entry.prefix.len()..];
                let sub_path = if remainder.is_empty() {
                    self.apply(method_name)
                } else {
                    self.apply(remainder)
                };
                Some(ResolvedRoute {
                    verb: entry.verb,
                    sub_path,
                })
            }
            None => self.default_verb.map(|verb| ResolvedRoute {
                verb,
                sub_path: self.apply(method_name),
            }),
        }
    }

    /// Prefixes configured more than once; their resolution depends on table order
    pub fn ambiguous_prefixes(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        let mut ambiguous = Vec::new();
        for entry in &self.prefixes {
            if !seen.insert(entry.prefix.as_str()) && !ambiguous.contains(&entry.prefix.as_str()) {
                ambiguous.push(entry.prefix.as_str());
            }
        }
        ambiguous
    }
}

impl Default for NamingResolver {
    fn default() -> Self {
        Self::new(default_prefixes(), default_naming_rule())
    }
}

impl fmt::Debug for NamingResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamingResolver")
            .field("prefixes", &self.prefixes)
            .field("default_verb", &self.default_verb)
            .finish()
    }
}
