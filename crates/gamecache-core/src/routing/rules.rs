//! URL predicates used by the route table.

use serde::{Deserialize, Serialize};
use url::Url;

/// A predicate over the request URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteRule {
    /// Same origin and the path is exactly one of `paths`.
    SameOriginPath { paths: Vec<String> },
    /// Same origin, path under `prefix` and ending in `extension`.
    SameOriginMedia { prefix: String, extension: String },
    /// Path under `prefix`, any origin.
    PathPrefix { prefix: String },
    /// The full URL contains one of `patterns`.
    UrlContains { patterns: Vec<String> },
    /// The hostname contains one of `patterns`.
    HostContains { patterns: Vec<String> },
    /// Cross-origin http(s) URL whose host is not in `excluded_hosts`.
    CrossOrigin { excluded_hosts: Vec<String> },
}

impl RouteRule {
    /// Evaluate the rule for `url` with the portal served from `origin`.
    pub fn matches(&self, url: &Url, origin: &Url) -> bool {
        match self {
            RouteRule::SameOriginPath { paths } => {
                is_same_origin(url, origin) && paths.iter().any(|p| p == url.path())
            }
            RouteRule::SameOriginMedia { prefix, extension } => {
                is_same_origin(url, origin)
                    && url.path().starts_with(prefix.as_str())
                    && url.path().ends_with(extension.as_str())
            }
            RouteRule::PathPrefix { prefix } => url.path().starts_with(prefix.as_str()),
            RouteRule::UrlContains { patterns } => {
                patterns.iter().any(|p| url.as_str().contains(p.as_str()))
            }
            RouteRule::HostContains { patterns } => url
                .host_str()
                .map(|host| patterns.iter().any(|p| host.contains(p.as_str())))
                .unwrap_or(false),
            RouteRule::CrossOrigin { excluded_hosts } => {
                is_http(url)
                    && !is_same_origin(url, origin)
                    && !url
                        .host_str()
                        .map(|host| excluded_hosts.iter().any(|h| h == host))
                        .unwrap_or(false)
            }
        }
    }
}

pub fn is_same_origin(url: &Url, origin: &Url) -> bool {
    url.origin() == origin.origin()
}

fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://portal.test/").unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_same_origin_path_is_exact() {
        let rule = RouteRule::SameOriginPath {
            paths: vec!["/api/games".into()],
        };
        assert!(rule.matches(&url("https://portal.test/api/games"), &origin()));
        assert!(rule.matches(&url("https://portal.test/api/games?page=2"), &origin()));
        assert!(!rule.matches(&url("https://portal.test/api/games/1"), &origin()));
        assert!(!rule.matches(&url("https://other.test/api/games"), &origin()));
        assert!(!rule.matches(&url("http://portal.test/api/games"), &origin()));
    }

    #[test]
    fn test_media_rule() {
        let rule = RouteRule::SameOriginMedia {
            prefix: "/media/".into(),
            extension: ".webp".into(),
        };
        assert!(rule.matches(&url("https://portal.test/media/covers/a.webp"), &origin()));
        assert!(!rule.matches(&url("https://portal.test/media/a.png"), &origin()));
        assert!(!rule.matches(&url("https://cdn.test/media/a.webp"), &origin()));
    }

    #[test]
    fn test_url_contains_checks_whole_url() {
        let rule = RouteRule::UrlContains {
            patterns: vec!["ruffle".into()],
        };
        assert!(rule.matches(&url("https://unpkg.com/@ruffle-rs/ruffle/ruffle.js"), &origin()));
        assert!(rule.matches(&url("https://cdn.test/x.js?player=ruffle"), &origin()));
        assert!(!rule.matches(&url("https://cdn.test/x.js"), &origin()));
    }

    #[test]
    fn test_host_contains() {
        let rule = RouteRule::HostContains {
            patterns: vec!["github.io".into()],
        };
        assert!(rule.matches(&url("https://someone.github.io/game/"), &origin()));
        assert!(!rule.matches(&url("https://cdn.test/github.io/"), &origin()));
    }

    #[test]
    fn test_cross_origin_excludes_fonts_and_non_http() {
        let rule = RouteRule::CrossOrigin {
            excluded_hosts: vec!["fonts.gstatic.com".into()],
        };
        assert!(rule.matches(&url("https://cdn.test/game.js"), &origin()));
        assert!(!rule.matches(&url("https://portal.test/game.js"), &origin()));
        assert!(!rule.matches(&url("https://fonts.gstatic.com/s/a.woff2"), &origin()));
        assert!(!rule.matches(&url("chrome-extension://abcdef/inject.js"), &origin()));
    }
}
