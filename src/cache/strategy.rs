//! Strategy Selector Module
//!
//! Pure classification of requests and responses. No I/O.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache::{Request, Response, ResponseType};
use crate::error::OfflineError;

/// Extensions of static assets served cache-first.
pub const STATIC_ASSET_EXTENSIONS: &[&str] = &[
    "js", "css", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "woff", "woff2", "ttf",
];

/// Path segments marking API traffic served network-first.
pub const NETWORK_FIRST_SEGMENTS: &[&str] = &["api", "sync"];

// == Asset Match Mode ==
/// How asset extensions are matched against a URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetMatch {
    /// Extension of the last path segment, query and fragment ignored
    #[default]
    Suffix,
    /// `.ext` anywhere in the URL; `/data.json` matches `.js`
    Substring,
}

impl FromStr for AssetMatch {
    type Err = OfflineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "suffix" => Ok(AssetMatch::Suffix),
            "substring" => Ok(AssetMatch::Substring),
            other => Err(OfflineError::InvalidRequest(format!(
                "unknown asset match mode '{}'",
                other
            ))),
        }
    }
}

// == Strategy ==
/// How the fetch handler treats a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    PassThrough,
}

/// Returns true if the request targets a static asset.
pub fn is_cache_first_candidate(request: &Request, mode: AssetMatch) -> bool {
    match mode {
        AssetMatch::Suffix => {
            let last_segment = request
                .url
                .path_segments()
                .and_then(|segments| segments.last())
                .unwrap_or_default();
            last_segment
                .rsplit_once('.')
                .is_some_and(|(_, ext)| STATIC_ASSET_EXTENSIONS.contains(&ext))
        }
        AssetMatch::Substring => {
            let url = request.url.as_str();
            STATIC_ASSET_EXTENSIONS
                .iter()
                .any(|ext| url.contains(&format!(".{}", ext)))
        }
    }
}

/// Returns true if a path segment of the request marks API or sync traffic.
pub fn is_network_first_candidate(request: &Request) -> bool {
    request
        .url
        .path_segments()
        .is_some_and(|mut segments| segments.any(|s| NETWORK_FIRST_SEGMENTS.contains(&s)))
}

/// Cache key of a request: method and full URL.
pub fn cache_key(request: &Request) -> String {
    format!("{} {}", request.method, request.url)
}

/// Only successful same-origin responses are stored.
pub fn is_cacheable(response: &Response) -> bool {
    response.ok() && response.response_type == ResponseType::Basic
}

/// Picks the strategy for a request. Non-GET requests are never cached.
pub fn classify(request: &Request, mode: AssetMatch) -> Strategy {
    if !request.is_get() {
        Strategy::PassThrough
    } else if is_cache_first_candidate(request, mode) {
        Strategy::CacheFirst
    } else if is_network_first_candidate(request) {
        Strategy::NetworkFirst
    } else {
        Strategy::PassThrough
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[test]
    fn test_static_assets_are_cache_first() {
        for path in [
            "/static/app.js",
            "/main.css",
            "/img/logo.png",
            "/favicon.ico",
            "/fonts/inter.woff2",
            "/hero.jpeg?v=3",
        ] {
            let req = get(&format!("http://localhost{}", path));
            assert!(is_cache_first_candidate(&req, AssetMatch::Suffix), "{}", path);
            assert!(is_cache_first_candidate(&req, AssetMatch::Substring), "{}", path);
        }
    }

    #[test]
    fn test_suffix_vs_substring() {
        let backup = get("http://localhost/foo.jsx.backup");
        assert!(!is_cache_first_candidate(&backup, AssetMatch::Suffix));
        assert!(is_cache_first_candidate(&backup, AssetMatch::Substring));

        let json = get("http://localhost/data.json");
        assert!(!is_cache_first_candidate(&json, AssetMatch::Suffix));
        assert!(is_cache_first_candidate(&json, AssetMatch::Substring));
    }

    #[test]
    fn test_extension_match_is_case_sensitive() {
        let req = get("http://localhost/LOGO.PNG");
        assert!(!is_cache_first_candidate(&req, AssetMatch::Suffix));
    }

    #[test]
    fn test_network_first_segments() {
        assert!(is_network_first_candidate(&get("http://localhost/api/characters")));
        assert!(is_network_first_candidate(&get("http://localhost/v2/sync/push")));
        assert!(!is_network_first_candidate(&get("http://localhost/apiary")));
        assert!(!is_network_first_candidate(&get("http://localhost/dashboard")));
    }

    #[test]
    fn test_cache_key_combines_method_and_url() {
        let a = get("http://localhost/a.js");
        let b = get("http://localhost/a.js");
        let post = Request::new("POST", Url::parse("http://localhost/a.js").unwrap());

        assert_eq!(cache_key(&a), cache_key(&b));
        assert_eq!(cache_key(&a), "GET http://localhost/a.js");
        assert_ne!(cache_key(&a), cache_key(&post));
    }

    #[test]
    fn test_cacheability() {
        assert!(!is_cacheable(&Response::new(404, "missing")));
        assert!(!is_cacheable(
            &Response::new(200, "x").with_type(ResponseType::Cors)
        ));
        assert!(!is_cacheable(
            &Response::new(0, "").with_type(ResponseType::Opaque)
        ));
        assert!(is_cacheable(&Response::new(200, "x")));
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(&get("http://localhost/app.js"), AssetMatch::Suffix),
            Strategy::CacheFirst
        );
        assert_eq!(
            classify(&get("http://localhost/api/parties"), AssetMatch::Suffix),
            Strategy::NetworkFirst
        );
        assert_eq!(
            classify(&get("http://localhost/dashboard"), AssetMatch::Suffix),
            Strategy::PassThrough
        );

        let post = Request::new("POST", Url::parse("http://localhost/api/parties").unwrap());
        assert_eq!(classify(&post, AssetMatch::Suffix), Strategy::PassThrough);
    }

    #[test]
    fn test_cache_first_wins_over_network_first() {
        let req = get("http://localhost/api/schema.js");
        assert_eq!(classify(&req, AssetMatch::Suffix), Strategy::CacheFirst);
    }

    #[test]
    fn test_asset_match_from_str() {
        assert_eq!("suffix".parse::<AssetMatch>().unwrap(), AssetMatch::Suffix);
        assert_eq!("Substring".parse::<AssetMatch>().unwrap(), AssetMatch::Substring);
        assert!("regex".parse::<AssetMatch>().is_err());
    }
}
