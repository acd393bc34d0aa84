//! crates/gougestop_core/src/offline.rs
//!
//! The offline/install cache policy for the web shell, expressed as pure
//! decisions: which routes are precached, how each fetch is served, and which
//! caches are stale after an upgrade.

pub const CACHE_NAME: &str = "gougestop-v1";
pub const OFFLINE_PAGE: &str = "/offline.html";

pub const PRECACHE_ROUTES: [&str; 8] = [
    "/",
    "/app",
    "/our-story",
    "/blog",
    "/icon-192.png",
    "/icon-512.png",
    "/favicon.svg",
    OFFLINE_PAGE,
];

/// The parts of an outgoing fetch the policy looks at.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub is_navigation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Not handled by the cache at all.
    Bypass,
    /// Network, then cached copy, then the offline page.
    NetworkFirst,
    /// Cached copy, else network (storing successful responses).
    CacheFirst,
}

#[derive(Debug, Clone)]
pub struct CachePolicy {
    cache_name: String,
    bypass_markers: Vec<String>,
}

impl CachePolicy {
    /// API calls and anything addressed to the backend host are never cached.
    pub fn new(backend_host: &str) -> Self {
        let mut bypass_markers = vec!["/api/".to_string()];
        if !backend_host.is_empty() {
            bypass_markers.push(backend_host.to_string());
        }
        Self {
            cache_name: CACHE_NAME.to_string(),
            bypass_markers,
        }
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn precache_routes(&self) -> &'static [&'static str] {
        &PRECACHE_ROUTES
    }

    pub fn strategy(&self, request: &FetchRequest<'_>) -> FetchStrategy {
        if !request.method.eq_ignore_ascii_case("GET") {
            return FetchStrategy::Bypass;
        }
        if self
            .bypass_markers
            .iter()
            .any(|marker| request.url.contains(marker.as_str()))
        {
            return FetchStrategy::Bypass;
        }
        if request.is_navigation {
            FetchStrategy::NetworkFirst
        } else {
            FetchStrategy::CacheFirst
        }
    }

    /// Navigations cache whatever came back; assets only cache successes.
    pub fn should_store(&self, strategy: FetchStrategy, response_ok: bool) -> bool {
        match strategy {
            FetchStrategy::NetworkFirst => true,
            FetchStrategy::CacheFirst => response_ok,
            FetchStrategy::Bypass => false,
        }
    }

    /// Every cache except the current one is dropped on activation.
    pub fn stale_caches<'n>(&self, existing: &[&'n str]) -> Vec<&'n str> {
        existing
            .iter()
            .copied()
            .filter(|name| *name != self.cache_name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(url: &str, is_navigation: bool) -> FetchRequest<'_> {
        FetchRequest {
            method: "GET",
            url,
            is_navigation,
        }
    }

    #[test]
    fn picks_strategy_by_request_kind() {
        let policy = CachePolicy::new("web-production-c5039.up.railway.app");

        assert_eq!(policy.strategy(&get("https://gougestop.com/app", true)), FetchStrategy::NetworkFirst);
        assert_eq!(policy.strategy(&get("https://gougestop.com/icon-192.png", false)), FetchStrategy::CacheFirst);
        assert_eq!(
            policy.strategy(&FetchRequest { method: "POST", url: "https://gougestop.com/app", is_navigation: false }),
            FetchStrategy::Bypass
        );
        assert_eq!(policy.strategy(&get("https://gougestop.com/api/usage", false)), FetchStrategy::Bypass);
        assert_eq!(
            policy.strategy(&get("https://web-production-c5039.up.railway.app/analyze", true)),
            FetchStrategy::Bypass
        );
    }

    #[test]
    fn only_successful_assets_are_stored() {
        let policy = CachePolicy::new("");
        assert!(policy.should_store(FetchStrategy::NetworkFirst, false));
        assert!(policy.should_store(FetchStrategy::CacheFirst, true));
        assert!(!policy.should_store(FetchStrategy::CacheFirst, false));
        assert!(!policy.should_store(FetchStrategy::Bypass, true));
    }

    #[test]
    fn old_caches_are_stale() {
        let policy = CachePolicy::new("");
        assert_eq!(policy.stale_caches(&["gougestop-v0", CACHE_NAME, "other"]), vec!["gougestop-v0", "other"]);
        assert!(policy.precache_routes().contains(&OFFLINE_PAGE));
    }
}
