//! Runtime configuration from environment variables.
//!
//! Every variable is optional; defaults live in `hoai_core::defaults`.
//! A `.env` file is loaded by `main` before this runs.

use std::str::FromStr;
use std::time::Duration;

use hoai_core::defaults;
use hoai_core::CurrentUser;
use hoai_db::pool::DEFAULT_MAX_CONNECTIONS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub storage_path: String,
    pub public_base_url: String,
    pub cache_stale_after: Duration,
    pub ollama_base: String,
    pub gen_model: String,
    pub search_timeout_secs: u64,
    /// `None` unless `HOAI_USER_ID` is set; without it the wiki is read-only.
    pub user: Option<CurrentUser>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let string = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let user = var("HOAI_USER_ID")
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .map(|id| {
                let name = var("HOAI_USER_NAME")
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| id.clone());
                CurrentUser::new(id, name)
            });

        Self {
            database_url: string("DATABASE_URL", defaults::DATABASE_URL),
            max_connections: parsed(&var, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS),
            storage_path: string("WIKI_STORAGE_PATH", defaults::STORAGE_PATH),
            public_base_url: string("WIKI_PUBLIC_BASE_URL", defaults::PUBLIC_BASE_URL),
            cache_stale_after: Duration::from_secs(parsed(
                &var,
                "WIKI_CACHE_STALE_SECS",
                defaults::CACHE_STALE_SECS,
            )),
            ollama_base: string("OLLAMA_BASE", defaults::OLLAMA_URL),
            gen_model: string("OLLAMA_GEN_MODEL", defaults::GEN_MODEL),
            search_timeout_secs: parsed(
                &var,
                "HOAI_SEARCH_TIMEOUT_SECS",
                defaults::SEARCH_TIMEOUT_SECS,
            ),
            user,
        }
    }
}

/// Parse `key` as `N`; missing or out-of-range values fall back to `default`.
fn parsed<N: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: N) -> N {
    var(key)
        .and_then(|v| v.trim().parse::<N>().ok())
        .unwrap_or(default)
}
