//! Provider configuration resolution for zousho-bi
//!
//! Per-provider settings start from compiled defaults, take TOML overrides,
//! and finally pick up API keys with ENV → TOML priority.

use tracing::{info, warn};
use zousho_common::config::{SourceOverrides, SourceSettings, TomlConfig};

use crate::sources::SourceId;

/// Environment variable holding the Rakuten application id
pub const RAKUTEN_APP_ID_ENV: &str = "ZOUSHO_RAKUTEN_APP_ID";

/// Environment variable holding the Google Books API key
pub const GOOGLE_BOOKS_API_KEY_ENV: &str = "ZOUSHO_GOOGLE_BOOKS_API_KEY";

/// Fully resolved settings for every provider
#[derive(Debug, Clone)]
pub struct ResolvedSources {
    pub openbd: SourceSettings,
    pub rakuten: SourceSettings,
    pub google_books: SourceSettings,
}

impl ResolvedSources {
    pub fn get(&self, source: SourceId) -> &SourceSettings {
        match source {
            SourceId::OpenBd => &self.openbd,
            SourceId::Rakuten => &self.rakuten,
            SourceId::GoogleBooks => &self.google_books,
        }
    }

    /// Enabled providers in trust order
    pub fn enabled(&self) -> Vec<SourceId> {
        SourceId::PRIORITY
            .into_iter()
            .filter(|source| self.get(*source).enabled)
            .collect()
    }
}

/// Resolve provider settings from TOML plus environment
pub fn resolve_sources(config: &TomlConfig) -> ResolvedSources {
    let sources = &config.sources;

    let openbd = SourceSettings::openbd().with_overrides(&sources.openbd);

    let mut rakuten = SourceSettings::rakuten().with_overrides(&sources.rakuten);
    rakuten.api_key = resolve_api_key(
        SourceId::Rakuten,
        RAKUTEN_APP_ID_ENV,
        std::env::var(RAKUTEN_APP_ID_ENV).ok(),
        &sources.rakuten,
    );
    if rakuten.enabled && rakuten.api_key.is_none() {
        warn!(
            "Rakuten Books disabled: no application id (set {} or sources.rakuten.api_key)",
            RAKUTEN_APP_ID_ENV
        );
        rakuten.enabled = false;
    }

    let mut google_books = SourceSettings::google_books().with_overrides(&sources.google_books);
    google_books.api_key = resolve_api_key(
        SourceId::GoogleBooks,
        GOOGLE_BOOKS_API_KEY_ENV,
        std::env::var(GOOGLE_BOOKS_API_KEY_ENV).ok(),
        &sources.google_books,
    );

    ResolvedSources {
        openbd,
        rakuten,
        google_books,
    }
}

/// Pick an API key with ENV → TOML priority
///
/// Warns when both tiers carry a key, since the TOML value is then ignored.
pub fn resolve_api_key(
    source: SourceId,
    env_name: &str,
    env_value: Option<String>,
    overrides: &SourceOverrides,
) -> Option<String> {
    let env_key = env_value.filter(|k| is_valid_key(k));
    let toml_key = overrides.api_key.clone().filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            source = %source,
            "API key found in both {} and TOML config. Using environment (highest priority).",
            env_name
        );
    }

    if let Some(key) = env_key {
        info!(source = %source, "API key loaded from environment variable");
        return Some(key);
    }
    if let Some(key) = toml_key {
        info!(source = %source, "API key loaded from TOML config");
        return Some(key);
    }
    None
}

/// Non-empty, non-whitespace key
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
