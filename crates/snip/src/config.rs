//! Shell configuration
//!
//! Loaded from an optional TOML file; command-line flags override it.
//!
//! ```toml
//! admins = ["root"]
//!
//! [store]
//! db = "/var/lib/snip/snip.db"
//! max_retries = 8
//!
//! [slugs]
//! generator = "phonetic"
//! url_length = 7
//! paste_length = 10
//!
//! [[api_keys]]
//! key = "k-4f1c"
//! user = "deploy-bot"
//! can_update = false
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use snip_core::generator::{DEFAULT_PASTE_LENGTH, DEFAULT_URL_LENGTH};
use snip_core::resolver::DEFAULT_MAX_GENERATION_ATTEMPTS;
use snip_core::store::DEFAULT_MAX_RETRIES;
use snip_core::{
    ApiCredential, ApiKeyRegistry, PhoneticGenerator, RandomGenerator, ResolverConfig,
    SlugGenerator, User,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub store: StoreConfig,
    pub slugs: SlugConfig,
    pub api_keys: Vec<ApiKeyConfig>,
    /// User ids allowed to edit every document
    pub admins: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// SQLite database path; in-memory when unset
    pub db: Option<PathBuf>,
    pub max_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db: None,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    #[default]
    Phonetic,
    Random,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlugConfig {
    pub generator: GeneratorKind,
    pub url_length: usize,
    pub paste_length: usize,
    pub max_generation_attempts: u32,
}

impl Default for SlugConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorKind::default(),
            url_length: DEFAULT_URL_LENGTH,
            paste_length: DEFAULT_PASTE_LENGTH,
            max_generation_attempts: DEFAULT_MAX_GENERATION_ATTEMPTS,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiKeyConfig {
    pub key: String,
    pub user: String,
    #[serde(default = "enabled")]
    pub can_create: bool,
    #[serde(default = "enabled")]
    pub can_update: bool,
}

fn enabled() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            max_retries: self.store.max_retries,
            max_generation_attempts: self.slugs.max_generation_attempts,
        }
    }

    pub fn generator(&self) -> Arc<dyn SlugGenerator> {
        let SlugConfig {
            url_length,
            paste_length,
            ..
        } = self.slugs;

        match self.slugs.generator {
            GeneratorKind::Phonetic => {
                Arc::new(PhoneticGenerator::with_lengths(url_length, paste_length))
            }
            GeneratorKind::Random => Arc::new(RandomGenerator::with_lengths(url_length, paste_length)),
        }
    }

    /// A user, flagged as admin when listed in `admins`
    pub fn user(&self, id: &str) -> User {
        if self.admins.iter().any(|admin| admin == id) {
            User::admin(id)
        } else {
            User::new(id)
        }
    }

    pub fn api_keys(&self) -> ApiKeyRegistry {
        self.api_keys
            .iter()
            .map(|entry| ApiCredential {
                key: entry.key.clone(),
                user: self.user(&entry.user),
                can_create_documents: entry.can_create,
                can_update_documents: entry.can_update,
            })
            .collect()
    }
}
