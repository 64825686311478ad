use ao_session::ChainCatalog;
use tracing::warn;

pub const DEFAULT_CHAIN: &str = "stargaze";
pub const DEFAULT_KNOWN_CHAINS: &str = "stargaze,stargazetestnet,cosmoshub,osmosis,juno";
pub const DEFAULT_LIMIT: u32 = 300;
pub const DEFAULT_BACKGROUND: &str = "/images/background.png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryConfig {
    pub default_chain: String,
    pub known_chains: Vec<String>,
    pub default_limit: u32,
    pub default_background: String,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            default_chain: DEFAULT_CHAIN.to_owned(),
            known_chains: split_chains(DEFAULT_KNOWN_CHAINS),
            default_limit: DEFAULT_LIMIT,
            default_background: DEFAULT_BACKGROUND.to_owned(),
        }
    }
}

impl GalleryConfig {
    /// Reads `AO_DEFAULT_CHAIN`, `AO_KNOWN_CHAINS`, `AO_DEFAULT_LIMIT` and
    /// `AO_DEFAULT_BACKGROUND`. Unusable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let default_chain = non_empty(lookup("AO_DEFAULT_CHAIN")).unwrap_or(defaults.default_chain);

        let known_chains = non_empty(lookup("AO_KNOWN_CHAINS"))
            .map(|raw| split_chains(&raw))
            .filter(|chains| !chains.is_empty())
            .unwrap_or(defaults.known_chains);

        let default_limit = match non_empty(lookup("AO_DEFAULT_LIMIT")) {
            Some(raw) => match raw.parse::<u32>() {
                Ok(limit) if limit > 0 => limit,
                _ => {
                    warn!("AO_DEFAULT_LIMIT '{raw}' is not a positive integer, using {DEFAULT_LIMIT}");
                    DEFAULT_LIMIT
                }
            },
            None => defaults.default_limit,
        };

        let default_background =
            non_empty(lookup("AO_DEFAULT_BACKGROUND")).unwrap_or(defaults.default_background);

        Self {
            default_chain,
            known_chains,
            default_limit,
            default_background,
        }
    }

    pub fn catalog(&self) -> ChainCatalog {
        ChainCatalog::new(&self.default_chain, self.known_chains.iter().cloned())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn split_chains(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
