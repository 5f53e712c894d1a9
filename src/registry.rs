use crate::config::Config;
use crate::error::{Result, ScraperError};
use crate::models::SiteConfig;

/// Immutable lookup table of target sites, sorted by id.
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    sites: Vec<SiteConfig>,
}

impl SiteRegistry {
    pub fn from_config(config: &Config) -> Result<Self> {
        // BTreeMap iteration keeps the menu order stable
        let sites = config
            .sites
            .iter()
            .map(|(id, entry)| SiteConfig::from_entry(id, entry))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { sites })
    }

    pub fn get_site(&self, id: &str) -> Result<&SiteConfig> {
        self.sites
            .iter()
            .find(|site| site.id == id)
            .ok_or_else(|| ScraperError::UnknownSite(id.to_string()))
    }

    /// Resolve operator input: a 1-based menu number or a site id.
    pub fn resolve(&self, input: &str) -> Result<&SiteConfig> {
        let input = input.trim();
        if let Ok(n) = input.parse::<usize>() {
            return n
                .checked_sub(1)
                .and_then(|idx| self.sites.get(idx))
                .ok_or_else(|| ScraperError::UnknownSite(input.to_string()));
        }
        self.get_site(input)
    }

    pub fn sites(&self) -> &[SiteConfig] {
        &self.sites
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DiscoveryStrategy, SiteEntry};
    use pretty_assertions::assert_eq;

    fn registry() -> SiteRegistry {
        let mut config = Config::default();
        config.sites.insert(
            "acme".to_string(),
            SiteEntry {
                base_url: "https://acme.test".to_string(),
                product_pattern: "/product/".to_string(),
                discovery: DiscoveryStrategy::default(),
            },
        );
        SiteRegistry::from_config(&config).unwrap()
    }

    #[test]
    fn get_site_returns_every_configured_entry() {
        let config = Config::default();
        let registry = SiteRegistry::from_config(&config).unwrap();
        for (id, entry) in &config.sites {
            let site = registry.get_site(id).unwrap();
            assert_eq!(&site.id, id);
            assert_eq!(site.product_pattern.to_string(), entry.product_pattern);
        }
    }

    #[test]
    fn unknown_id_fails() {
        let err = registry().get_site("nope").unwrap_err();
        assert!(matches!(err, ScraperError::UnknownSite(id) if id == "nope"));
    }

    #[test]
    fn resolve_accepts_menu_numbers_and_ids() {
        let registry = registry();
        assert_eq!(registry.resolve("1").unwrap().id, "acme");
        assert_eq!(registry.resolve(" vaperanger ").unwrap().id, "vaperanger");
        assert!(registry.resolve("0").is_err());
        assert!(registry.resolve("4").is_err());
    }

    #[test]
    fn invalid_entry_fails_construction() {
        let mut config = Config::default();
        config.sites.insert(
            "broken".to_string(),
            SiteEntry {
                base_url: "not a url".to_string(),
                product_pattern: "/p/".to_string(),
                discovery: DiscoveryStrategy::default(),
            },
        );
        assert!(matches!(
            SiteRegistry::from_config(&config),
            Err(ScraperError::Config(_))
        ));
    }
}
