use crate::export::{validate_delimiter, OutputEncoding};
use crate::models::ListingVariant;
use crate::scrapers::rules::SelectorCatalog;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("batch size must be at least 1")]
    ZeroBatch,

    #[error("delay bounds are reversed: {min}ms > {max}ms")]
    DelayBounds { min: u64, max: u64 },

    #[error("{0:?} cannot be used as a field delimiter")]
    Delimiter(char),

    #[error("invalid URL for {name}: {value}")]
    Url { name: &'static str, value: String },
}

/// Search query prefixes; page URL = prefix + `page=N`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseUrls {
    pub apartment_sell: String,
    pub apartment_rent: String,
    pub commerce_sell: String,
    pub commerce_rent: String,
}

impl Default for BaseUrls {
    fn default() -> Self {
        Self {
            apartment_sell: "https://krisha.kz/prodazha/kvartiry/?".to_string(),
            apartment_rent:
                "https://krisha.kz/arenda/kvartiry/?rent-period-switch=%2Farenda%2Fkvartiry&"
                    .to_string(),
            commerce_sell: "https://krisha.kz/prodazha/kommercheskaya-nedvizhimost/?".to_string(),
            commerce_rent:
                "https://krisha.kz/arenda/kommercheskaya-nedvizhimost/?das[rent.square]=2&"
                    .to_string(),
        }
    }
}

impl BaseUrls {
    pub fn get(&self, variant: ListingVariant) -> &str {
        match variant {
            ListingVariant::ApartmentSell => &self.apartment_sell,
            ListingVariant::ApartmentRent => &self.apartment_rent,
            ListingVariant::CommerceSell => &self.commerce_sell,
            ListingVariant::CommerceRent => &self.commerce_rent,
        }
    }

    pub fn page_url(&self, variant: ListingVariant, page: u32) -> String {
        format!("{}page={}", self.get(variant), page)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub encoding: OutputEncoding,
    pub delimiter: char,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            encoding: OutputEncoding::Utf16,
            delimiter: '[',
        }
    }
}

/// Everything a crawl run needs, fixed before the run starts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub site_url: String,
    pub allowed_scheme: String,
    pub allowed_host: String,
    pub base_urls: BaseUrls,
    /// Wait for a single field candidate
    pub lookup_timeout_ms: u64,
    /// Wait for listing cards on a results page
    pub links_timeout_ms: u64,
    pub max_pages: u32,
    pub avg_listings_per_page: usize,
    /// Listings between flushes
    pub batch_size: usize,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    /// Drive the site's search form before paging
    pub select_category: bool,
    pub headless: bool,
    pub output: OutputConfig,
    pub selectors: SelectorCatalog,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            site_url: "https://krisha.kz/".to_string(),
            allowed_scheme: "https".to_string(),
            allowed_host: "krisha.kz".to_string(),
            base_urls: BaseUrls::default(),
            lookup_timeout_ms: 500,
            links_timeout_ms: 10_000,
            max_pages: 1000,
            avg_listings_per_page: 20,
            batch_size: 20,
            delay_min_ms: 500,
            delay_max_ms: 1500,
            select_category: true,
            headless: true,
            output: OutputConfig::default(),
            selectors: SelectorCatalog::default(),
        }
    }
}

impl CrawlConfig {
    /// Defaults, overlaid with a JSON file when one is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Failed to parse config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatch);
        }
        if self.delay_min_ms > self.delay_max_ms {
            return Err(ConfigError::DelayBounds {
                min: self.delay_min_ms,
                max: self.delay_max_ms,
            });
        }
        validate_delimiter(self.output.delimiter)
            .map_err(|_| ConfigError::Delimiter(self.output.delimiter))?;

        check_url("site_url", &self.site_url)?;
        for (name, value) in [
            ("base_urls.apartment_sell", &self.base_urls.apartment_sell),
            ("base_urls.apartment_rent", &self.base_urls.apartment_rent),
            ("base_urls.commerce_sell", &self.base_urls.commerce_sell),
            ("base_urls.commerce_rent", &self.base_urls.commerce_rent),
        ] {
            check_url(name, value)?;
        }
        Ok(())
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn links_timeout(&self) -> Duration {
        Duration::from_millis(self.links_timeout_ms)
    }

    pub fn output_path(&self, variant: ListingVariant) -> PathBuf {
        self.output.directory.join(variant.output_file_name())
    }
}

fn check_url(name: &'static str, value: &str) -> Result<(), ConfigError> {
    Url::parse(value).map(|_| ()).map_err(|_| ConfigError::Url {
        name,
        value: value.to_string(),
    })
}
