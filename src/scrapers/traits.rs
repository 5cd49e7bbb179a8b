use crate::scrapers::locator::Locator;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("lookup of {locator} failed: {reason}")]
    Lookup { locator: String, reason: String },

    /// Only raised by the offline driver, which cannot evaluate XPath
    #[cfg(test)]
    #[error("locator kind {0} is not supported by this driver")]
    Unsupported(crate::scrapers::locator::LocatorKind),

    #[error("browser session lost: {0}")]
    Session(String),
}

impl DriverError {
    /// Session-level failures end the crawl; everything else is scoped to
    /// one lookup, listing or page.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DriverError::Session(_))
    }
}

/// Capabilities the crawler needs from a browser.
/// Anything that can navigate and query a DOM can back a crawl.
pub trait PageDriver {
    /// Load `url` in the current tab and wait for navigation to finish
    fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    /// URL of the page currently shown
    fn current_url(&mut self) -> Result<String, DriverError>;

    /// Text of the first element matching `locator`.
    /// `Ok(None)` means nothing appeared within `timeout`.
    fn find_text(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Option<String>, DriverError>;

    /// Absolute `href` of every element matching `locator`
    fn find_links(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Vec<String>, DriverError>;

    /// Click the first element matching `locator`
    fn click(&mut self, locator: &Locator, timeout: Duration) -> Result<(), DriverError>;

    /// Choose `value` in the `<select>` matched by `locator`
    fn select_option(
        &mut self,
        locator: &Locator,
        value: &str,
        timeout: Duration,
    ) -> Result<(), DriverError>;
}
