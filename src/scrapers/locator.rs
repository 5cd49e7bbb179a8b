use crate::models::FieldValue;
use crate::scrapers::traits::{DriverError, PageDriver};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorKind {
    Css,
    XPath,
}

impl fmt::Display for LocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocatorKind::Css => f.write_str("css"),
            LocatorKind::XPath => f.write_str("xpath"),
        }
    }
}

/// One (kind, selector) candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub kind: LocatorKind,
    pub selector: String,
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            kind: LocatorKind::Css,
            selector: selector.into(),
        }
    }

    pub fn xpath(selector: impl Into<String>) -> Self {
        Self {
            kind: LocatorKind::XPath,
            selector: selector.into(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.selector)
    }
}

/// Outcome of resolving a candidate list
#[derive(Debug)]
pub enum Lookup {
    /// Trimmed, non-empty text of the first matching element
    Found(String),
    /// No candidate matched, or the match had no text
    Missing,
    /// The browser session went away mid-lookup
    Failed(DriverError),
}

impl Lookup {
    pub fn into_value(self) -> FieldValue {
        match self {
            Lookup::Found(text) => FieldValue::Text(text),
            Lookup::Missing | Lookup::Failed(_) => FieldValue::Missing,
        }
    }
}

/// Try each candidate in order and return the first element's text.
///
/// Misses and per-candidate driver errors are logged and skipped; only a
/// fatal session error stops the walk early.
pub fn resolve<D: PageDriver + ?Sized>(
    driver: &mut D,
    candidates: &[Locator],
    timeout: Duration,
) -> Lookup {
    for locator in candidates {
        match driver.find_text(locator, timeout) {
            Ok(Some(text)) => {
                let text = text.trim();
                return if text.is_empty() {
                    Lookup::Missing
                } else {
                    Lookup::Found(text.to_string())
                };
            }
            Ok(None) => {
                debug!("Element not found with locator: {}", locator);
            }
            Err(e) if e.is_fatal() => return Lookup::Failed(e),
            Err(e) => {
                warn!("Lookup with {} failed: {}", locator, e);
            }
        }
    }

    let tried: Vec<String> = candidates.iter().map(ToString::to_string).collect();
    error!("No elements found for locators: [{}]", tried.join(", "));
    Lookup::Missing
}
