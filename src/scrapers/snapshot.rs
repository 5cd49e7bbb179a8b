//! Offline `PageDriver` over saved HTML, used to exercise the crawler
//! without a browser.

use crate::scrapers::locator::{Locator, LocatorKind};
use crate::scrapers::traits::{DriverError, PageDriver};
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use url::Url;

#[derive(Default)]
pub struct HtmlSnapshotDriver {
    pages: HashMap<String, String>,
    broken: HashSet<String>,
    current: Option<String>,
    lookups_left: Option<usize>,
    pub visited: Vec<String>,
    pub clicks: Vec<String>,
    pub selections: Vec<(String, String)>,
}

impl HtmlSnapshotDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// Navigating to `url` fails with a navigation error
    pub fn with_broken_page(mut self, url: &str) -> Self {
        self.broken.insert(url.to_string());
        self
    }

    /// Every later call fails as if the browser had crashed
    pub fn kill_session(&mut self) {
        self.lookups_left = Some(0);
    }

    /// Allow `n` more element lookups before the session dies
    pub fn kill_session_after(&mut self, n: usize) {
        self.lookups_left = Some(n);
    }

    fn check_session(&mut self) -> Result<(), DriverError> {
        match self.lookups_left.as_mut() {
            Some(0) => Err(DriverError::Session("chrome exited".to_string())),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn document(&self) -> Html {
        let html = self
            .current
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .map(String::as_str)
            .unwrap_or("");
        Html::parse_document(html)
    }

    fn selector(locator: &Locator) -> Result<Selector, DriverError> {
        if locator.kind != LocatorKind::Css {
            return Err(DriverError::Unsupported(locator.kind));
        }
        Selector::parse(&locator.selector).map_err(|e| DriverError::Lookup {
            locator: locator.to_string(),
            reason: format!("{e:?}"),
        })
    }

    fn first_match<T>(
        &mut self,
        locator: &Locator,
        f: impl FnOnce(ElementRef<'_>) -> T,
    ) -> Result<Option<T>, DriverError> {
        self.check_session()?;
        let selector = Self::selector(locator)?;
        let document = self.document();
        let found = document.select(&selector).next().map(f);
        Ok(found)
    }
}

impl PageDriver for HtmlSnapshotDriver {
    fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.check_session()?;
        self.visited.push(url.to_string());
        if self.broken.contains(url) {
            return Err(DriverError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_RESET".to_string(),
            });
        }
        self.current = Some(url.to_string());
        Ok(())
    }

    fn current_url(&mut self) -> Result<String, DriverError> {
        self.check_session()?;
        Ok(self.current.clone().unwrap_or_default())
    }

    fn find_text(
        &mut self,
        locator: &Locator,
        _timeout: Duration,
    ) -> Result<Option<String>, DriverError> {
        self.first_match(locator, |element| {
            element
                .text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
    }

    fn find_links(
        &mut self,
        locator: &Locator,
        _timeout: Duration,
    ) -> Result<Vec<String>, DriverError> {
        self.check_session()?;
        let selector = Self::selector(locator)?;
        let base = self.current.as_deref().and_then(|u| Url::parse(u).ok());
        let document = self.document();
        let links = document
            .select(&selector)
            .filter_map(|element| element.value().attr("href"))
            .map(|href| match &base {
                Some(base) => base
                    .join(href)
                    .map(|u| u.to_string())
                    .unwrap_or_else(|_| href.to_string()),
                None => href.to_string(),
            })
            .collect();
        Ok(links)
    }

    fn click(&mut self, locator: &Locator, _timeout: Duration) -> Result<(), DriverError> {
        match self.first_match(locator, |_| ())? {
            Some(()) => {
                self.clicks.push(locator.selector.clone());
                Ok(())
            }
            None => Err(DriverError::Lookup {
                locator: locator.to_string(),
                reason: "nothing to click".to_string(),
            }),
        }
    }

    fn select_option(
        &mut self,
        locator: &Locator,
        value: &str,
        _timeout: Duration,
    ) -> Result<(), DriverError> {
        match self.first_match(locator, |_| ())? {
            Some(()) => {
                self.selections
                    .push((locator.selector.clone(), value.to_string()));
                Ok(())
            }
            None => Err(DriverError::Lookup {
                locator: locator.to_string(),
                reason: "no such select".to_string(),
            }),
        }
    }
}
