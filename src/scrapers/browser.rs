use crate::scrapers::locator::{Locator, LocatorKind};
use crate::scrapers::traits::{DriverError, PageDriver};
use anyhow::{Context, Result};
use headless_chrome::util::Timeout;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const HREF_FN: &str = "function() { return this.href || this.getAttribute('href') || ''; }";
const SELECT_FN: &str = "function(value) { \
    this.value = value; \
    this.dispatchEvent(new Event('change', { bubbles: true })); \
    return this.value; }";

/// Page driver backed by a single headless Chrome tab
pub struct ChromeDriver {
    browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeDriver {
    /// Launch Chrome and open the tab every crawl step runs in
    pub fn launch(headless: bool) -> Result<Self> {
        info!("Launching Chrome (headless: {})...", headless);

        let options = LaunchOptions::default_builder()
            .headless(headless)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open browser tab")?;

        Ok(Self { browser, tab })
    }

    /// A dead browser turns any error into a session loss
    fn classify(
        &self,
        err: anyhow::Error,
        scoped: impl FnOnce(String) -> DriverError,
    ) -> DriverError {
        match self.browser.get_version() {
            Ok(_) => scoped(format!("{:#}", err)),
            Err(_) => DriverError::Session(format!("{:#}", err)),
        }
    }

    fn lookup_error(&self, locator: &Locator, err: anyhow::Error) -> DriverError {
        self.classify(err, |reason| DriverError::Lookup {
            locator: locator.to_string(),
            reason,
        })
    }

    fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<Element<'_>> {
        match locator.kind {
            LocatorKind::Css => self
                .tab
                .wait_for_element_with_custom_timeout(&locator.selector, timeout),
            LocatorKind::XPath => self
                .tab
                .wait_for_xpath_with_custom_timeout(&locator.selector, timeout),
        }
    }

    /// First match, or `None` once `timeout` runs out
    fn first(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Option<Element<'_>>, DriverError> {
        match self.wait_for(locator, timeout) {
            Ok(element) => Ok(Some(element)),
            Err(e) if e.downcast_ref::<Timeout>().is_some() => Ok(None),
            Err(e) => Err(self.lookup_error(locator, e)),
        }
    }

    fn required(&self, locator: &Locator, timeout: Duration) -> Result<Element<'_>, DriverError> {
        self.first(locator, timeout)?.ok_or_else(|| DriverError::Lookup {
            locator: locator.to_string(),
            reason: format!("not found within {:?}", timeout),
        })
    }
}

impl PageDriver for ChromeDriver {
    fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        debug!("Navigating to {}", url);
        let result = self
            .tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ());

        result.map_err(|e| {
            self.classify(e, |reason| DriverError::Navigation {
                url: url.to_string(),
                reason,
            })
        })
    }

    fn current_url(&mut self) -> Result<String, DriverError> {
        Ok(self.tab.get_url())
    }

    fn find_text(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Option<String>, DriverError> {
        let Some(element) = self.first(locator, timeout)? else {
            return Ok(None);
        };
        match element.get_inner_text() {
            Ok(text) => Ok(Some(text)),
            Err(e) => Err(self.lookup_error(locator, e)),
        }
    }

    fn find_links(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Vec<String>, DriverError> {
        self.tab.set_default_timeout(timeout);
        let found = match locator.kind {
            LocatorKind::Css => self.tab.wait_for_elements(&locator.selector),
            LocatorKind::XPath => self.tab.wait_for_elements_by_xpath(&locator.selector),
        };
        let elements = match found {
            Ok(elements) => elements,
            Err(e) if e.downcast_ref::<Timeout>().is_some() => return Ok(Vec::new()),
            Err(e) => return Err(self.lookup_error(locator, e)),
        };

        let base = Url::parse(&self.tab.get_url()).ok();
        let mut links = Vec::with_capacity(elements.len());
        for element in &elements {
            let href = element
                .call_js_fn(HREF_FN, vec![], false)
                .map_err(|e| self.lookup_error(locator, e))?
                .value
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            if href.is_empty() {
                continue;
            }
            let absolute = match &base {
                Some(base) => base.join(&href).map(String::from).unwrap_or(href),
                None => href,
            };
            links.push(absolute);
        }
        Ok(links)
    }

    fn click(&mut self, locator: &Locator, timeout: Duration) -> Result<(), DriverError> {
        let element = self.required(locator, timeout)?;
        element
            .click()
            .map(|_| ())
            .map_err(|e| self.lookup_error(locator, e))
    }

    fn select_option(
        &mut self,
        locator: &Locator,
        value: &str,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let element = self.required(locator, timeout)?;
        let selected = element
            .call_js_fn(SELECT_FN, vec![json!(value)], false)
            .map_err(|e| self.lookup_error(locator, e))?
            .value;

        match selected.as_ref().and_then(|v| v.as_str()) {
            Some(v) if v == value => Ok(()),
            _ => Err(DriverError::Lookup {
                locator: locator.to_string(),
                reason: format!("option {:?} is not available", value),
            }),
        }
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        info!("browser closed");
    }
}
