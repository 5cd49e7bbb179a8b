use crate::config::CrawlConfig;
use crate::export::Sink;
use crate::models::{ListingVariant, Table};
use crate::scrapers::extractor::ListingExtractor;
use crate::scrapers::traits::{DriverError, PageDriver};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

#[derive(Debug, Error, PartialEq)]
pub enum LinkError {
    #[error("empty URL")]
    Empty,

    #[error("malformed URL {0}")]
    Malformed(String),

    #[error("expected a {expected} link to {host}, got {url}")]
    WrongSite {
        expected: String,
        host: String,
        url: String,
    },
}

/// Check an operator-supplied results page link against the configured site
pub fn validate_link(config: &CrawlConfig, link: &str) -> Result<Url, LinkError> {
    let link = link.trim();
    if link.is_empty() {
        return Err(LinkError::Empty);
    }
    let url = Url::parse(link).map_err(|_| LinkError::Malformed(link.to_string()))?;
    let host = url.host_str().unwrap_or_default();
    // an explicit non-default port is a different site
    if url.scheme() != config.allowed_scheme || host != config.allowed_host || url.port().is_some()
    {
        return Err(LinkError::WrongSite {
            expected: config.allowed_scheme.clone(),
            host: config.allowed_host.clone(),
            url: link.to_string(),
        });
    }
    Ok(url)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CrawlState {
    Idle,
    SelectingTarget,
    IteratingPages,
    IteratingListings,
    Flushing,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CrawlOutcome {
    Completed,
    Interrupted,
    Aborted { reason: String },
}

/// Summary of one crawl run
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub variant: ListingVariant,
    pub output: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub pages_visited: usize,
    pub listings_parsed: usize,
    pub listings_failed: usize,
    pub flushes: usize,
    pub rows_written: usize,
    pub outcome: CrawlOutcome,
}

/// Why a run stopped early
enum Halt {
    Interrupted,
    Fatal(String),
}

impl From<DriverError> for Halt {
    fn from(e: DriverError) -> Self {
        Halt::Fatal(e.to_string())
    }
}

/// Drives one crawl: pages, listings, periodic flushes.
///
/// Owns the browser driver, the table and the sink for the whole run.
/// Every exit path (completion, interruption, fatal driver error) flushes
/// whatever is still in the table.
pub struct CrawlController<'a, D: PageDriver, S: Sink> {
    config: &'a CrawlConfig,
    driver: D,
    sink: S,
    extractor: ListingExtractor,
    table: Table,
    batch_size: usize,
    pending: usize,
    state: CrawlState,
    stop: Arc<AtomicBool>,
    report: CrawlReport,
}

impl<'a, D: PageDriver, S: Sink> CrawlController<'a, D, S> {
    pub fn new(
        config: &'a CrawlConfig,
        variant: ListingVariant,
        driver: D,
        sink: S,
        stop: Arc<AtomicBool>,
    ) -> Self {
        let extractor =
            ListingExtractor::new(variant, &config.selectors, config.lookup_timeout());
        let table = extractor.new_table();
        let report = CrawlReport {
            variant,
            output: sink.destination().to_path_buf(),
            started_at: Utc::now(),
            finished_at: None,
            pages_visited: 0,
            listings_parsed: 0,
            listings_failed: 0,
            flushes: 0,
            rows_written: 0,
            outcome: CrawlOutcome::Completed,
        };

        Self {
            config,
            driver,
            sink,
            extractor,
            table,
            batch_size: config.batch_size.max(1),
            pending: 0,
            state: CrawlState::Idle,
            stop,
            report,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> CrawlState {
        self.state
    }

    #[cfg(test)]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Crawl the first `pages` result pages of the variant's base query
    pub fn run_pages(&mut self, pages: u32) -> CrawlReport {
        self.state = CrawlState::SelectingTarget;
        let pages = pages.min(self.config.max_pages);
        let page_capacity = self.config.avg_listings_per_page * pages as usize;
        self.batch_size = self.batch_size.min(page_capacity).max(1);
        info!(
            "Processing {} pages (max: {}), saving every {} listings",
            pages, self.config.max_pages, self.batch_size
        );

        let result = self.select_category().and_then(|()| {
            let variant = self.extractor.variant();
            for page in 1..=pages {
                self.check_stop()?;
                let url = self.config.base_urls.page_url(variant, page);
                self.crawl_page(&url)?;
            }
            Ok(())
        });
        self.finish(result)
    }

    /// Crawl operator-supplied result pages until the source runs dry
    pub fn run_links<I>(&mut self, links: I) -> CrawlReport
    where
        I: IntoIterator<Item = String>,
    {
        self.state = CrawlState::SelectingTarget;
        self.batch_size = self
            .batch_size
            .min(self.config.avg_listings_per_page)
            .max(1);

        let result = (|| -> Result<(), Halt> {
            for link in links {
                self.check_stop()?;
                match validate_link(self.config, &link) {
                    Ok(url) => self.crawl_page(url.as_str())?,
                    Err(e) => error!("Invalid URL: {}", e),
                }
            }
            // the link source also ends early when the stop flag is raised
            self.check_stop()
        })();
        self.finish(result)
    }

    fn select_category(&mut self) -> Result<(), Halt> {
        if !self.config.select_category {
            return Ok(());
        }

        let variant = self.extractor.variant();
        let selected = self.submit_search(variant);

        match selected {
            Ok(url) => {
                info!("Selected {} search: {}", variant, url);
                Ok(())
            }
            Err(e) => {
                error!("Error selecting category for {}: {}", variant, e);
                Err(Halt::Fatal(format!("failed to select category: {e}")))
            }
        }
    }

    /// Pick category and action in the site's search form and submit it
    fn submit_search(&mut self, variant: ListingVariant) -> Result<String, DriverError> {
        let config = self.config;
        let selectors = &config.selectors;
        let timeout = config.links_timeout();

        self.driver.navigate(&config.site_url)?;
        self.driver.select_option(
            &selectors.category_select,
            variant.category().form_value(),
            timeout,
        )?;
        self.driver.select_option(
            &selectors.action_select,
            variant.action().form_value(),
            timeout,
        )?;
        self.driver.click(&selectors.search_button, timeout)?;
        self.driver.current_url()
    }

    fn crawl_page(&mut self, url: &str) -> Result<(), Halt> {
        self.state = CrawlState::IteratingPages;
        info!("Processing page: {}", url);

        match self.driver.navigate(url) {
            Ok(()) => self.report.pages_visited += 1,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                error!("Error processing page {}: {}", url, e);
                return Ok(());
            }
        }

        let links = match self
            .driver
            .find_links(&self.config.selectors.listing_links, self.config.links_timeout())
        {
            Ok(links) => links,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                error!("Error extracting links from {}: {}", url, e);
                Vec::new()
            }
        };

        if links.is_empty() {
            warn!("No listings found on page {}", url);
            return Ok(());
        }
        info!("Found {} listings on page {}", links.len(), url);

        self.state = CrawlState::IteratingListings;
        for link in links {
            self.check_stop()?;
            self.crawl_listing(&link)?;
        }
        Ok(())
    }

    fn crawl_listing(&mut self, link: &str) -> Result<(), Halt> {
        info!("Parsing listing: {}", link);

        match self
            .extractor
            .parse_page(&mut self.driver, link, &mut self.table)
        {
            Ok(()) => self.report.listings_parsed += 1,
            Err(e) if e.is_fatal() => {
                self.report.listings_failed += 1;
                return Err(Halt::Fatal(e.to_string()));
            }
            Err(e) => {
                error!("Error parsing page {}: {}", link, e);
                self.report.listings_failed += 1;
            }
        }

        self.pending += 1;
        self.pause();
        if self.pending >= self.batch_size {
            self.flush();
        }
        Ok(())
    }

    fn pause(&self) {
        let (min, max) = (self.config.delay_min_ms, self.config.delay_max_ms);
        if max == 0 {
            return;
        }
        thread::sleep(Duration::from_millis(fastrand::u64(min..=max)));
    }

    /// Align, write and clear the table. On a write error the rows stay
    /// in the table for the next attempt.
    fn flush(&mut self) {
        self.pending = 0;
        if self.table.is_empty() {
            return;
        }

        let previous = self.state;
        self.state = CrawlState::Flushing;
        self.table.align();
        match self.sink.flush(&self.table) {
            Ok(rows) => {
                self.report.flushes += 1;
                self.report.rows_written += rows;
                self.table.clear();
            }
            Err(e) => error!("Error saving to {}: {}", self.sink.destination().display(), e),
        }
        self.state = previous;
    }

    fn check_stop(&self) -> Result<(), Halt> {
        if self.stop.load(Ordering::SeqCst) {
            Err(Halt::Interrupted)
        } else {
            Ok(())
        }
    }

    fn finish(&mut self, result: Result<(), Halt>) -> CrawlReport {
        let outcome = match result {
            Ok(()) => CrawlOutcome::Completed,
            Err(Halt::Interrupted) => {
                info!("Crawl interrupted, saving collected rows");
                CrawlOutcome::Interrupted
            }
            Err(Halt::Fatal(reason)) => {
                error!("Crawl aborted: {}", reason);
                CrawlOutcome::Aborted { reason }
            }
        };

        self.flush();
        self.state = match outcome {
            CrawlOutcome::Completed => CrawlState::Idle,
            _ => CrawlState::Aborted,
        };

        self.report.outcome = outcome;
        self.report.finished_at = Some(Utc::now());
        info!(
            "✅ {} listings parsed, {} rows saved to {}",
            self.report.listings_parsed,
            self.report.rows_written,
            self.report.output.display()
        );
        self.report.clone()
    }
}
