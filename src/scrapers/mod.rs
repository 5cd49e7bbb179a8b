pub mod browser;
pub mod crawl;
pub mod extractor;
pub mod fields;
pub mod locator;
pub mod rules;
#[cfg(test)]
mod snapshot;
pub mod traits;

pub use browser::ChromeDriver;
pub use crawl::{CrawlController, CrawlReport};
