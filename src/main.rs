mod config;
mod console;
mod export;
mod models;
mod scrapers;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use config::CrawlConfig;
use console::{parse_answer, prompt, LinkSource};
use export::DelimitedFileSink;
use models::{Action, Category, ListingVariant};
use scrapers::{ChromeDriver, CrawlController, CrawlReport};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE: &str = "scraper.log";
const LINK_PROMPT: &str = "Введите ссылку или 1 для закрытия программы: ";
/// Conventional exit status for a SIGINT-terminated process
const INTERRUPTED_EXIT: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Method {
    /// Page through the built-in search query
    Preset,
    /// Read result-page links from the console
    Console,
}

#[derive(Parser)]
#[command(name = "listing-scout", about = "krisha.kz listing crawler")]
struct Cli {
    #[arg(long, value_enum)]
    method: Option<Method>,

    /// sell | rent (or 1 | 2)
    #[arg(long)]
    action: Option<Action>,

    /// apartment | commerce (or 1 | 2)
    #[arg(long)]
    category: Option<Category>,

    /// Listings between saves
    #[arg(long)]
    save_count: Option<usize>,

    /// Result pages to crawl (preset method only)
    #[arg(long)]
    pages: Option<u32>,

    /// JSON file overriding the default crawl settings
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Run Chrome with a visible window
    #[arg(long)]
    show_browser: bool,
}

/// Everything the operator chose, either by flag or at the prompt
struct Plan {
    method: Method,
    variant: ListingVariant,
    save_count: usize,
    pages: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let file_appender = tracing_appender::rolling::never(".", LOG_FILE);
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    let cli = Cli::parse();

    info!("🏠 Listing Scout - krisha.kz crawler");
    info!("======================================");

    let plan = match plan_from(&cli) {
        Ok(plan) => plan,
        Err(e) => {
            error!("Invalid input: {}", e);
            println!("Invalid input: {}", e);
            return Ok(());
        }
    };

    let mut config = CrawlConfig::load(cli.config.as_deref())?;
    config.batch_size = plan.save_count;
    if let Some(dir) = cli.output_dir {
        config.output.directory = dir;
    }
    if cli.show_browser {
        config.headless = false;
    }

    let stop = Arc::new(AtomicBool::new(false));
    let watcher = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        info!("Ctrl-C received, saving collected rows (press again to quit now)");
        watcher.store(true, Ordering::SeqCst);

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Second Ctrl-C, exiting without waiting for the crawl");
            std::process::exit(INTERRUPTED_EXIT);
        }
    });

    let report = tokio::task::spawn_blocking(move || crawl(config, plan, stop))
        .await
        .context("Crawl task panicked")??;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn crawl(
    config: CrawlConfig,
    plan: Plan,
    stop: Arc<AtomicBool>,
) -> anyhow::Result<CrawlReport> {
    let output = config.output_path(plan.variant);
    let sink = DelimitedFileSink::new(&output, config.output.encoding, config.output.delimiter)?;
    let driver = ChromeDriver::launch(config.headless)?;

    info!("Crawling {} into {}", plan.variant, output.display());
    let link_stop = Arc::clone(&stop);
    let mut controller = CrawlController::new(&config, plan.variant, driver, sink, stop);

    let report = match (plan.method, plan.pages) {
        (Method::Preset, Some(pages)) => controller.run_pages(pages),
        _ => controller.run_links(LinkSource::stdin(LINK_PROMPT, link_stop)),
    };
    Ok(report)
}

fn plan_from(cli: &Cli) -> anyhow::Result<Plan> {
    let method = match cli.method {
        Some(method) => method,
        None => {
            let answer = prompt("\n1. Ссылка уже задана\n2. Ссылка с консоли\nВведите (1/2): ")?;
            match answer.as_str() {
                "1" => Method::Preset,
                "2" => Method::Console,
                other => anyhow::bail!("method must be 1 or 2, got {:?}", other),
            }
        }
    };

    let action = match cli.action {
        Some(action) => action,
        None => parse_answer::<Action>(
            "Выберите действие:\n1. Продать (sell)\n2. Арендовать (rent)\nВведите (1/2/sell/rent): ",
        )?,
    };

    let category = match cli.category {
        Some(category) => category,
        None => parse_answer::<Category>(
            "Выберите категорию:\n1. Квартира\n2. Коммерческая недвижимость (59)\nВведите (1/2): ",
        )?,
    };

    let save_count = match cli.save_count {
        Some(n) => n,
        None => parse_answer::<usize>("Введите количество сохранений: ")?,
    };
    anyhow::ensure!(save_count >= 1, "save count must be greater than 0");

    let pages = match (method, cli.pages) {
        (Method::Console, _) => None,
        (Method::Preset, Some(n)) => Some(n),
        (Method::Preset, None) => Some(parse_answer::<u32>(
            "Введите количество страниц для парсинга: ",
        )?),
    };
    if let Some(pages) = pages {
        anyhow::ensure!(pages >= 1, "page count must be greater than 0");
    }

    Ok(Plan {
        method,
        variant: ListingVariant::new(action, category),
        save_count,
        pages,
    })
}
