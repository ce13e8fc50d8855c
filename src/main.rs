use forza_cars_scraper::cars::{self, RowOutcome};
use forza_cars_scraper::config::{Config, CARS_URL};
use forza_cars_scraper::error::ScrapeError;
use forza_cars_scraper::fetch;
use forza_cars_scraper::persistent::{Persistent, SnapshotOutcome};
use scraper::Html;
use tracing::{debug, error, info, warn};
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
                "info,html5ever=error,selectors=error,hyper=warn,reqwest=info,sqlx=warn".into()
            }),
        )
        .with(ErrorLayer::default())
        .init();

    info!("Starting the Forza Horizon 4 car scraper");

    let config = Config::from_env();
    let persistent = match Persistent::connect(&config).await {
        Ok(p) => p,
        Err(e) => {
            error!("Could not connect to the database: {}", e);
            return Err(e.into());
        }
    };

    let result = run(&persistent).await;

    persistent.close().await;
    info!("Database connection closed");

    result.map_err(Into::into)
}

async fn run(persistent: &Persistent) -> Result<(), ScrapeError> {
    let html = match fetch::fetch_page(CARS_URL).await {
        Ok(html) => html,
        Err(e) => {
            error!("Failed to fetch the car list page: {}", e);
            return Err(e);
        }
    };

    let outcomes = {
        let doc = Html::parse_document(&html);
        match cars::locate_table(&doc) {
            Ok((table, selector)) => {
                debug!("Located the car table with `{}`", selector);
                cars::parse_rows(table)
            }
            // Degrades to an empty batch; the no-op write below keeps the
            // previous snapshot intact.
            Err(e) => {
                error!("{}", e);
                Vec::new()
            }
        }
    };
    info!("Found {} data rows", outcomes.len());

    let mut batch = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome {
            RowOutcome::Parsed(car) => {
                debug!("Parsed {}", car);
                batch.push(car);
            }
            RowOutcome::Skipped { row, reason } => warn!("Skipped row {}: {}", row, reason),
        }
    }
    info!("Extracted {} cars", batch.len());

    match persistent.replace_all(&batch).await {
        Ok(SnapshotOutcome::Replaced(n)) => info!("Saved {} cars to the database", n),
        Ok(SnapshotOutcome::Skipped) => {
            warn!("Nothing extracted, keeping the existing snapshot");
        }
        Err(e) => {
            error!("Failed to save the snapshot: {}", e);
            return Err(e);
        }
    }

    Ok(())
}
