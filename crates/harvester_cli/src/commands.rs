use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use engine_logging::{engine_error, engine_info, engine_warn};
use harvester_engine::{
    export_items, harvest_into, BoundedStore, ExportFormat, FeedSelectors, HarvestEvent,
    HtmlFeedExtractor, JsonFileBackend, PaginationDriver, ProgressSink, SnapshotFeed,
};
use tokio_util::sync::CancellationToken;

use crate::cli::HarvestArgs;
use crate::config::HarvestSettings;

fn open_store(settings: &HarvestSettings) -> anyhow::Result<BoundedStore> {
    Ok(BoundedStore::with_capacity(
        JsonFileBackend::new(&settings.store_path),
        settings.capacity()?,
    ))
}

/// Prints one line per iteration.
struct ConsoleSink {
    patience_threshold: u32,
}

impl ProgressSink for ConsoleSink {
    fn emit(&self, event: HarvestEvent) {
        match event {
            HarvestEvent::IterationCompleted(snapshot) => println!(
                "iteration {:>3}: {} items, patience {}/{}",
                snapshot.iteration, snapshot.items, snapshot.patience, self.patience_threshold
            ),
            HarvestEvent::Finished {
                termination,
                iterations,
                items,
            } => println!("{termination:?} after {iterations} iterations with {items} items"),
        }
    }
}

pub async fn harvest(settings: &HarvestSettings, args: &HarvestArgs) -> anyhow::Result<()> {
    let config = settings.pagination_config()?;
    let store = open_store(settings)?;
    let feed = Arc::new(
        SnapshotFeed::from_dir(&args.snapshots, args.charset.as_deref())
            .with_context(|| format!("loading snapshots from {:?}", args.snapshots))?,
    );
    let extractor = HtmlFeedExtractor::new(feed.clone(), &FeedSelectors::default())?
        .with_base_url(settings.base_url.as_deref());

    let driver = PaginationDriver::new(config, Arc::new(extractor), feed.clone(), feed)
        .with_sink(Arc::new(ConsoleSink {
            patience_threshold: config.patience_threshold,
        }));

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            engine_warn!("Interrupted; keeping what was harvested so far");
            interrupt.cancel();
        }
    });

    match harvest_into(&driver, &store, &cancel).await {
        Ok((_, merged)) => {
            println!("Store updated: {merged}");
            Ok(())
        }
        Err(unpersisted) => {
            engine_error!("{}", unpersisted);
            match export_items(
                &settings.export_dir,
                &unpersisted.outcome.items,
                ExportFormat::Json,
                Utc::now(),
            ) {
                Ok(rescue) => engine_info!(
                    "Saved {} unpersisted items to {:?}",
                    rescue.item_count,
                    rescue.output_path
                ),
                Err(err) => engine_error!("Could not save unpersisted items: {}", err),
            }
            Err(unpersisted.into())
        }
    }
}

pub fn sample(settings: &HarvestSettings) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    match store.sample_uniform()? {
        Some(item) => println!("{}", serde_json::to_string_pretty(&item)?),
        None => println!("The store is empty."),
    }
    Ok(())
}

pub fn current(settings: &HarvestSettings) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    match store.current_selection()? {
        Some(selection) => {
            println!("selected: {}", selection.selected_at.to_rfc3339());
            println!("{}", serde_json::to_string_pretty(&selection.item)?);
        }
        None => println!("Nothing selected yet."),
    }
    Ok(())
}

pub fn export(
    settings: &HarvestSettings,
    format: ExportFormat,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    let items = store.items()?;
    let dir = out.unwrap_or_else(|| settings.export_dir.clone());
    let summary = export_items(&dir, &items, format, Utc::now())?;
    println!(
        "Exported {} items to {}",
        summary.item_count,
        summary.output_path.display()
    );
    Ok(())
}

pub fn stats(settings: &HarvestSettings) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    let items = store.items()?;
    let reposts = items.iter().filter(|item| item.is_repost).count();
    println!("store:    {}", settings.store_path.display());
    println!("items:    {} / {}", items.len(), store.capacity());
    println!("reposts:  {reposts}");
    if let (Some(first), Some(last)) = (items.first(), items.last()) {
        println!("oldest:   {}", first.timestamp.to_rfc3339());
        println!("newest:   {}", last.timestamp.to_rfc3339());
    }
    Ok(())
}
