use std::path::Path;

use serde::de::DeserializeOwned;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{Catalog, CatalogEntry, CheckoutEvent},
};

use super::{fixtures, ReferenceData};

/// Loads the reference tables named by the configuration
///
/// Either path may be unset, in which case that table comes from the demo data.
/// Schema problems surface here, before any strategy runs.
pub fn load_reference_data(config: &Config) -> AppResult<ReferenceData> {
    let catalog = match &config.catalog_path {
        Some(path) => load_catalog(path)?,
        None => {
            tracing::info!("No CATALOG_PATH configured, using demo catalog");
            fixtures::demo_catalog()
        }
    };

    let checkouts = match &config.checkouts_path {
        Some(path) => load_checkouts(path)?,
        None => {
            tracing::info!("No CHECKOUTS_PATH configured, using demo checkouts");
            fixtures::demo_checkouts()
        }
    };

    warn_on_unknown_books(&catalog, &checkouts);

    Ok(ReferenceData::build(catalog, checkouts))
}

pub fn load_catalog(path: &Path) -> AppResult<Catalog> {
    let raw = std::fs::read_to_string(path)?;
    parse_catalog(&raw, &path.display().to_string())
}

pub fn load_checkouts(path: &Path) -> AppResult<Vec<CheckoutEvent>> {
    let raw = std::fs::read_to_string(path)?;
    parse_checkouts(&raw, &path.display().to_string())
}

/// Parses a JSON array of catalog rows
pub fn parse_catalog(raw: &str, source: &str) -> AppResult<Catalog> {
    let entries: Vec<CatalogEntry> = parse_rows(raw, source)?;

    if let Some(entry) = entries.iter().find(|entry| entry.book_id.0.is_empty()) {
        return Err(AppError::Schema(format!(
            "{}: empty book_id for title {:?}",
            source, entry.title
        )));
    }

    let catalog = Catalog::new(entries).map_err(|duplicate| {
        AppError::Schema(format!("{}: duplicate book_id {}", source, duplicate))
    })?;

    tracing::info!(source, books = catalog.len(), "Catalog loaded");
    Ok(catalog)
}

/// Parses a JSON array of checkout rows
pub fn parse_checkouts(raw: &str, source: &str) -> AppResult<Vec<CheckoutEvent>> {
    let events: Vec<CheckoutEvent> = parse_rows(raw, source)?;

    if let Some(position) = events
        .iter()
        .position(|event| event.user_id.0.is_empty() || event.book_id.0.is_empty())
    {
        return Err(AppError::Schema(format!(
            "{}: row {} has an empty user_id or book_id",
            source, position
        )));
    }

    tracing::info!(source, checkouts = events.len(), "Checkouts loaded");
    Ok(events)
}

fn parse_rows<T: DeserializeOwned>(raw: &str, source: &str) -> AppResult<Vec<T>> {
    serde_json::from_str(raw).map_err(|e| AppError::Schema(format!("{}: {}", source, e)))
}

fn warn_on_unknown_books(catalog: &Catalog, checkouts: &[CheckoutEvent]) {
    let unknown = checkouts
        .iter()
        .filter(|event| !catalog.contains(&event.book_id))
        .count();

    if unknown > 0 {
        tracing::warn!(
            count = unknown,
            "Checkouts reference books missing from the catalog"
        );
    }
}
