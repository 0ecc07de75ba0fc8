//! CSV export of loaded tables.

use std::fs;
use std::path::{Path, PathBuf};

use csv::Writer;
use serde::Serialize;
use tracing::info;

use mart_model::EntityType;

use crate::error::{LoadError, Result};
use crate::storage::InMemoryStore;

fn write_table<'a, T, I>(dir: &Path, entity: EntityType, rows: I) -> Result<PathBuf>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let path = dir.join(format!("{}.csv", entity.table_name()));
    let export_error = |source| LoadError::Export {
        path: path.clone(),
        source,
    };
    let mut writer = Writer::from_path(&path).map_err(export_error)?;
    let mut count = 0usize;
    for row in rows {
        writer.serialize(row).map_err(export_error)?;
        count += 1;
    }
    writer
        .flush()
        .map_err(|e| export_error(csv::Error::from(e)))?;
    info!(table = entity.table_name(), rows = count, path = %path.display(), "exported table");
    Ok(path)
}

/// Write `customers.csv`, `products.csv`, `orders.csv` and `order_items.csv`
/// into `dir`, creating it when needed.
pub fn export_tables(store: &InMemoryStore, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|source| LoadError::OutputDir {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(vec![
        write_table(dir, EntityType::Customer, store.customers())?,
        write_table(dir, EntityType::Product, store.products())?,
        write_table(dir, EntityType::Order, store.orders())?,
        write_table(dir, EntityType::OrderItem, store.order_items())?,
    ])
}
