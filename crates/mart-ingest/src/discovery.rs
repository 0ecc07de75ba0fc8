//! Source file discovery.

use std::path::{Path, PathBuf};

use mart_model::SourceKind;

use crate::error::{IngestError, Result};

/// Paths of the three raw sources of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePaths {
    pub customers: PathBuf,
    pub products: PathBuf,
    pub sales: PathBuf,
}

impl SourcePaths {
    pub fn path(&self, kind: SourceKind) -> &Path {
        match kind {
            SourceKind::Customers => &self.customers,
            SourceKind::Products => &self.products,
            SourceKind::Sales => &self.sales,
        }
    }

    /// File name for reporting, falling back to the conventional name.
    pub fn file_name(&self, kind: SourceKind) -> String {
        self.path(kind)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_else(|| kind.default_file_name())
            .to_string()
    }
}

/// Lists all CSV files in a directory.
///
/// Returns files sorted by filename.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(IngestError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|e| IngestError::DirectoryRead {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry_result in entries {
        let entry = entry_result.map_err(|e| IngestError::DirectoryRead {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Find the customers, products and sales files in a data directory.
///
/// The conventional name (`customers_raw.csv`, ...) wins; otherwise the first
/// file whose stem starts with the source name (case-insensitive) is used.
pub fn discover_sources(dir: &Path) -> Result<SourcePaths> {
    let files = list_csv_files(dir)?;
    let find = |kind: SourceKind| -> Result<PathBuf> {
        let exact = files.iter().find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.eq_ignore_ascii_case(kind.default_file_name()))
        });
        let prefixed = || {
            files.iter().find(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .is_some_and(|stem| stem.to_ascii_lowercase().starts_with(kind.as_str()))
            })
        };
        exact
            .or_else(prefixed)
            .cloned()
            .ok_or_else(|| IngestError::MissingSource {
                kind,
                dir: dir.to_path_buf(),
            })
    };
    Ok(SourcePaths {
        customers: find(SourceKind::Customers)?,
        products: find(SourceKind::Products)?,
        sales: find(SourceKind::Sales)?,
    })
}
