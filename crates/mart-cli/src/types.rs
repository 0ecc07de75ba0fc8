use std::path::PathBuf;

use mart_model::EntityType;
use mart_report::QualityReport;

#[derive(Debug)]
pub struct RunSummary {
    pub data_dir: PathBuf,
    /// `None` for a dry run.
    pub output_dir: Option<PathBuf>,
    pub report: QualityReport,
    pub tables: Vec<TableSummary>,
    pub written: Vec<PathBuf>,
    pub issue_count: usize,
    /// Set when the run stopped early; `report` is then partial.
    pub failure: Option<String>,
}

#[derive(Debug)]
pub struct TableSummary {
    pub entity: EntityType,
    pub rows: usize,
    pub keys: usize,
}
