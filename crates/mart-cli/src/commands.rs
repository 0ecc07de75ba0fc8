use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, info_span};

use mart_cli::config::{load_config, render_config};
use mart_cli::{Pipeline, RunOutcome, Sources};
use mart_ingest::discover_sources;
use mart_load::{InMemoryStore, export_tables};
use mart_model::EntityType;

use crate::cli::{ConfigArgs, RunArgs};
use crate::types::{RunSummary, TableSummary};

pub fn show_config(args: &ConfigArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    print!("{}", render_config(&config)?);
    Ok(())
}

pub fn run_etl(args: &RunArgs) -> Result<RunSummary> {
    let span = info_span!("run", data_dir = %args.data_dir.display());
    let _guard = span.enter();
    let started = Instant::now();

    let config = load_config(args.config.as_deref())?;
    let paths = discover_sources(&args.data_dir).context("discover sources")?;
    for kind in mart_model::SourceKind::ALL {
        info!(source = %kind, file = %paths.file_name(kind), "found source");
    }
    let sources = Sources::open(&paths).context("open sources")?;
    let pipeline = Pipeline::new(config).context("invalid configuration")?;

    let output_dir = (!args.dry_run).then(|| {
        args.output_dir
            .clone()
            .unwrap_or_else(|| args.data_dir.join("output"))
    });

    let outcome = match pipeline.run(sources, InMemoryStore::new()) {
        Ok(outcome) => outcome,
        Err(failure) => {
            return Ok(RunSummary {
                data_dir: args.data_dir.clone(),
                output_dir: None,
                report: failure.report,
                tables: Vec::new(),
                written: Vec::new(),
                issue_count: failure.issues.len(),
                failure: Some(failure.error.to_string()),
            });
        }
    };

    let mut written = Vec::new();
    if let Some(dir) = &output_dir {
        written = write_outputs(&outcome, dir)?;
        if let Some(path) = &args.report_json {
            let json = outcome.report.to_json().context("serialize quality report")?;
            fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
            written.push(path.clone());
        }
    }

    let tables = EntityType::LOAD_ORDER
        .iter()
        .map(|&entity| TableSummary {
            entity,
            rows: outcome.store.row_count(entity),
            keys: outcome.keys.count(entity),
        })
        .collect();
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        files = written.len(),
        "finished"
    );

    Ok(RunSummary {
        data_dir: args.data_dir.clone(),
        output_dir,
        issue_count: outcome.issues.len(),
        report: outcome.report,
        tables,
        written,
        failure: None,
    })
}

/// Tables, the text report and the issue log.
fn write_outputs(outcome: &RunOutcome<InMemoryStore>, dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut written = export_tables(&outcome.store, dir).context("export tables")?;

    let report_path = dir.join("data_quality_report.txt");
    fs::write(&report_path, outcome.report.render_text())
        .with_context(|| format!("write {}", report_path.display()))?;
    written.push(report_path);

    let issues_path = dir.join("issues.json");
    let issues = serde_json::to_string_pretty(&outcome.issues).context("serialize issues")?;
    fs::write(&issues_path, issues).with_context(|| format!("write {}", issues_path.display()))?;
    written.push(issues_path);
    Ok(written)
}
