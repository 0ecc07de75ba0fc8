//! Loading the run configuration from TOML.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use toml::map::Entry;
use toml::{Table, Value};
use tracing::debug;

use mart_model::PipelineConfig;

/// Built-in defaults, overridden section by section by the file at `path`.
///
/// The result is validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let config = match path {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            let config = parse_config(&contents)
                .with_context(|| format!("parse config {}", path.display()))?;
            debug!(path = %path.display(), "loaded configuration");
            config
        }
        None => PipelineConfig::default(),
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Parse a TOML override file on top of the defaults.
///
/// Tables merge key by key, so `[policies.customers] city = "skip"` changes
/// one policy and keeps the rest; any other value replaces the default.
pub fn parse_config(contents: &str) -> Result<PipelineConfig> {
    let overrides: Table = toml::from_str(contents)?;
    let mut merged = Value::try_from(PipelineConfig::default())?;
    if let Value::Table(defaults) = &mut merged {
        merge_tables(defaults, overrides);
    }
    Ok(merged.try_into()?)
}

fn merge_tables(base: &mut Table, overrides: Table) {
    for (key, value) in overrides {
        match base.entry(key) {
            Entry::Occupied(mut slot) => match (slot.get_mut(), value) {
                (Value::Table(existing), Value::Table(nested)) => merge_tables(existing, nested),
                (existing, value) => *existing = value,
            },
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
        }
    }
}

/// Effective configuration as TOML.
pub fn render_config(config: &PipelineConfig) -> Result<String> {
    toml::to_string_pretty(config).context("serialize configuration")
}

#[cfg(test)]
mod tests {
    use mart_model::{FieldPolicy, SourceKind};

    use super::*;

    #[test]
    fn file_overrides_only_named_sections() {
        let config = parse_config(
            r#"
            [phone]
            default_country_code = "+44"

            [policies.customers]
            city = "skip"
            "#,
        )
        .unwrap();
        assert_eq!(config.phone.default_country_code, "+44");
        assert_eq!(config.policies.policy(SourceKind::Customers, "city"), &FieldPolicy::Skip);
        assert!(config.policies.policy(SourceKind::Customers, "first_name").is_required());
        config.validate().unwrap();
        assert_eq!(config.retry, PipelineConfig::default().retry);
    }

    #[test]
    fn rendered_defaults_parse_back() {
        let defaults = PipelineConfig::default();
        let rendered = render_config(&defaults).unwrap();
        assert_eq!(parse_config(&rendered).unwrap(), defaults);
    }
}
