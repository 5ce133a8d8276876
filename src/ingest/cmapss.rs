//! NASA C-MAPSS text reader.
//!
//! Each line holds `unit cycle setting_1 setting_2 setting_3 s_1 .. s_21`
//! separated by whitespace, with no header. Positional columns are named so
//! the configured operating/sensor columns can select a subset (C-MAPSS
//! studies usually drop the constant sensors).

use std::path::Path;
use std::sync::Arc;

use super::store::{parse_cycle, ColumnMap, RowCollector};
use super::IngestionError;
use crate::config::{defaults, IngestionConfig};
use crate::types::{FeatureSchema, Trajectory, UnitId};

/// Header the positional layout is mapped to.
fn positional_header(config: &IngestionConfig) -> Vec<String> {
    let mut names = vec![config.unit_column.clone(), config.cycle_column.clone()];
    names.extend((1..=defaults::CMAPSS_OPERATING_COLUMNS).map(|i| format!("setting_{i}")));
    names.extend((1..=defaults::CMAPSS_SENSOR_COLUMNS).map(|i| format!("s_{i}")));
    names
}

pub(super) fn read(
    path: &Path,
    config: &IngestionConfig,
    schema: &Arc<FeatureSchema>,
) -> Result<Vec<Trajectory>, IngestionError> {
    let text = std::fs::read_to_string(path).map_err(|source| IngestionError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let header = positional_header(config);
    let map = ColumnMap::from_header(header.iter().map(String::as_str), config, path, true)?;
    let mut collector = RowCollector::new(path, &map);

    for (i, line) in text.lines().enumerate() {
        let line_no = i as u64 + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() != map.width() {
            return Err(IngestionError::RaggedRow {
                path: path.to_path_buf(),
                line: line_no,
                expected: map.width(),
                found: fields.len(),
            });
        }
        // Units are integers in the published files; "1.0" and "1" name the same unit
        let unit = match parse_cycle(fields[0]) {
            Some(n) => UnitId::from(n),
            None => UnitId::from(fields[0]),
        };
        collector.push(unit, &fields, line_no)?;
    }

    collector.finish(schema, config.min_samples)
}
