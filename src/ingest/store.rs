//! Read-only collection of trajectories keyed by unit id.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, info};

use super::{cmapss, DataSource, IngestionError};
use crate::config::IngestionConfig;
use crate::types::{FeatureSchema, Trajectory, UnitId};

// ============================================================================
// Store
// ============================================================================

/// All trajectories of a dataset sharing one [`FeatureSchema`].
///
/// Units are kept in a `BTreeMap`, so iteration is in ascending id order.
#[derive(Debug, Clone)]
pub struct TrajectoryStore {
    schema: Arc<FeatureSchema>,
    trajectories: BTreeMap<UnitId, Trajectory>,
}

impl TrajectoryStore {
    /// Load every trajectory from `source`.
    pub fn load(source: &DataSource, config: &IngestionConfig) -> Result<Self, IngestionError> {
        let schema = Arc::new(FeatureSchema::new(
            &config.operating_columns,
            &config.sensor_columns,
        ));

        let trajectories = match source {
            DataSource::Table(path) => read_table(path, config, &schema)?,
            DataSource::Directory(dir) => read_directory(dir, config, &schema)?,
            DataSource::Cmapss(path) => cmapss::read(path, config, &schema)?,
        };

        if trajectories.is_empty() {
            return Err(IngestionError::Empty {
                path: source.path().to_path_buf(),
            });
        }

        let store = Self::assemble(schema, trajectories)?;
        info!(
            path = %source.path().display(),
            units = store.len(),
            samples = store.total_samples(),
            features = store.schema.len(),
            "Trajectories loaded"
        );
        Ok(store)
    }

    /// Build a store from trajectories already in memory.
    ///
    /// All trajectories must share the first one's schema.
    pub fn from_trajectories(
        trajectories: impl IntoIterator<Item = Trajectory>,
    ) -> Result<Self, IngestionError> {
        let trajectories: Vec<Trajectory> = trajectories.into_iter().collect();
        let schema = match trajectories.first() {
            Some(t) => Arc::clone(t.shared_schema()),
            None => {
                return Err(IngestionError::Empty {
                    path: PathBuf::from("<memory>"),
                })
            }
        };
        Self::assemble(schema, trajectories)
    }

    fn assemble(
        schema: Arc<FeatureSchema>,
        trajectories: Vec<Trajectory>,
    ) -> Result<Self, IngestionError> {
        let mut map = BTreeMap::new();
        for t in trajectories {
            if t.schema() != schema.as_ref() {
                return Err(IngestionError::SchemaMismatch {
                    unit_id: t.unit_id().clone(),
                });
            }
            let id = t.unit_id().clone();
            if map.insert(id.clone(), t).is_some() {
                return Err(IngestionError::DuplicateUnit { unit_id: id });
            }
        }
        Ok(Self {
            schema,
            trajectories: map,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn get(&self, unit: &UnitId) -> Option<&Trajectory> {
        self.trajectories.get(unit)
    }

    pub fn unit_ids(&self) -> impl Iterator<Item = &UnitId> {
        self.trajectories.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trajectory> {
        self.trajectories.values()
    }

    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    pub fn total_samples(&self) -> usize {
        self.trajectories.values().map(Trajectory::len).sum()
    }
}

// ============================================================================
// Column Mapping
// ============================================================================

/// Positions of the unit, cycle and feature columns within a row.
#[derive(Debug)]
pub(super) struct ColumnMap {
    unit: Option<usize>,
    cycle: (usize, String),
    features: Vec<(usize, String)>,
    width: usize,
}

impl ColumnMap {
    /// Resolve configured column names against a header.
    ///
    /// With `require_unit` false the unit column may be absent (per-unit files).
    pub(super) fn from_header<'h>(
        header: impl IntoIterator<Item = &'h str>,
        config: &IngestionConfig,
        path: &Path,
        require_unit: bool,
    ) -> Result<Self, IngestionError> {
        let names: Vec<&str> = header.into_iter().map(str::trim).collect();
        let width = names.len();
        let positions: HashMap<&str, usize> =
            names.iter().enumerate().map(|(i, name)| (*name, i)).collect();

        let find = |name: &str| -> Result<usize, IngestionError> {
            positions
                .get(name)
                .copied()
                .ok_or_else(|| IngestionError::MissingColumn {
                    column: name.to_string(),
                    path: path.to_path_buf(),
                })
        };

        let unit = if require_unit {
            Some(find(&config.unit_column)?)
        } else {
            positions.get(config.unit_column.as_str()).copied()
        };
        let cycle = (find(&config.cycle_column)?, config.cycle_column.clone());
        let features = config
            .operating_columns
            .iter()
            .chain(config.sensor_columns.iter())
            .map(|name| find(name).map(|i| (i, name.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            unit,
            cycle,
            features,
            width,
        })
    }

    pub(super) fn unit_index(&self) -> Option<usize> {
        self.unit
    }

    pub(super) fn width(&self) -> usize {
        self.width
    }
}

// ============================================================================
// Row Collection
// ============================================================================

#[derive(Debug, Default)]
struct UnitRows {
    cycles: Vec<u32>,
    values: Vec<f64>,
}

/// Groups parsed rows by unit, preserving file order within each unit.
pub(super) struct RowCollector<'a> {
    path: &'a Path,
    map: &'a ColumnMap,
    order: Vec<UnitId>,
    rows: HashMap<UnitId, UnitRows>,
}

impl<'a> RowCollector<'a> {
    pub(super) fn new(path: &'a Path, map: &'a ColumnMap) -> Self {
        Self {
            path,
            map,
            order: Vec::new(),
            rows: HashMap::new(),
        }
    }

    /// Parse one row's cycle and feature cells into `unit`'s buffer.
    pub(super) fn push(
        &mut self,
        unit: UnitId,
        fields: &[&str],
        line: u64,
    ) -> Result<(), IngestionError> {
        let (cycle_idx, cycle_name) = &self.map.cycle;
        let cycle_cell = fields.get(*cycle_idx).copied().unwrap_or_default();
        let cycle = parse_cycle(cycle_cell).ok_or_else(|| IngestionError::InvalidValue {
            path: self.path.to_path_buf(),
            line,
            column: cycle_name.clone(),
            value: cycle_cell.to_string(),
        })?;

        if !self.rows.contains_key(&unit) {
            self.order.push(unit.clone());
        }
        let entry = self.rows.entry(unit).or_default();
        entry.cycles.push(cycle);
        for (idx, name) in &self.map.features {
            let cell = fields.get(*idx).copied().unwrap_or_default();
            let value = parse_reading(cell).ok_or_else(|| IngestionError::InvalidValue {
                path: self.path.to_path_buf(),
                line,
                column: name.clone(),
                value: cell.to_string(),
            })?;
            entry.values.push(value);
        }
        Ok(())
    }

    /// Validate and freeze every collected unit, in first-seen order.
    pub(super) fn finish(
        mut self,
        schema: &Arc<FeatureSchema>,
        min_samples: usize,
    ) -> Result<Vec<Trajectory>, IngestionError> {
        let mut out = Vec::with_capacity(self.order.len());
        for unit in self.order {
            let rows = self.rows.remove(&unit).unwrap_or_default();
            if rows.cycles.len() < min_samples {
                return Err(IngestionError::TooShort {
                    unit_id: unit,
                    samples: rows.cycles.len(),
                    minimum: min_samples,
                });
            }
            debug!(unit = %unit, samples = rows.cycles.len(), "Unit parsed");
            out.push(Trajectory::new(
                unit,
                Arc::clone(schema),
                rows.cycles,
                rows.values,
            )?);
        }
        Ok(out)
    }
}

/// Numeric reading: empty / `nan` → NaN, `inf` / `-inf` → infinities.
pub(super) fn parse_reading(cell: &str) -> Option<f64> {
    let s = cell.trim();
    if s.is_empty() {
        return Some(f64::NAN);
    }
    s.parse::<f64>().ok()
}

/// Non-negative integral cycle number. `12.0` is accepted as `12`.
pub(super) fn parse_cycle(cell: &str) -> Option<u32> {
    let s = cell.trim();
    if let Ok(c) = s.parse::<u32>() {
        return Some(c);
    }
    let f = s.parse::<f64>().ok()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(f as u32)
    } else {
        None
    }
}

// ============================================================================
// CSV Readers
// ============================================================================

fn open_csv(path: &Path) -> Result<csv::Reader<std::fs::File>, IngestionError> {
    let file = std::fs::File::open(path).map_err(|source| IngestionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ReaderBuilder::new().trim(Trim::All).from_reader(file))
}

fn csv_error(path: &Path, source: csv::Error) -> IngestionError {
    IngestionError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn record_line(record: &StringRecord) -> u64 {
    record.position().map_or(0, csv::Position::line)
}

/// One CSV file holding every unit, keyed by the unit column.
fn read_table(
    path: &Path,
    config: &IngestionConfig,
    schema: &Arc<FeatureSchema>,
) -> Result<Vec<Trajectory>, IngestionError> {
    let mut reader = open_csv(path)?;
    let header = reader
        .headers()
        .map_err(|e| csv_error(path, e))?
        .clone();
    let map = ColumnMap::from_header(header.iter(), config, path, true)?;
    let unit_idx = map.unit_index().unwrap_or_default();

    let mut collector = RowCollector::new(path, &map);
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(path, e))?;
        let fields: Vec<&str> = record.iter().collect();
        let line = record_line(&record);
        let unit = fields.get(unit_idx).copied().unwrap_or_default();
        if unit.is_empty() {
            return Err(IngestionError::InvalidValue {
                path: path.to_path_buf(),
                line,
                column: config.unit_column.clone(),
                value: String::new(),
            });
        }
        collector.push(UnitId::from(unit), &fields, line)?;
    }
    collector.finish(schema, config.min_samples)
}

/// One CSV file per unit. The unit id is the file stem.
fn read_directory(
    dir: &Path,
    config: &IngestionConfig,
    schema: &Arc<FeatureSchema>,
) -> Result<Vec<Trajectory>, IngestionError> {
    let io_err = |source| IngestionError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(io_err)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();

    let mut out = Vec::with_capacity(files.len());
    let mut seen = std::collections::HashSet::new();
    for file in &files {
        let stem = file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let unit = UnitId::from(stem);
        if !seen.insert(unit.clone()) {
            return Err(IngestionError::DuplicateUnit { unit_id: unit });
        }

        let mut reader = open_csv(file)?;
        let header = reader.headers().map_err(|e| csv_error(file, e))?.clone();
        let map = ColumnMap::from_header(header.iter(), config, file, false)?;
        let mut collector = RowCollector::new(file, &map);
        for record in reader.records() {
            let record = record.map_err(|e| csv_error(file, e))?;
            let fields: Vec<&str> = record.iter().collect();
            collector.push(unit.clone(), &fields, record_line(&record))?;
        }
        let mut parsed = collector.finish(schema, config.min_samples)?;
        if parsed.is_empty() {
            return Err(IngestionError::TooShort {
                unit_id: unit,
                samples: 0,
                minimum: config.min_samples,
            });
        }
        out.append(&mut parsed);
    }
    Ok(out)
}
