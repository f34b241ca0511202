use crate::types::{FacilityRecord, Pollutant};
use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::path::Path;
use tracing::info;

pub const FACILITY_SIZE_COLUMN: &str = "facility_size_sq_ft";

const REQUIRED_COLUMNS: [&str; 8] = [
    "state",
    "operator",
    "status",
    "lat",
    "long",
    "pm2.5__local_conditions",
    "ozone",
    "nitrogen_dioxide_no2",
];

/// Immutable snapshot of the facility table.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub records: Vec<FacilityRecord>,
    has_facility_size: bool,
}

impl Dataset {
    pub fn new(columns: Vec<String>, records: Vec<FacilityRecord>) -> Self {
        let has_facility_size = columns.iter().any(|c| c == FACILITY_SIZE_COLUMN);
        Self {
            columns,
            records,
            has_facility_size,
        }
    }

    pub fn has_facility_size(&self) -> bool {
        self.has_facility_size
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn load_dataset(path: &Path) -> Result<Dataset> {
    info!("Loading facilities from {:?}", path);

    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path))?;
    let mut rdr = ReaderBuilder::new().from_reader(file);

    let columns: Vec<String> = rdr
        .headers()
        .with_context(|| format!("Failed to read CSV header: {:?}", path))?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let mut col_indices: HashMap<&str, usize> = HashMap::new();
    for (i, h) in columns.iter().enumerate() {
        if col_indices.insert(h.as_str(), i).is_some() {
            return Err(anyhow!("Duplicate column '{}' in {:?} after lowercasing headers", h, path));
        }
    }

    for required in REQUIRED_COLUMNS {
        if !col_indices.contains_key(required) {
            return Err(anyhow!("Required column '{}' not found in {:?}", required, path));
        }
    }

    let index = |name: &str| col_indices.get(name).copied();
    let layout = ColumnLayout {
        state: index("state"),
        county: index("county"),
        operator: index("operator"),
        status: index("status"),
        lat: index("lat"),
        long: index("long"),
        pm25: index(Pollutant::Pm25.column()),
        ozone: index(Pollutant::Ozone.column()),
        no2: index(Pollutant::No2.column()),
        facility_size: index(FACILITY_SIZE_COLUMN),
    };

    let mut records = Vec::new();
    for (position, result) in rdr.records().enumerate() {
        let record = result
            .with_context(|| format!("Malformed record {} in {:?}", position + 1, path))?;
        records.push(layout.facility(position, &record));
    }

    let dataset = Dataset::new(columns, records);
    info!(
        "Loaded {} facilities (facility size column present: {})",
        dataset.len(),
        dataset.has_facility_size()
    );

    Ok(dataset)
}

struct ColumnLayout {
    state: Option<usize>,
    county: Option<usize>,
    operator: Option<usize>,
    status: Option<usize>,
    lat: Option<usize>,
    long: Option<usize>,
    pm25: Option<usize>,
    ozone: Option<usize>,
    no2: Option<usize>,
    facility_size: Option<usize>,
}

impl ColumnLayout {
    fn facility(&self, position: usize, record: &StringRecord) -> FacilityRecord {
        // Text is kept as-is; only an empty cell counts as missing.
        let text = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        // Unparsable cells count as missing readings.
        let number = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .and_then(|s| s.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
        };

        FacilityRecord {
            position,
            state: text(self.state).unwrap_or_default(),
            county: text(self.county),
            operator: text(self.operator),
            status: text(self.status),
            lat: number(self.lat),
            long: number(self.long),
            pm25: number(self.pm25),
            ozone: number(self.ozone),
            no2: number(self.no2),
            facility_size_sq_ft: number(self.facility_size),
        }
    }
}

/// Columns that back a categorical dropdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterColumn {
    State,
    Operator,
    Status,
}

impl FilterColumn {
    fn value(self, record: &FacilityRecord) -> Option<&str> {
        match self {
            FilterColumn::State => Some(record.state.as_str()).filter(|s| !s.is_empty()),
            FilterColumn::Operator => record.operator.as_deref(),
            FilterColumn::Status => record.status.as_deref(),
        }
    }
}

/// Sorted distinct values of `column`. Missing values show up as `""`
/// unless `drop_missing` is set.
pub fn distinct_values(dataset: &Dataset, column: FilterColumn, drop_missing: bool) -> Vec<String> {
    let mut values = BTreeSet::new();
    for record in &dataset.records {
        match column.value(record) {
            Some(v) => {
                values.insert(v);
            }
            None if !drop_missing => {
                values.insert("");
            }
            None => {}
        }
    }
    values.into_iter().map(str::to_string).collect()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DropdownOption {
    pub label: String,
    pub value: String,
}

impl DropdownOption {
    fn same(value: String) -> Self {
        Self {
            label: value.clone(),
            value,
        }
    }
}

/// Choices for the four filter controls. Computed once at startup.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FilterOptions {
    pub states: Vec<DropdownOption>,
    pub operators: Vec<DropdownOption>,
    pub statuses: Vec<DropdownOption>,
    pub pollutants: Vec<DropdownOption>,
}

impl FilterOptions {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let options = |column: FilterColumn, drop_missing: bool| -> Vec<DropdownOption> {
            distinct_values(dataset, column, drop_missing)
                .into_iter()
                .map(DropdownOption::same)
                .collect()
        };

        Self {
            states: options(FilterColumn::State, false),
            operators: options(FilterColumn::Operator, true),
            statuses: options(FilterColumn::Status, true),
            pollutants: Pollutant::ALL
                .iter()
                .map(|p| DropdownOption {
                    label: p.label().to_string(),
                    value: p.column().to_string(),
                })
                .collect(),
        }
    }
}
