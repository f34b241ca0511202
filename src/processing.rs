use crate::config::MapConfig;
use crate::data::Dataset;
use crate::render::{BarSpec, MapSpec, ScatterSpec};
use crate::types::{FacilityRecord, FilterSelection};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// The three charts for one filter selection, all derived from the same rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSet {
    pub selection: FilterSelection,
    pub row_count: usize,
    pub map: MapSpec,
    pub scatter: ScatterSpec,
    pub bar: BarSpec,
}

/// Membership test for one dropdown. An empty selection accepts everything.
struct Membership<'a>(Option<HashSet<&'a str>>);

impl<'a> Membership<'a> {
    fn new(selected: &'a [String]) -> Self {
        if selected.is_empty() {
            Membership(None)
        } else {
            Membership(Some(selected.iter().map(String::as_str).collect()))
        }
    }

    fn accepts(&self, value: Option<&str>) -> bool {
        match &self.0 {
            None => true,
            Some(set) => value.is_some_and(|v| set.contains(v)),
        }
    }
}

/// Rows passing all three membership filters, in source order.
pub fn filter_records<'a>(dataset: &'a Dataset, selection: &FilterSelection) -> Vec<&'a FacilityRecord> {
    let states = Membership::new(&selection.states);
    let operators = Membership::new(&selection.operators);
    let statuses = Membership::new(&selection.statuses);

    dataset
        .records
        .iter()
        .filter(|r| states.accepts(Some(r.state.as_str())))
        .filter(|r| operators.accepts(r.operator.as_deref()))
        .filter(|r| statuses.accepts(r.status.as_deref()))
        .collect()
}

pub fn update(dataset: &Dataset, selection: &FilterSelection, map: &MapConfig) -> ChartSet {
    let rows = filter_records(dataset, selection);
    debug!(
        states = ?selection.states,
        operators = ?selection.operators,
        statuses = ?selection.statuses,
        pollutant = selection.pollutant.column(),
        rows = rows.len(),
        "Recomputing charts"
    );

    let has_size = dataset.has_facility_size();
    ChartSet {
        selection: selection.clone(),
        row_count: rows.len(),
        map: MapSpec::build(&rows, selection.pollutant, has_size, map),
        scatter: ScatterSpec::build(&rows, selection.pollutant, has_size),
        bar: BarSpec::build(&rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::MISSING_READING_COLOR;
    use crate::types::Pollutant;

    fn record(position: usize, state: &str, operator: &str, status: &str, pm25: f64) -> FacilityRecord {
        FacilityRecord {
            position,
            state: state.to_string(),
            county: None,
            operator: Some(operator.to_string()),
            status: Some(status.to_string()),
            lat: Some(30.0),
            long: Some(-100.0),
            pm25: Some(pm25),
            ozone: None,
            no2: None,
            facility_size_sq_ft: None,
        }
    }

    fn sample() -> Dataset {
        let columns = [
            "state",
            "operator",
            "status",
            "lat",
            "long",
            "pm2.5__local_conditions",
            "ozone",
            "nitrogen_dioxide_no2",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();
        Dataset::new(
            columns,
            vec![
                record(0, "CA", "Acme", "Active", 12.0),
                record(1, "CA", "Beta", "Active", 30.0),
                record(2, "TX", "Acme", "Retired", 5.0),
            ],
        )
    }

    fn select(states: &[&str], operators: &[&str], statuses: &[&str]) -> FilterSelection {
        let owned = |v: &[&str]| -> Vec<String> { v.iter().map(|s| s.to_string()).collect() };
        FilterSelection {
            states: owned(states),
            operators: owned(operators),
            statuses: owned(statuses),
            pollutant: Pollutant::Pm25,
        }
    }

    #[test]
    fn state_filter_drives_all_three_charts() {
        let dataset = sample();
        let charts = update(&dataset, &select(&["CA"], &[], &[]), &MapConfig::default());

        assert_eq!(charts.row_count, 2);
        assert_eq!(charts.map.points.len(), 2);
        assert_eq!(charts.scatter.points.len(), 2);
        let bars: Vec<_> = charts.bar.bars.iter().map(|b| (b.state.as_str(), b.count)).collect();
        assert_eq!(bars, vec![("CA", 2)]);

        let operators: Vec<_> = charts
            .scatter
            .points
            .iter()
            .map(|p| p.category.as_deref())
            .collect();
        assert_eq!(operators, vec![Some("Acme"), Some("Beta")]);
        assert_ne!(charts.scatter.points[0].color, charts.scatter.points[1].color);
    }

    #[test]
    fn unmatched_selection_yields_empty_charts() {
        let dataset = sample();
        let charts = update(&dataset, &select(&[], &["Nonexistent"], &[]), &MapConfig::default());

        assert_eq!(charts.row_count, 0);
        assert!(charts.bar.bars.is_empty());
        assert!(charts.map.points.is_empty());
        assert!(charts.scatter.points.is_empty());
        assert!(serde_json::to_string(&charts).is_ok());
    }

    #[test]
    fn filters_compose_conjunctively() {
        let dataset = sample();
        let selection = select(&["CA", "TX"], &["Acme"], &["Active", "Retired"]);
        let positions: Vec<_> = filter_records(&dataset, &selection)
            .iter()
            .map(|r| r.position)
            .collect();
        assert_eq!(positions, vec![0, 2]);

        let selection = select(&["TX"], &["Acme"], &["Active"]);
        assert!(filter_records(&dataset, &selection).is_empty());
    }

    #[test]
    fn empty_selection_means_no_constraint() {
        let dataset = sample();
        assert_eq!(filter_records(&dataset, &select(&[], &[], &[])).len(), 3);
        assert_eq!(
            filter_records(&dataset, &select(&["TX"], &[], &[])),
            filter_records(&dataset, &select(&["TX"], &[], &[])),
        );
    }

    #[test]
    fn missing_operator_never_matches_a_selection() {
        let mut dataset = sample();
        dataset.records[0].operator = None;
        let rows = filter_records(&dataset, &select(&[], &["Acme"], &[]));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].position, 2);
        assert_eq!(filter_records(&dataset, &select(&[], &[], &[])).len(), 3);
    }

    #[test]
    fn bar_counts_sum_to_surviving_rows() {
        let dataset = sample();
        for selection in [
            select(&[], &[], &[]),
            select(&["CA"], &[], &[]),
            select(&[], &["Acme"], &[]),
            select(&[], &[], &["Retired"]),
        ] {
            let charts = update(&dataset, &selection, &MapConfig::default());
            assert_eq!(charts.bar.total(), charts.row_count);
            assert_eq!(charts.scatter.points.len(), charts.row_count);
            assert_eq!(charts.map.points.len() + charts.map.unmapped, charts.row_count);
        }
    }

    #[test]
    fn update_is_idempotent() {
        let dataset = sample();
        let selection = select(&["CA"], &["Acme", "Beta"], &[]);
        let first = update(&dataset, &selection, &MapConfig::default());
        let second = update(&dataset, &selection, &MapConfig::default());
        assert_eq!(first, second);
    }

    #[test]
    fn pollutant_switch_changes_bindings_only() {
        let dataset = sample();
        let mut selection = select(&[], &[], &[]);
        selection.pollutant = Pollutant::Ozone;
        let charts = update(&dataset, &selection, &MapConfig::default());

        assert_eq!(charts.map.color.field, "ozone");
        assert_eq!(charts.scatter.y_label, "ozone");
        assert!(charts.scatter.points.iter().all(|p| p.y.is_none()));
        assert!(charts.map.points.iter().all(|p| p.color == MISSING_READING_COLOR));
        assert_eq!(charts.row_count, 3);
    }
}
