use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct FacilityRecord {
    /// 0-based row index in the source file. Survives filtering.
    pub position: usize,
    pub state: String,
    pub county: Option<String>,
    pub operator: Option<String>,
    pub status: Option<String>,
    pub lat: Option<f64>,
    pub long: Option<f64>,
    pub pm25: Option<f64>,
    pub ozone: Option<f64>,
    pub no2: Option<f64>,
    pub facility_size_sq_ft: Option<f64>,
}

impl FacilityRecord {
    pub fn reading(&self, pollutant: Pollutant) -> Option<f64> {
        match pollutant {
            Pollutant::Pm25 => self.pm25,
            Pollutant::Ozone => self.ozone,
            Pollutant::No2 => self.no2,
        }
    }

    /// (long, lat) when both coordinates are present.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.long, self.lat) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        }
    }
}

/// The fixed set of readings the pollutant dropdown can switch between.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum Pollutant {
    #[default]
    #[serde(rename = "pm2.5__local_conditions")]
    #[value(name = "pm2.5__local_conditions")]
    Pm25,
    #[serde(rename = "ozone")]
    #[value(name = "ozone")]
    Ozone,
    #[serde(rename = "nitrogen_dioxide_no2")]
    #[value(name = "nitrogen_dioxide_no2")]
    No2,
}

impl Pollutant {
    pub const ALL: [Pollutant; 3] = [Pollutant::Pm25, Pollutant::Ozone, Pollutant::No2];

    pub fn column(self) -> &'static str {
        match self {
            Pollutant::Pm25 => "pm2.5__local_conditions",
            Pollutant::Ozone => "ozone",
            Pollutant::No2 => "nitrogen_dioxide_no2",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Pollutant::Pm25 => "PM2.5",
            Pollutant::Ozone => "Ozone",
            Pollutant::No2 => "NO2",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSelection {
    pub states: Vec<String>,
    pub operators: Vec<String>,
    pub statuses: Vec<String>,
    pub pollutant: Pollutant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_names_match_column_names() {
        for p in Pollutant::ALL {
            assert_eq!(Pollutant::from_str(p.column(), false), Ok(p));
        }
        assert_eq!(
            Pollutant::from_str("PM2.5__Local_Conditions", true),
            Ok(Pollutant::Pm25)
        );
        assert!(Pollutant::from_str("pm10", true).is_err());
    }

    #[test]
    fn selection_fields_default_when_absent() {
        let selection: FilterSelection =
            serde_json::from_str(r#"{"states": ["CA"], "pollutant": "ozone"}"#).unwrap();
        assert_eq!(selection.states, vec!["CA".to_string()]);
        assert!(selection.operators.is_empty());
        assert!(selection.statuses.is_empty());
        assert_eq!(selection.pollutant, Pollutant::Ozone);

        let empty: FilterSelection = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.pollutant, Pollutant::Pm25);
    }
}
