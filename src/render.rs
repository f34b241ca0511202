use crate::config::MapConfig;
use crate::data::FACILITY_SIZE_COLUMN;
use crate::types::{FacilityRecord, Pollutant};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::{MultiPoint, Point};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::Serialize;
use std::collections::BTreeMap;

const MAP_TITLE: &str = "Data Centers Across the U.S.";
const SCATTER_TITLE: &str = "Pollution vs Facility Size";
const BAR_TITLE: &str = "Number of Data Centers per State";

const COLOR_SCHEME: &str = "Viridis";
const MISSING_CATEGORY_COLOR: &str = "#9e9e9e";
/// Marker colour for mapped facilities without a reading for the pollutant.
pub const MISSING_READING_COLOR: &str = "#bdbdbd";
const MISSING_CATEGORY_LABEL: &str = "Unknown";

// Geographic centre of the contiguous U.S., used when nothing is mappable.
const DEFAULT_CENTER: (f64, f64) = (-98.5795, 39.8283);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoverField {
    pub label: String,
    pub value: Option<String>,
}

impl HoverField {
    fn new(label: &str, value: Option<String>) -> Self {
        Self {
            label: label.to_string(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hover {
    pub title: Option<String>,
    pub fields: Vec<HoverField>,
    /// HTML-escaped hover markup, ready for the chart renderer.
    pub text: String,
}

impl Hover {
    fn new(title: Option<String>, fields: Vec<HoverField>) -> Self {
        let mut lines: Vec<String> = fields
            .iter()
            .map(|f| {
                format!(
                    "{}: {}",
                    escape_html(&f.label),
                    f.value.as_deref().map(escape_html).unwrap_or_default()
                )
            })
            .collect();
        if let Some(title) = &title {
            lines.insert(0, format!("<b>{}</b>", escape_html(title)));
        }

        Self {
            title,
            fields,
            text: lines.join("<br>"),
        }
    }
}

/// Continuous colour binding for the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorScale {
    pub field: String,
    pub label: String,
    pub scheme: String,
    /// `[min, max]` of the present readings, `None` when there are none.
    pub domain: Option<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeEncoding {
    pub field: String,
    pub domain: Option<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Viewport {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: u8,
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub position: usize,
    pub lat: f64,
    pub lon: f64,
    pub value: Option<f64>,
    pub color: String,
    pub size: Option<f64>,
    pub hover: Hover,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapSpec {
    pub title: String,
    pub color: ColorScale,
    /// Absent when the dataset has no facility size column.
    pub size: Option<SizeEncoding>,
    pub viewport: Viewport,
    pub points: Vec<MapPoint>,
    /// Rows that passed the filters but lack coordinates.
    pub unmapped: usize,
}

impl MapSpec {
    pub fn build(
        rows: &[&FacilityRecord],
        pollutant: Pollutant,
        has_facility_size: bool,
        map: &MapConfig,
    ) -> Self {
        let mut unmapped = 0;
        let mut located = Vec::with_capacity(rows.len());
        for row in rows {
            match row.coordinates() {
                Some(coords) => located.push((*row, coords)),
                None => unmapped += 1,
            }
        }

        let domain = value_domain(located.iter().map(|(row, _)| row.reading(pollutant)));
        let size_domain = if has_facility_size {
            value_domain(located.iter().map(|(row, _)| row.facility_size_sq_ft))
        } else {
            None
        };

        let points: Vec<MapPoint> = located
            .iter()
            .map(|(row, (lon, lat))| {
                let value = row.reading(pollutant);
                MapPoint {
                    position: row.position,
                    lat: *lat,
                    lon: *lon,
                    value,
                    color: value
                        .map(|v| viridis_hex(v, domain))
                        .unwrap_or_else(|| MISSING_READING_COLOR.to_string()),
                    size: if has_facility_size { row.facility_size_sq_ft } else { None },
                    hover: Hover::new(
                        row.operator.clone(),
                        vec![
                            HoverField::new("state", Some(row.state.clone())),
                            HoverField::new("county", row.county.clone()),
                            HoverField::new(pollutant.label(), value.map(|v| v.to_string())),
                            HoverField::new("status", row.status.clone()),
                        ],
                    ),
                }
            })
            .collect();

        let multi_point: MultiPoint<f64> = points.iter().map(|p| Point::new(p.lon, p.lat)).collect();
        let (center_lon, center_lat) = multi_point
            .bounding_rect()
            .map(|rect| rect.center().x_y())
            .unwrap_or(DEFAULT_CENTER);

        Self {
            title: MAP_TITLE.to_string(),
            color: ColorScale {
                field: pollutant.column().to_string(),
                label: pollutant.label().to_string(),
                scheme: COLOR_SCHEME.to_string(),
                domain,
            },
            size: has_facility_size.then(|| SizeEncoding {
                field: FACILITY_SIZE_COLUMN.to_string(),
                domain: size_domain,
            }),
            viewport: Viewport {
                center_lat,
                center_lon,
                zoom: map.zoom,
                style: map.style.clone(),
            },
            points,
            unmapped,
        }
    }

    /// The map layer as point features, one per mapped facility.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .points
            .iter()
            .map(|point| {
                let mut properties = JsonObject::new();
                properties.insert("position".to_string(), point.position.into());
                properties.insert("operator".to_string(), point.hover.title.clone().into());
                for field in &point.hover.fields {
                    properties.insert(field.label.clone(), field.value.clone().into());
                }
                properties.insert(self.color.field.clone(), point.value.into());
                properties.insert("color".to_string(), point.color.clone().into());
                if let Some(size) = &self.size {
                    properties.insert(size.field.clone(), point.size.into());
                }

                Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(Value::Point(vec![point.lon, point.lat]))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum XAxis {
    FacilitySize,
    /// Degenerate default when the dataset has no facility size column:
    /// x is the row's ordinal position in the source file and carries no
    /// measurement.
    RowPosition,
}

impl XAxis {
    pub fn label(self) -> &'static str {
        match self {
            XAxis::FacilitySize => FACILITY_SIZE_COLUMN,
            XAxis::RowPosition => "row position",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub position: usize,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub category: Option<String>,
    /// Index into `ScatterSpec::legend`.
    pub series: usize,
    pub color: String,
    pub hover: Hover,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterSpec {
    pub title: String,
    pub x_axis: XAxis,
    pub x_label: String,
    pub y_label: String,
    pub legend: Vec<LegendEntry>,
    pub points: Vec<ScatterPoint>,
}

impl ScatterSpec {
    pub fn build(rows: &[&FacilityRecord], pollutant: Pollutant, has_facility_size: bool) -> Self {
        let x_axis = if has_facility_size {
            XAxis::FacilitySize
        } else {
            XAxis::RowPosition
        };

        let mut palette = CategoryPalette::default();
        let points: Vec<ScatterPoint> = rows
            .iter()
            .map(|row| {
                let (series, color) = palette.assign(row.operator.as_deref());
                ScatterPoint {
                    position: row.position,
                    x: match x_axis {
                        XAxis::FacilitySize => row.facility_size_sq_ft,
                        XAxis::RowPosition => Some(row.position as f64),
                    },
                    y: row.reading(pollutant),
                    category: row.operator.clone(),
                    series,
                    color,
                    hover: Hover::new(
                        None,
                        vec![
                            HoverField::new("state", Some(row.state.clone())),
                            HoverField::new("county", row.county.clone()),
                            HoverField::new("status", row.status.clone()),
                        ],
                    ),
                }
            })
            .collect();

        Self {
            title: SCATTER_TITLE.to_string(),
            x_axis,
            x_label: x_axis.label().to_string(),
            y_label: pollutant.column().to_string(),
            legend: palette.into_legend(),
            points,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub state: String,
    pub count: usize,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSpec {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub bars: Vec<Bar>,
}

impl BarSpec {
    pub fn build(rows: &[&FacilityRecord]) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for row in rows {
            *counts.entry(row.state.as_str()).or_default() += 1;
        }

        let mut palette = CategoryPalette::default();
        let bars: Vec<Bar> = counts
            .into_iter()
            .map(|(state, count)| Bar {
                state: state.to_string(),
                count,
                color: palette.assign(Some(state)).1,
            })
            .collect();

        Self {
            title: BAR_TITLE.to_string(),
            x_label: "state".to_string(),
            y_label: "count".to_string(),
            bars,
        }
    }

    pub fn total(&self) -> usize {
        self.bars.iter().map(|b| b.count).sum()
    }
}

/// Assigns palette colours to categories in order of first appearance.
#[derive(Default)]
struct CategoryPalette {
    assigned: Vec<(Option<String>, String)>,
    next: usize,
}

impl CategoryPalette {
    /// Legend index and colour for `category`. A missing category is its
    /// own entry, distinct from any real category sharing its label.
    fn assign(&mut self, category: Option<&str>) -> (usize, String) {
        if let Some(i) = self.assigned.iter().position(|(c, _)| c.as_deref() == category) {
            return (i, self.assigned[i].1.clone());
        }

        let color = match category {
            Some(_) => {
                let c = colorous::CATEGORY10[self.next % colorous::CATEGORY10.len()];
                self.next += 1;
                hex(c)
            }
            None => MISSING_CATEGORY_COLOR.to_string(),
        };
        self.assigned.push((category.map(str::to_string), color.clone()));
        (self.assigned.len() - 1, color)
    }

    fn into_legend(self) -> Vec<LegendEntry> {
        self.assigned
            .into_iter()
            .map(|(category, color)| LegendEntry {
                label: category.unwrap_or_else(|| MISSING_CATEGORY_LABEL.to_string()),
                color,
            })
            .collect()
    }
}

fn value_domain(values: impl Iterator<Item = Option<f64>>) -> Option<[f64; 2]> {
    values.flatten().fold(None, |acc, v| match acc {
        None => Some([v, v]),
        Some([lo, hi]) => Some([lo.min(v), hi.max(v)]),
    })
}

fn viridis_hex(value: f64, domain: Option<[f64; 2]>) -> String {
    let t = match domain {
        Some([lo, hi]) if hi > lo => (value - lo) / (hi - lo),
        _ => 0.5,
    };
    hex(colorous::VIRIDIS.eval_continuous(t.clamp(0.0, 1.0)))
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn hex(c: colorous::Color) -> String {
    format!("#{:02x}{:02x}{:02x}", c.r, c.g, c.b)
}
