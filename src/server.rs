use crate::config::{AppConfig, MapConfig};
use crate::data::{Dataset, FilterOptions};
use crate::layout::Layout;
use crate::processing::{self, ChartSet};
use crate::types::{FacilityRecord, FilterSelection};
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use geojson::FeatureCollection;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

// Wrapper for RTree indexing, keyed by [lon, lat]
pub struct FacilityIndex {
    index: usize,
    position: [f64; 2],
}

impl RTreeObject for FacilityIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for FacilityIndex {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        dx * dx + dy * dy
    }
}

pub struct AppState {
    pub dataset: Dataset,
    pub options: FilterOptions,
    pub page: String,
    pub tree: RTree<FacilityIndex>,
    pub map: MapConfig,
}

impl AppState {
    pub fn new(dataset: Dataset, map: MapConfig) -> Self {
        let options = FilterOptions::from_dataset(&dataset);
        let page = Layout::build(&options).to_html();

        let tree_items: Vec<FacilityIndex> = dataset
            .records
            .iter()
            .enumerate()
            .filter_map(|(i, record)| {
                record.coordinates().map(|(lon, lat)| FacilityIndex {
                    index: i,
                    position: [lon, lat],
                })
            })
            .collect();
        let tree = RTree::bulk_load(tree_items);

        Self {
            dataset,
            options,
            page,
            tree,
            map,
        }
    }
}

#[derive(Deserialize)]
pub struct QueryParams {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct FacilityResponse {
    position: usize,
    state: String,
    county: Option<String>,
    operator: Option<String>,
    status: Option<String>,
    lat: Option<f64>,
    long: Option<f64>,
    #[serde(rename = "pm2.5__local_conditions")]
    pm25: Option<f64>,
    ozone: Option<f64>,
    #[serde(rename = "nitrogen_dioxide_no2")]
    no2: Option<f64>,
    facility_size_sq_ft: Option<f64>,
}

impl From<&FacilityRecord> for FacilityResponse {
    fn from(record: &FacilityRecord) -> Self {
        Self {
            position: record.position,
            state: record.state.clone(),
            county: record.county.clone(),
            operator: record.operator.clone(),
            status: record.status.clone(),
            lat: record.lat,
            long: record.long,
            pm25: record.pm25,
            ozone: record.ozone,
            no2: record.no2,
            facility_size_sq_ft: record.facility_size_sq_ft,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/options", get(options_handler))
        .route("/api/update", post(update_handler))
        .route("/api/export/map", post(export_map_handler))
        .route("/api/facility", get(facility_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, dataset: Dataset) -> Result<()> {
    info!("Building dashboard state for {} facilities...", dataset.len());
    if dataset.is_empty() {
        warn!("Dataset has no rows; every chart will be empty");
    }
    let state = Arc::new(AppState::new(dataset, config.map.clone()));
    info!("Spatial index holds {} mappable facilities", state.tree.size());

    let addr = SocketAddr::from(([127, 0, 0, 1], config.server.port));
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, router(state))
        .await
        .context("Dashboard server failed")?;
    Ok(())
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(state.page.clone())
}

async fn options_handler(State(state): State<Arc<AppState>>) -> Json<FilterOptions> {
    Json(state.options.clone())
}

async fn update_handler(
    State(state): State<Arc<AppState>>,
    Json(selection): Json<FilterSelection>,
) -> Json<ChartSet> {
    Json(processing::update(&state.dataset, &selection, &state.map))
}

async fn export_map_handler(
    State(state): State<Arc<AppState>>,
    Json(selection): Json<FilterSelection>,
) -> Json<FeatureCollection> {
    let charts = processing::update(&state.dataset, &selection, &state.map);
    Json(charts.map.to_feature_collection())
}

async fn facility_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Json<Option<FacilityResponse>> {
    let nearest = state
        .tree
        .nearest_neighbor(&[params.lon, params.lat])
        .and_then(|candidate| state.dataset.records.get(candidate.index))
        .map(FacilityResponse::from);

    Json(nearest)
}
