use crate::data::{DropdownOption, FilterOptions};
use crate::render::escape_html as escape;
use crate::types::Pollutant;

const PAGE_TITLE: &str = "Environmental Impact of U.S. Data Centers";
const SIDEBAR_TITLE: &str = "Filters";
const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

pub const GRAPH_IDS: [&str; 3] = ["map", "scatter", "bar_chart"];

#[derive(Debug, Clone, PartialEq)]
pub struct Dropdown {
    pub id: &'static str,
    pub placeholder: &'static str,
    pub multi: bool,
    pub options: Vec<DropdownOption>,
    pub value: Option<String>,
}

/// Static page structure: filter sidebar plus chart placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub title: String,
    pub sidebar_title: String,
    pub controls: Vec<Dropdown>,
    pub graphs: Vec<&'static str>,
}

impl Layout {
    pub fn build(options: &FilterOptions) -> Self {
        let multi = |id: &'static str, placeholder: &'static str, options: &[DropdownOption]| Dropdown {
            id,
            placeholder,
            multi: true,
            options: options.to_vec(),
            value: None,
        };

        Self {
            title: PAGE_TITLE.to_string(),
            sidebar_title: SIDEBAR_TITLE.to_string(),
            controls: vec![
                multi("state_filter", "Select State(s)", &options.states),
                multi("operator_filter", "Select Operator(s)", &options.operators),
                multi("status_filter", "Select Status", &options.statuses),
                Dropdown {
                    id: "pollutant_filter",
                    placeholder: "Select Pollutant",
                    multi: false,
                    options: options.pollutants.clone(),
                    value: Some(Pollutant::default().column().to_string()),
                },
            ],
            graphs: GRAPH_IDS.to_vec(),
        }
    }

    pub fn to_html(&self) -> String {
        let controls: String = self.controls.iter().map(render_dropdown).collect();
        let graphs: String = self
            .graphs
            .iter()
            .map(|id| format!("      <div id=\"{id}\" class=\"graph\"></div>\n"))
            .collect();

        format!(
            r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{title}</title>
  <script src="{cdn}"></script>
  <style>{style}</style>
</head>
<body>
  <h1>{title}</h1>
  <div class="page">
    <div class="sidebar">
      <h3>{sidebar}</h3>
{controls}    </div>
    <div class="charts">
{graphs}    </div>
  </div>
  <script>{script}</script>
</body>
</html>
"#,
            title = escape(&self.title),
            cdn = PLOTLY_CDN,
            style = STYLE,
            sidebar = escape(&self.sidebar_title),
            controls = controls,
            graphs = graphs,
            script = SCRIPT,
        )
    }
}

fn render_dropdown(dropdown: &Dropdown) -> String {
    let mut html = format!(
        "      <label for=\"{id}\">{placeholder}</label>\n      <select id=\"{id}\" class=\"filter\"{multi}>\n",
        id = dropdown.id,
        placeholder = escape(dropdown.placeholder),
        multi = if dropdown.multi { " multiple" } else { "" },
    );
    for option in &dropdown.options {
        let selected = if dropdown.value.as_deref() == Some(option.value.as_str()) {
            " selected"
        } else {
            ""
        };
        html.push_str(&format!(
            "        <option value=\"{}\"{}>{}</option>\n",
            escape(&option.value),
            selected,
            escape(&option.label)
        ));
    }
    html.push_str("      </select>\n");
    html
}

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 0; }
h1 { text-align: center; }
.page { display: flex; }
.sidebar { width: 25%; padding: 20px; background-color: #f8f8f8; }
.sidebar select { width: 100%; margin-bottom: 16px; }
.sidebar label { display: block; font-size: 0.9em; margin-bottom: 4px; }
.charts { width: 73%; }
.graph { height: 450px; }
"#;

const SCRIPT: &str = r#"
const selected = (id) => Array.from(document.getElementById(id).selectedOptions).map((o) => o.value);

function drawMap(spec) {
  const sizes = spec.points.map((p) => {
    if (spec.size === null || spec.size.domain === null || p.size === null) return 8;
    const [lo, hi] = spec.size.domain;
    return hi > lo ? 6 + 24 * (p.size - lo) / (hi - lo) : 12;
  });
  const traces = [{
    type: "scattermapbox",
    lat: spec.points.map((p) => p.lat),
    lon: spec.points.map((p) => p.lon),
    text: spec.points.map((p) => p.hover.text),
    hoverinfo: "text",
    showlegend: false,
    marker: { color: spec.points.map((p) => p.color), size: sizes },
  }];
  if (spec.color.domain !== null) {
    // Colour bar only; markers above carry their own colours.
    traces.push({
      type: "scattermapbox",
      lat: [null],
      lon: [null],
      hoverinfo: "skip",
      showlegend: false,
      marker: {
        color: spec.color.domain,
        colorscale: spec.color.scheme,
        cmin: spec.color.domain[0],
        cmax: spec.color.domain[1],
        showscale: true,
        colorbar: { title: spec.color.label },
      },
    });
  }
  Plotly.react("map", traces, {
    title: spec.title,
    mapbox: {
      style: spec.viewport.style,
      zoom: spec.viewport.zoom,
      center: { lat: spec.viewport.center_lat, lon: spec.viewport.center_lon },
    },
    margin: { t: 40, l: 0, r: 0, b: 0 },
  });
}

function drawScatter(spec) {
  const traces = spec.legend.map((entry, series) => {
    const points = spec.points.filter((p) => p.series === series);
    return {
      type: "scatter",
      mode: "markers",
      name: entry.label,
      x: points.map((p) => p.x),
      y: points.map((p) => p.y),
      text: points.map((p) => p.hover.text),
      hoverinfo: "x+y+text",
      marker: { color: entry.color },
    };
  });
  Plotly.react("scatter", traces, {
    title: spec.title,
    xaxis: { title: spec.x_label },
    yaxis: { title: spec.y_label },
  });
}

function drawBar(spec) {
  const trace = {
    type: "bar",
    x: spec.bars.map((b) => b.state),
    y: spec.bars.map((b) => b.count),
    marker: { color: spec.bars.map((b) => b.color) },
  };
  Plotly.react("bar_chart", [trace], {
    title: spec.title,
    xaxis: { title: spec.x_label },
    yaxis: { title: spec.y_label },
  });
}

async function refresh() {
  const selection = {
    states: selected("state_filter"),
    operators: selected("operator_filter"),
    statuses: selected("status_filter"),
    pollutant: document.getElementById("pollutant_filter").value,
  };
  const response = await fetch("/api/update", {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify(selection),
  });
  if (!response.ok) return;
  const charts = await response.json();
  drawMap(charts.map);
  drawScatter(charts.scatter);
  drawBar(charts.bar);
}

document.querySelectorAll("select.filter").forEach((el) => el.addEventListener("change", refresh));
refresh();
"#;
