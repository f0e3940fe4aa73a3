use std::fmt;

use clap::ValueEnum;
use serde::Serialize;
use warp::http::Uri;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
pub enum WmsVersion {
    #[serde(rename = "1.1.1")]
    #[value(name = "1.1.1")]
    V111,
    #[serde(rename = "1.3.0")]
    #[value(name = "1.3.0")]
    V130,
}

/// The `INFO_FORMAT` requested from GetFeatureInfo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
pub enum InfoFormat {
    #[serde(rename = "application/json")]
    Json,
    #[serde(rename = "text/html")]
    Html,
    #[serde(rename = "text/plain")]
    Text,
    #[serde(rename = "application/vnd.ogc.gml")]
    Gml,
}

/// What the map page needs to show the WMS layer and query it on click.
#[derive(Debug, Clone, Serialize)]
pub struct MapConfig {
    pub url: String,
    pub layer: String,
    pub version: WmsVersion,
    pub info_format: InfoFormat,
    pub feature_count: u32,
    pub center: [f64; 2],
    pub zoom: f64,
}

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    Url(String),
    EmptyLayer,
    Center { lon: f64, lat: f64 },
    Zoom(f64),
    FeatureCount,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(fmt, "WMS url {url:?} is not an absolute http(s) url"),
            Self::EmptyLayer => write!(fmt, "no WMS layer given"),
            Self::Center { lon, lat } => write!(fmt, "map center ({lon}, {lat}) is out of range"),
            Self::Zoom(z) => write!(fmt, "zoom {z} is out of range 0-28"),
            Self::FeatureCount => write!(fmt, "feature count must be at least 1"),
        }
    }
}

impl MapConfig {
    pub fn validate(self) -> Result<Self, ConfigError> {
        let uri: Uri = self
            .url
            .parse()
            .map_err(|_| ConfigError::Url(self.url.clone()))?;

        let http = matches!(uri.scheme_str(), Some("http") | Some("https"));
        if !http || uri.authority().is_none() {
            return Err(ConfigError::Url(self.url));
        }

        if self.layer.trim().is_empty() {
            return Err(ConfigError::EmptyLayer);
        }

        let [lon, lat] = self.center;
        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            return Err(ConfigError::Center { lon, lat });
        }

        if !(0.0..=28.0).contains(&self.zoom) {
            return Err(ConfigError::Zoom(self.zoom));
        }

        if self.feature_count == 0 {
            return Err(ConfigError::FeatureCount);
        }

        Ok(self)
    }

    /// JSON for embedding inside a `<script>` element.
    pub fn to_script_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| "{}".into())
            .replace("</", "<\\/")
    }
}
