use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use crate::wms::{InfoFormat, MapConfig, WmsVersion};

const USERS_FILE: &str = "users.json";

#[derive(Parser, Debug)]
pub struct Args {
    /// Whether clients connect to webgis over https.
    /// If so, the auth_token cookie is sent as a secure cookie.
    #[arg(short, long)]
    secure: bool,

    /// The address webgis should listen on. By default
    /// webgis will listen just on the IPv4 loopback.
    #[arg(short, long)]
    address: Option<String>,

    /// The port webgis listens on.
    #[arg(short, long, default_value_t = 5000)]
    port: u16,

    /// Directory holding the users file.
    #[arg(short, long, default_value = ".")]
    data_dir: PathBuf,

    /// GeoServer WMS endpoint, queried by the browser.
    #[arg(long, default_value = "http://localhost:8080/geoserver/wms")]
    wms_url: String,

    /// WMS layer to show, e.g. `workspace:layer`.
    #[arg(long, default_value = "topp:states")]
    wms_layer: String,

    #[arg(long, value_enum, default_value_t = WmsVersion::V111)]
    wms_version: WmsVersion,

    /// INFO_FORMAT requested from GetFeatureInfo.
    #[arg(long, value_enum, default_value_t = InfoFormat::Json)]
    info_format: InfoFormat,

    #[arg(long, default_value_t = 10)]
    feature_count: u32,

    #[arg(long, default_value_t = -98.5, allow_negative_numbers = true)]
    center_lon: f64,

    #[arg(long, default_value_t = 39.8, allow_negative_numbers = true)]
    center_lat: f64,

    #[arg(long, default_value_t = 4.0)]
    zoom: f64,
}

impl Args {
    pub fn addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.address
            .as_deref()
            .unwrap_or("127.0.0.1")
            .parse()
            .map(|addr: IpAddr| (addr, self.port).into())
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn users_file(&self) -> PathBuf {
        self.data_dir.join(USERS_FILE)
    }

    /// Unvalidated, see [`MapConfig::validate`].
    pub fn map_config(&self) -> MapConfig {
        MapConfig {
            url: self.wms_url.clone(),
            layer: self.wms_layer.clone(),
            version: self.wms_version,
            info_format: self.info_format,
            feature_count: self.feature_count,
            center: [self.center_lon, self.center_lat],
            zoom: self.zoom,
        }
    }
}
