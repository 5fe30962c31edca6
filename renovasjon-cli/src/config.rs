//! Loading and validation of the TOML configuration file.
//!
//! ```toml
//! [address]
//! street_name = "Storgata"
//! street_code = "12345"
//! house_no = "1"
//! county_id = "3024"
//! date_format = "%d/%m/%Y"   # "None" keeps raw timestamps
//!
//! [sensor]
//! fraction_id = [1, 2, 3]
//! scan_interval_secs = 1800
//!
//! [cache]
//! max_attempts = 3
//! empty_is_stale = false
//!
//! [http]
//! timeout_secs = 30
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use renovasjon_core::{
    Address, CacheSettings, DEFAULT_DATE_FORMAT, DEFAULT_MAX_ATTEMPTS, DateFormat, FractionId,
    StalenessPolicy,
};
use renovasjon_provider_norkart::BASE_URL;
use serde::Deserialize;

const DEFAULT_SCAN_INTERVAL_SECS: u64 = 30 * 60;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(thiserror::Error, Debug)]
pub(crate) enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] renovasjon_core::ConfigError),
    #[error("At least one fraction_id must be configured")]
    NoFractions,
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    address: AddressSection,
    sensor: SensorSection,
    #[serde(default)]
    cache: CacheSection,
    #[serde(default)]
    http: HttpSection,
}

#[derive(Debug, Deserialize)]
struct AddressSection {
    street_name: String,
    street_code: String,
    house_no: String,
    county_id: String,
    #[serde(default = "default_date_format")]
    date_format: String,
}

#[derive(Debug, Deserialize)]
struct SensorSection {
    fraction_id: OneOrMany,
    #[serde(default = "default_scan_interval")]
    scan_interval_secs: u64,
}

// `fraction_id = 1` and `fraction_id = [1, 2]` are both accepted
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(FractionId),
    Many(Vec<FractionId>),
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct CacheSection {
    max_attempts: usize,
    empty_is_stale: bool,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            empty_is_stale: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct HttpSection {
    base_url: String,
    timeout_secs: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_owned(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_owned()
}

fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL_SECS
}

/// Validated configuration.
#[derive(Debug)]
pub(crate) struct Config {
    pub address: Address,
    pub cache: CacheSettings,
    pub fraction_ids: Vec<FractionId>,
    pub scan_interval: Duration,
    pub base_url: String,
    pub timeout: Duration,
}

/// Read and validate the configuration file at `path`.
pub(crate) fn load(path: &Path) -> Result<Config, ConfigError> {
    tracing::info!(path = %path.display(), "loading configuration");

    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_owned(),
        source,
    })?;

    parse(&contents)
}

pub(crate) fn parse(contents: &str) -> Result<Config, ConfigError> {
    let raw: RawConfig = toml::from_str(contents)?;

    let address = Address::new(
        &raw.address.street_name,
        &raw.address.street_code,
        &raw.address.house_no,
        &raw.address.county_id,
    )?;
    let date_format = DateFormat::parse(&raw.address.date_format)?;

    let fraction_ids = match raw.sensor.fraction_id {
        OneOrMany::One(id) => vec![id],
        OneOrMany::Many(ids) => ids,
    };
    if fraction_ids.is_empty() {
        return Err(ConfigError::NoFractions);
    }
    if raw.sensor.scan_interval_secs == 0 {
        return Err(ConfigError::Zero("scan_interval_secs"));
    }
    if raw.cache.max_attempts == 0 {
        return Err(ConfigError::Zero("max_attempts"));
    }
    if raw.http.timeout_secs == 0 {
        return Err(ConfigError::Zero("timeout_secs"));
    }

    Ok(Config {
        address,
        cache: CacheSettings {
            date_format,
            max_attempts: raw.cache.max_attempts,
            staleness: StalenessPolicy {
                empty_is_stale: raw.cache.empty_is_stale,
            },
        },
        fraction_ids,
        scan_interval: Duration::from_secs(raw.sensor.scan_interval_secs),
        base_url: raw.http.base_url,
        timeout: Duration::from_secs(raw.http.timeout_secs),
    })
}
