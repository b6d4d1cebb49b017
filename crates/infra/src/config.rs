//! Ledger configuration.
//!
//! Loaded in layers: compiled defaults, then an optional file, then
//! `STOCKFLOW__*` environment variables (`STOCKFLOW__CODES__WIDTH=8`).

use std::path::Path;

use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use stockflow_core::PageLimits;
use stockflow_inventory::money::DEFAULT_CURRENCY_SCALE;
use stockflow_inventory::{CodeFormat, NegativeStockPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Extra attempts after a concurrency conflict before giving up.
    pub max_conflict_retries: u32,
    /// Applies to registrations and direct adjustments. Cancellations always reverse.
    pub negative_stock: NegativeStockPolicy,
    /// Decimal places of header totals.
    pub currency_scale: u32,
    pub codes: CodeFormat,
    pub paging: PageLimits,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            max_conflict_retries: 5,
            negative_stock: NegativeStockPolicy::Reject,
            currency_scale: DEFAULT_CURRENCY_SCALE,
            codes: CodeFormat::default(),
            paging: PageLimits::default(),
        }
    }
}

impl LedgerSettings {
    /// Load settings from an optional file plus the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_layers(path, environment())
    }

    fn load_layers(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        builder.add_source(env).build()?.try_deserialize()
    }
}

fn environment() -> Environment {
    Environment::with_prefix("STOCKFLOW")
        .separator("__")
        .try_parsing(true)
}
