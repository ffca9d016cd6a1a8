// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pipeline configuration
//!
//! All option structs deserialize from camelCase JSON with every field
//! optional; missing fields take their defaults.

use crate::coverage::CoverageOptions;
use crate::icp::IcpOptions;
use crate::primitives::DetectionParams;
use scan_lite_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Options for a full progress run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Align the scan to the model before measuring coverage
    pub register: bool,
    pub icp: IcpOptions,
    pub detection: DetectionParams,
    pub coverage: CoverageOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            register: true,
            icp: IcpOptions::default(),
            detection: DetectionParams::default(),
            coverage: CoverageOptions::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = parse_json(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn validate(&self) -> Result<()> {
        self.icp.validate()?;
        self.detection.validate()?;
        self.coverage.validate()
    }
}

/// Parse a JSON options object, mapping syntax and type errors to
/// [`Error::InvalidConfig`]
pub fn parse_json<T: DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|e| Error::config(format!("Invalid config JSON: {}", e)))
}
