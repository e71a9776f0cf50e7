// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

//! Pipeline configuration.
//!
//! A [`PipelineConfig`] is handed to [`crate::MediaDevice`] at construction
//! and read when a pipeline starts. There is no process-wide state: two
//! devices in the same process may run in different modes.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How a pipeline with several DMA engines is started and stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultiOutMode {
    /// All-or-nothing: the pipeline starts only when the last DMA engine of
    /// the component requests it, and stops as soon as the first one leaves.
    #[default]
    Sync,
    /// Each DMA engine starts and stops its own branch independently.
    Async,
}

impl FromStr for MultiOutMode {
    type Err = Error;

    /// Parses `"sync"`/`"async"` (case-insensitive) or the numeric module
    /// parameter values `0`/`1`.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync" | "0" => Ok(MultiOutMode::Sync),
            "async" | "1" => Ok(MultiOutMode::Async),
            other => Err(Error::InvalidArgument(format!(
                "unknown multi-output mode '{other}'"
            ))),
        }
    }
}

impl fmt::Display for MultiOutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MultiOutMode::Sync => f.write_str("sync"),
            MultiOutMode::Async => f.write_str("async"),
        }
    }
}

/// Tunables for pipeline start/stop and hardware polling.
///
/// # Examples
///
/// ```
/// use xvip::config::{MultiOutMode, PipelineConfig};
///
/// let config = PipelineConfig {
///     multi_out_mode: "async".parse().unwrap(),
///     ..Default::default()
/// };
/// assert_eq!(config.multi_out_mode, MultiOutMode::Async);
/// assert_eq!(config.reset_timeout_us, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Start/stop protocol for multi-DMA pipelines.
    pub multi_out_mode: MultiOutMode,
    /// Number of 1 µs polls of the CSI-2 reset-in-progress bit.
    pub reset_timeout_us: u32,
    /// Number of polls of the serializer pixel-clock-detect bit.
    pub pclk_detect_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            multi_out_mode: MultiOutMode::Sync,
            reset_timeout_us: 1000,
            pclk_detect_attempts: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_module_parameter_values() {
        assert_eq!("sync".parse::<MultiOutMode>().unwrap(), MultiOutMode::Sync);
        assert_eq!("ASYNC".parse::<MultiOutMode>().unwrap(), MultiOutMode::Async);
        assert_eq!("0".parse::<MultiOutMode>().unwrap(), MultiOutMode::Sync);
        assert_eq!("1".parse::<MultiOutMode>().unwrap(), MultiOutMode::Async);
        assert!(matches!(
            "2".parse::<MultiOutMode>(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "multi_out_mode": "async" }"#).unwrap();
        assert_eq!(config.multi_out_mode, MultiOutMode::Async);
        assert_eq!(config.reset_timeout_us, 1000);
        assert_eq!(config.pclk_detect_attempts, 100);
    }
}
