// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

//! Runs a JSON-described media device against simulated hardware.
//!
//! Every DMA engine of the graph (or the ones named on the command line) is
//! started in description order and stopped in reverse, after which the
//! register writes and channel actions recorded by the simulation are
//! returned for printing.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;
use tracing::{info, warn};
use xvip::{
    MediaDevice,
    config::{MultiOutMode, PipelineConfig},
    graph::EntityId,
    graphdef::{BlockDef, GraphDef},
    sim::SimulatedBackend,
};
use xvip_sys::TraceEvent;

#[derive(thiserror::Error, Debug)]
pub enum CtlError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("no DMA engine named '{0}'")]
    UnknownDma(String),
    #[error(transparent)]
    Device(#[from] xvip::Error),
}

pub type Result<T> = std::result::Result<T, CtlError>;

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|source| CtlError::Read {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CtlError::Parse {
        path: path.to_owned(),
        source,
    })
}

/// Loads the optional configuration file and applies the mode override.
pub fn load_config(path: Option<&Path>, mode: Option<MultiOutMode>) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => load_json(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(mode) = mode {
        config.multi_out_mode = mode;
    }
    Ok(config)
}

/// Names of the DMA engines described in `def`, in description order.
pub fn dma_names(def: &GraphDef) -> Vec<String> {
    def.entities
        .iter()
        .filter(|e| matches!(e.kind, BlockDef::Dma { .. }))
        .map(|e| e.name.clone())
        .collect()
}

/// Streams the selected DMA engines once and returns the hardware trace.
///
/// An empty `dmas` selects every engine of the graph.
pub fn run(def: &GraphDef, config: PipelineConfig, dmas: &[String]) -> Result<Vec<TraceEvent>> {
    let backend = SimulatedBackend::new();
    info!(mode = %config.multi_out_mode, "building media device");
    let device = MediaDevice::from_graph_def(def, &backend, config)?;

    let names = if dmas.is_empty() {
        dma_names(def)
    } else {
        dmas.to_vec()
    };
    let engines = names
        .iter()
        .map(|name| {
            device
                .find(name)
                .filter(|id| device.dma(*id).is_ok())
                .ok_or_else(|| CtlError::UnknownDma(name.clone()))
        })
        .collect::<Result<Vec<EntityId>>>()?;

    let mut started = Vec::with_capacity(engines.len());
    let mut failure = None;
    for (&id, name) in engines.iter().zip(&names) {
        match device.start_streaming(id) {
            Ok(()) => {
                info!(dma = %name, "streaming started");
                started.push(id);
            }
            Err(err) => {
                warn!(dma = %name, errno = err.errno(), "start failed: {err}");
                failure = Some(err);
                break;
            }
        }
    }

    for &id in started.iter().rev() {
        device.stop_streaming(id);
    }
    info!(engines = started.len(), "streaming stopped");

    match failure {
        Some(err) => Err(err.into()),
        None => Ok(backend.log().events()),
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    const SAMPLE: &str = include_str!("../graphs/sample.json");

    fn sample() -> GraphDef {
        serde_json::from_str(SAMPLE).unwrap()
    }

    #[test]
    #[traced_test]
    fn sample_graph_streams_every_engine() {
        let events = run(&sample(), PipelineConfig::default(), &[]).unwrap();

        let actions: Vec<String> = events
            .iter()
            .filter(|e| matches!(e, TraceEvent::Action { .. }))
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            actions,
            [
                "vcap0: start",
                "vcap1: start",
                "vcap1: stop",
                "vcap0: stop"
            ]
        );
        assert!(logs_contain("streaming started"));
        assert!(logs_contain("streaming stopped"));
    }

    #[test]
    #[traced_test]
    fn async_mode_starts_each_branch_on_its_own() {
        let vcap0 = vec!["vcap0".to_owned()];
        let events = run(&sample(), load_config(None, Some(MultiOutMode::Async)).unwrap(), &vcap0)
            .unwrap();

        assert!(events.iter().any(|e| e.device() == "cfa0"));
        assert!(!events.iter().any(|e| e.device() == "cfa1"));
        assert!(logs_contain("mode=async"));
    }

    #[test]
    fn unknown_engines_are_reported() {
        let names = vec!["cfa0".to_owned()];
        assert!(matches!(
            run(&sample(), PipelineConfig::default(), &names),
            Err(CtlError::UnknownDma(name)) if name == "cfa0"
        ));
    }

    #[test]
    fn missing_files_name_the_path() {
        let err = load_json::<GraphDef>(Path::new("/nonexistent/graph.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/graph.json"));
    }
}
