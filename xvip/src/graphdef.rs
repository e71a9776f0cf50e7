// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

//! JSON description of a media device.
//!
//! A [`GraphDef`] lists the entities of a device, the links between their
//! pads and optionally their initial routing and formats. A
//! [`DeviceBackend`] supplies the register files and DMA channels the
//! entities are bound to.
//!
//! ```
//! use xvip::graphdef::{BlockDef, GraphDef};
//!
//! let def: GraphDef = serde_json::from_str(r#"{
//!     "entities": [
//!         { "name": "cfa", "kind": "cfa" },
//!         { "name": "capture", "kind": "dma", "direction": "output" }
//!     ],
//!     "links": [ { "source": "cfa:1", "sink": "capture:0" } ]
//! }"#).unwrap();
//!
//! assert!(matches!(def.entities[0].kind, BlockDef::Cfa));
//! assert!(def.links[0].enabled);
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use xvip_sys::RegisterIo;

use crate::{
    Error, MediaDevice, Result,
    config::PipelineConfig,
    devices::{AxisSwitch, Cfa, Cresample, Csi2Rx, GmslSensor, Hls, IpBlock, VideoSwitch},
    dma::{DmaChannel, DmaDirection},
    format::FrameFormat,
    graph::{EntityId, LinkKind, PadKind},
    routing::Route,
};

/// Binds entity descriptions to hardware.
pub trait DeviceBackend {
    /// Returns the register file of a subdevice.
    fn registers(&self, entity: &EntityDef) -> Result<Arc<dyn RegisterIo>>;

    /// Returns the channel of a DMA engine.
    fn dma_channel(&self, entity: &EntityDef, direction: DmaDirection)
    -> Result<Box<dyn DmaChannel>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDef {
    pub entities: Vec<EntityDef>,
    #[serde(default)]
    pub links: Vec<LinkDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    #[serde(flatten)]
    pub kind: BlockDef,
    /// Initial routing table, for blocks that support routing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<Route>>,
    /// Initial format of every sink stream (of the source pad for blocks
    /// without sinks, of the node for DMA engines).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FrameFormat>,
}

/// Type of an entity, with its type-specific parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockDef {
    Switch {
        sinks: u32,
        sources: u32,
    },
    AxisSwitch {
        sinks: u32,
        sources: u32,
        #[serde(default)]
        tdest_routing: bool,
    },
    Cfa,
    Cresample,
    Hls,
    #[serde(rename = "csi2rx")]
    Csi2Rx,
    Sensor,
    Passthrough {
        sinks: u32,
        sources: u32,
    },
    Dma {
        direction: DmaDirection,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkDef {
    /// Source pad as `"entity:pad"`.
    pub source: String,
    /// Sink pad as `"entity:pad"`.
    pub sink: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Splits `"entity:pad"`.
fn parse_pad(pad_ref: &str) -> Result<(&str, u32)> {
    let (entity, pad) = pad_ref
        .rsplit_once(':')
        .ok_or_else(|| Error::InvalidArgument(format!("malformed pad '{pad_ref}'")))?;
    let pad = pad
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("malformed pad index in '{pad_ref}'")))?;
    Ok((entity, pad))
}

impl EntityDef {
    fn instantiate(&self, backend: &dyn DeviceBackend) -> Result<IpBlock> {
        let block = match self.kind {
            BlockDef::Switch { sinks, sources } => {
                IpBlock::Switch(VideoSwitch::new(backend.registers(self)?, sinks, sources)?)
            }
            BlockDef::AxisSwitch {
                sinks,
                sources,
                tdest_routing,
            } => IpBlock::AxisSwitch(AxisSwitch::new(
                backend.registers(self)?,
                sinks,
                sources,
                tdest_routing,
            )?),
            BlockDef::Cfa => IpBlock::Cfa(Cfa::new(backend.registers(self)?)),
            BlockDef::Cresample => IpBlock::Cresample(Cresample::new(backend.registers(self)?)),
            BlockDef::Hls => IpBlock::Hls(Hls::new(backend.registers(self)?)),
            BlockDef::Csi2Rx => IpBlock::Csi2Rx(Csi2Rx::new(backend.registers(self)?)),
            BlockDef::Sensor => IpBlock::Sensor(GmslSensor::new(backend.registers(self)?)),
            BlockDef::Passthrough { sinks, sources } => IpBlock::Passthrough { sinks, sources },
            BlockDef::Dma { .. } => {
                return Err(Error::InvalidArgument(format!(
                    "'{}' is a DMA engine, not a subdevice",
                    self.name
                )));
            }
        };
        Ok(block)
    }
}

impl MediaDevice {
    /// Builds a device from a graph description.
    ///
    /// Entities are created in order, then links, then the initial routing
    /// tables and finally the initial formats (routing resets formats).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for unknown entities in links,
    /// malformed pads, invalid block parameters or routing tables, and any
    /// error reported by `backend`.
    pub fn from_graph_def(
        def: &GraphDef,
        backend: &dyn DeviceBackend,
        config: PipelineConfig,
    ) -> Result<MediaDevice> {
        let mut builder = MediaDevice::builder(config);

        for entity in &def.entities {
            match entity.kind {
                BlockDef::Dma { direction } => {
                    let channel = backend.dma_channel(entity, direction)?;
                    builder.add_dma(&entity.name, direction, channel)?;
                }
                _ => {
                    let block = entity.instantiate(backend)?;
                    builder.add_subdev(&entity.name, block)?;
                }
            }
        }

        for link in &def.links {
            let (source, source_pad) = parse_pad(&link.source)?;
            let (sink, sink_pad) = parse_pad(&link.sink)?;
            let lookup = |name: &str| {
                builder
                    .find(name)
                    .ok_or_else(|| Error::InvalidArgument(format!("unknown entity '{name}'")))
            };
            let (source, sink) = (lookup(source)?, lookup(sink)?);
            builder.link_with(
                (source, source_pad),
                (sink, sink_pad),
                LinkKind::Data,
                link.enabled,
            )?;
        }

        let device = builder.build();

        for entity in &def.entities {
            let Some(id) = device.find(&entity.name) else {
                continue;
            };
            if let Some(routes) = &entity.routes {
                device.set_routing(id, routes.clone())?;
            }
            if let Some(format) = entity.format {
                device.apply_initial_format(id, &entity.kind, format)?;
            }
        }

        debug!(entities = def.entities.len(), links = def.links.len(), "graph loaded");
        Ok(device)
    }

    fn apply_initial_format(
        &self,
        id: EntityId,
        kind: &BlockDef,
        format: FrameFormat,
    ) -> Result<()> {
        if let BlockDef::Dma { .. } = kind {
            self.set_dma_format(id, format)?;
            return Ok(());
        }

        let subdev = self.subdev(id)?;
        let has_sinks = subdev.pads().contains(&PadKind::Sink);
        let pads: Vec<u32> = subdev
            .pads()
            .iter()
            .enumerate()
            .filter(|(_, kind)| **kind == PadKind::Sink || !has_sinks)
            .map(|(index, _)| index as u32)
            .collect();

        for pad in pads {
            for (stream, _) in subdev.pad_formats(pad) {
                self.set_format(id, pad, stream, format)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_specs() {
        assert_eq!(parse_pad("csi2rx:1").unwrap(), ("csi2rx", 1));
        assert_eq!(parse_pad("a:b:0").unwrap(), ("a:b", 0));
        assert!(parse_pad("csi2rx").is_err());
        assert!(parse_pad("csi2rx:x").is_err());
    }

    #[test]
    fn entity_kinds_deserialize() {
        let def: GraphDef = serde_json::from_str(
            r#"{
                "entities": [
                    { "name": "sw", "kind": "axis_switch", "sinks": 1, "sources": 2 },
                    { "name": "rx", "kind": "csi2rx",
                      "routes": [ { "sink_pad": 0, "sink_stream": 0,
                                    "source_pad": 1, "source_stream": 0 } ] },
                    { "name": "in", "kind": "dma", "direction": "input" }
                ],
                "links": [ { "source": "rx:1", "sink": "sw:0", "enabled": false } ]
            }"#,
        )
        .unwrap();

        assert_eq!(
            def.entities[0].kind,
            BlockDef::AxisSwitch {
                sinks: 1,
                sources: 2,
                tdest_routing: false
            }
        );
        assert_eq!(def.entities[1].kind, BlockDef::Csi2Rx);
        assert_eq!(def.entities[1].routes.as_ref().map(Vec::len), Some(1));
        assert_eq!(
            def.entities[2].kind,
            BlockDef::Dma {
                direction: DmaDirection::Input
            }
        );
        assert!(!def.links[0].enabled);
    }
}
