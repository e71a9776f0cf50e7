// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

//! Media graph substrate: entities, pads and links.
//!
//! The graph is an arena indexed by [`EntityId`] and [`LinkId`]. All
//! topology lives behind one graph-wide mutex. Every method takes the lock
//! for the duration of the call only and returns owned snapshots, so the
//! lock is never held while a streaming hook runs.

use std::{
    collections::{HashSet, VecDeque},
    fmt,
    sync::Mutex,
};

use tracing::debug;

use crate::{Error, Result, lock};

/// Index of an entity in a [`MediaGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub(crate) usize);

impl EntityId {
    /// Returns the arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a link in a [`MediaGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(pub(crate) usize);

/// Identity of a started pipeline, recorded on each member entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineId(pub(crate) usize);

/// Direction of data through a pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadKind {
    /// Data enters the entity.
    Sink,
    /// Data leaves the entity.
    Source,
}

impl PadKind {
    pub fn opposite(self) -> PadKind {
        match self {
            PadKind::Sink => PadKind::Source,
            PadKind::Source => PadKind::Sink,
        }
    }
}

/// What an entity is backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A subdevice taking part in stream propagation.
    Subdev,
    /// A DMA-backed video node, driven by the pipeline coordinator only.
    VideoNode,
}

/// One endpoint of a link: an entity and a pad index on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PadRef {
    pub entity: EntityId,
    pub index: u32,
}

impl PadRef {
    pub fn new(entity: EntityId, index: u32) -> Self {
        Self { entity, index }
    }
}

/// Type of a link. Only data links carry streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Data,
    Interface,
}

/// Snapshot of one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub id: LinkId,
    pub source: PadRef,
    pub sink: PadRef,
    pub kind: LinkKind,
    pub enabled: bool,
}

impl Link {
    /// Returns `true` if the link is enabled and carries data.
    pub fn is_active_data(&self) -> bool {
        self.enabled && self.kind == LinkKind::Data
    }

    /// Returns the `(local, remote)` endpoints as seen from `entity`.
    pub fn endpoints_from(&self, entity: EntityId) -> (PadRef, PadRef) {
        if self.source.entity == entity {
            (self.source, self.sink)
        } else {
            (self.sink, self.source)
        }
    }
}

/// Snapshot of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityInfo {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub pads: Vec<PadKind>,
    pub pipeline: Option<PipelineId>,
}

struct EntityNode {
    name: String,
    kind: EntityKind,
    pads: Vec<PadKind>,
    links: Vec<LinkId>,
    pipeline: Option<PipelineId>,
}

#[derive(Default)]
struct GraphInner {
    entities: Vec<EntityNode>,
    links: Vec<Link>,
}

impl GraphInner {
    fn entity(&self, id: EntityId) -> Result<&EntityNode> {
        self.entities
            .get(id.0)
            .ok_or_else(|| Error::InvalidArgument(format!("no entity {id}")))
    }

    fn pad_kind(&self, pad: PadRef) -> Result<PadKind> {
        let entity = self.entity(pad.entity)?;
        entity.pads.get(pad.index as usize).copied().ok_or_else(|| {
            Error::InvalidArgument(format!("entity '{}' has no pad {}", entity.name, pad.index))
        })
    }
}

/// Arena of entities and links guarded by a single graph-wide lock.
#[derive(Default)]
pub struct MediaGraph {
    inner: Mutex<GraphInner>,
}

impl MediaGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity with the given pads and returns its id.
    pub fn add_entity(&self, name: &str, kind: EntityKind, pads: Vec<PadKind>) -> EntityId {
        let mut inner = lock(&self.inner);
        let id = EntityId(inner.entities.len());
        inner.entities.push(EntityNode {
            name: name.to_owned(),
            kind,
            pads,
            links: Vec::new(),
            pipeline: None,
        });
        id
    }

    /// Creates a link from a source pad to a sink pad.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if either pad does not exist, if
    /// `source` is not a source pad or `sink` is not a sink pad, or if both
    /// ends are on the same entity.
    pub fn create_link(
        &self,
        source: PadRef,
        sink: PadRef,
        kind: LinkKind,
        enabled: bool,
    ) -> Result<LinkId> {
        let mut inner = lock(&self.inner);
        if inner.pad_kind(source)? != PadKind::Source {
            return Err(Error::InvalidArgument(format!(
                "pad {} of '{}' is not a source pad",
                source.index,
                inner.entity(source.entity)?.name
            )));
        }
        if inner.pad_kind(sink)? != PadKind::Sink {
            return Err(Error::InvalidArgument(format!(
                "pad {} of '{}' is not a sink pad",
                sink.index,
                inner.entity(sink.entity)?.name
            )));
        }
        if source.entity == sink.entity {
            return Err(Error::InvalidArgument("self-links are not supported".into()));
        }

        let id = LinkId(inner.links.len());
        inner.links.push(Link {
            id,
            source,
            sink,
            kind,
            enabled,
        });
        inner.entities[source.entity.0].links.push(id);
        inner.entities[sink.entity.0].links.push(id);
        Ok(id)
    }

    /// Enables or disables a link.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] for an unknown link
    /// - [`Error::Busy`] if either end belongs to a started pipeline
    pub fn set_link_enabled(&self, link: LinkId, enabled: bool) -> Result<()> {
        let mut inner = lock(&self.inner);
        let snapshot = *inner
            .links
            .get(link.0)
            .ok_or_else(|| Error::InvalidArgument(format!("no link {}", link.0)))?;
        for end in [snapshot.source.entity, snapshot.sink.entity] {
            let node = inner.entity(end)?;
            if node.pipeline.is_some() {
                return Err(Error::Busy(format!(
                    "entity '{}' is part of a streaming pipeline",
                    node.name
                )));
            }
        }
        inner.links[link.0].enabled = enabled;
        Ok(())
    }

    /// Returns a snapshot of an entity.
    pub fn entity(&self, id: EntityId) -> Result<EntityInfo> {
        let inner = lock(&self.inner);
        let node = inner.entity(id)?;
        Ok(EntityInfo {
            id,
            name: node.name.clone(),
            kind: node.kind,
            pads: node.pads.clone(),
            pipeline: node.pipeline,
        })
    }

    /// Returns the name of an entity, or a placeholder for unknown ids.
    pub fn name(&self, id: EntityId) -> String {
        let inner = lock(&self.inner);
        inner
            .entities
            .get(id.0)
            .map_or_else(|| format!("entity{id}"), |node| node.name.clone())
    }

    /// Looks up an entity by name.
    pub fn find(&self, name: &str) -> Option<EntityId> {
        let inner = lock(&self.inner);
        inner
            .entities
            .iter()
            .position(|node| node.name == name)
            .map(EntityId)
    }

    pub fn num_entities(&self) -> usize {
        lock(&self.inner).entities.len()
    }

    /// Returns a snapshot of a link.
    pub fn link(&self, id: LinkId) -> Option<Link> {
        lock(&self.inner).links.get(id.0).copied()
    }

    /// Returns a snapshot of all links touching `entity`, in creation order.
    pub fn links_of(&self, entity: EntityId) -> Vec<Link> {
        let inner = lock(&self.inner);
        inner
            .entities
            .get(entity.0)
            .map(|node| node.links.iter().map(|id| inner.links[id.0]).collect())
            .unwrap_or_default()
    }

    /// Returns the pad at the other end of the first enabled data link on
    /// `pad`, if any.
    pub fn remote_pad(&self, pad: PadRef) -> Option<PadRef> {
        self.links_of(pad.entity)
            .into_iter()
            .filter(Link::is_active_data)
            .find_map(|link| {
                let (local, remote) = link.endpoints_from(pad.entity);
                (local == pad).then_some(remote)
            })
    }

    /// Breadth-first walk over enabled data links, in both directions.
    ///
    /// Returns every entity reachable from `start`, `start` first.
    pub fn walk(&self, start: EntityId) -> Vec<EntityId> {
        let inner = lock(&self.inner);
        if start.0 >= inner.entities.len() {
            return Vec::new();
        }

        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut order = Vec::new();

        while let Some(id) = queue.pop_front() {
            order.push(id);
            for link_id in &inner.entities[id.0].links {
                let link = &inner.links[link_id.0];
                if !link.is_active_data() {
                    continue;
                }
                let (_, remote) = link.endpoints_from(id);
                if visited.insert(remote.entity) {
                    queue.push_back(remote.entity);
                }
            }
        }

        debug!(start = %inner.entities[start.0].name, entities = order.len(), "graph walk");
        order
    }

    /// Returns the pipeline an entity currently belongs to.
    pub fn pipeline_of(&self, entity: EntityId) -> Option<PipelineId> {
        lock(&self.inner)
            .entities
            .get(entity.0)
            .and_then(|node| node.pipeline)
    }

    /// Marks (or with `None`, unmarks) entities as members of a pipeline.
    pub(crate) fn set_pipeline(&self, entities: &[EntityId], pipeline: Option<PipelineId>) {
        let mut inner = lock(&self.inner);
        for id in entities {
            if let Some(node) = inner.entities.get_mut(id.0) {
                node.pipeline = pipeline;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> (MediaGraph, [EntityId; 3]) {
        let graph = MediaGraph::new();
        let a = graph.add_entity("a", EntityKind::Subdev, vec![PadKind::Source]);
        let b = graph.add_entity("b", EntityKind::Subdev, vec![PadKind::Sink, PadKind::Source]);
        let c = graph.add_entity("c", EntityKind::VideoNode, vec![PadKind::Sink]);
        graph
            .create_link(PadRef::new(a, 0), PadRef::new(b, 0), LinkKind::Data, true)
            .unwrap();
        graph
            .create_link(PadRef::new(b, 1), PadRef::new(c, 0), LinkKind::Data, true)
            .unwrap();
        (graph, [a, b, c])
    }

    #[test]
    fn rejects_links_between_same_polarity() {
        let (graph, [a, b, _]) = chain();
        let err = graph
            .create_link(PadRef::new(b, 0), PadRef::new(a, 0), LinkKind::Data, true)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(graph
            .create_link(PadRef::new(a, 0), PadRef::new(b, 7), LinkKind::Data, true)
            .is_err());
    }

    #[test]
    fn walk_follows_enabled_data_links_only() {
        let (graph, [a, b, c]) = chain();
        assert_eq!(graph.walk(c), [c, b, a]);

        let link = graph.links_of(b)[0].id;
        graph.set_link_enabled(link, false).unwrap();
        assert_eq!(graph.walk(c), [c, b]);
        assert_eq!(graph.remote_pad(PadRef::new(b, 0)), None);
        assert_eq!(graph.remote_pad(PadRef::new(b, 1)), Some(PadRef::new(c, 0)));
    }

    #[test]
    fn link_changes_are_refused_inside_a_pipeline() {
        let (graph, [_, b, c]) = chain();
        graph.set_pipeline(&[b, c], Some(PipelineId(0)));
        let link = graph.links_of(c)[0].id;
        assert!(matches!(
            graph.set_link_enabled(link, false),
            Err(Error::Busy(_))
        ));
        graph.set_pipeline(&[b, c], None);
        graph.set_link_enabled(link, false).unwrap();
    }
}
