//! Audio graph nodes
//!
//! Every processing unit in the engine (gain stages, EQ, filter, the capture
//! splitter) implements [`AudioNode`]. Nodes that are wired in and out at
//! run time live in a [`SignalChain`], which hands out a [`NodeId`] on
//! `connect` and gives the node back on `disconnect`.

use std::fmt;

use crate::engine::StereoFrame;

/// A hardware-agnostic processing unit working on stereo blocks in place
pub trait AudioNode: Send {
    /// Process a block of frames in place
    fn process(&mut self, block: &mut [StereoFrame]);

    /// Called when the node is connected or the sample rate changes
    fn prepare(&mut self, sample_rate: u32);

    /// Clear internal history (filter memory, pending ramps)
    fn reset(&mut self);

    /// Short type identifier for logs and debugging
    fn node_type(&self) -> &'static str;
}

/// Handle returned by [`SignalChain::connect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Ordered series of nodes processed one after another
///
/// Capacity is reserved up front so that connecting up to that many nodes
/// never reallocates (the chain may live on the audio thread).
pub struct SignalChain {
    nodes: Vec<(NodeId, Box<dyn AudioNode>)>,
    next_id: u32,
    sample_rate: u32,
}

impl SignalChain {
    /// Create an empty chain with room for `capacity` nodes
    pub fn with_capacity(capacity: usize, sample_rate: u32) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            next_id: 0,
            sample_rate,
        }
    }

    /// Append a node at the end of the chain
    pub fn connect(&mut self, mut node: Box<dyn AudioNode>) -> NodeId {
        node.prepare(self.sample_rate);
        let id = NodeId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.nodes.push((id, node));
        id
    }

    /// Remove a node, returning it to the caller
    pub fn disconnect(&mut self, id: NodeId) -> Option<Box<dyn AudioNode>> {
        let index = self.nodes.iter().position(|(node_id, _)| *node_id == id)?;
        Some(self.nodes.remove(index).1)
    }

    /// Check whether a node is still connected
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.iter().any(|(node_id, _)| *node_id == id)
    }

    /// Number of connected nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Re-prepare every node for a new sample rate
    pub fn prepare(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        for (_, node) in &mut self.nodes {
            node.prepare(sample_rate);
        }
    }

    /// Run the block through every node in connection order
    pub fn process(&mut self, block: &mut [StereoFrame]) {
        for (_, node) in &mut self.nodes {
            node.process(block);
        }
    }

    /// Reset every node
    pub fn reset(&mut self) {
        for (_, node) in &mut self.nodes {
            node.reset();
        }
    }
}

impl fmt::Debug for SignalChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.nodes
                    .iter()
                    .map(|(id, node)| format!("{}:{}", id, node.node_type())),
            )
            .finish()
    }
}
