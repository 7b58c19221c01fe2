//! Audio graph - owns nodes and message queues

use core::marker::PhantomData;

use dasp_graph::{Buffer, Input, NodeData, Processor};
use hashbrown::HashMap;
use petgraph::graph::NodeIndex;
use rtrb::{Consumer, Producer, RingBuffer};

use crate::node::{AudioNode, NodeId, ProcessContext, BLOCK_SIZE};

/// Default depth of each node's message queue.
pub(crate) const MESSAGE_QUEUE_SIZE: usize = 64;

/// Handle to send messages to a node in an [`AudioGraph`]
pub(crate) struct NodeHandle<M: Send + 'static> {
    pub(crate) id: NodeId,
    pub(crate) sender: Producer<M>,
    pub(crate) _marker: PhantomData<M>,
}

impl<M: Send + 'static> NodeHandle<M> {
    pub fn id(&self) -> NodeId {
        self.id
    }
}

// Type-erased wrapper so we can store heterogeneous nodes
trait ErasedNode: Send {
    fn process_erased(&mut self, ctx: &ProcessContext, inputs: &[Input], outputs: &mut [Buffer]);
}

struct NodeWrapper<N: AudioNode> {
    node: N,
    receiver: Consumer<N::Message>,
}

impl<N: AudioNode> ErasedNode for NodeWrapper<N> {
    fn process_erased(&mut self, ctx: &ProcessContext, inputs: &[Input], outputs: &mut [Buffer]) {
        let receiver = &mut self.receiver;
        let node = &mut self.node;

        let messages = core::iter::from_fn(|| receiver.pop().ok());
        node.process(ctx, messages, inputs, outputs);
    }
}

// Adapter for dasp_graph
struct DaspAdapter {
    node: Box<dyn ErasedNode>,
    ctx: ProcessContext,
}

impl dasp_graph::Node for DaspAdapter {
    fn process(&mut self, inputs: &[Input], outputs: &mut [Buffer]) {
        self.node.process_erased(&self.ctx, inputs, outputs);
    }
}

type InnerGraph = petgraph::graph::Graph<NodeData<DaspAdapter>, ()>;

/// An audio processing graph at a fixed sample rate.
///
/// Only nodes feeding the terminal are processed.
pub(crate) struct AudioGraph {
    graph: InnerGraph,
    processor: Processor<InnerGraph>,
    ctx: ProcessContext,

    node_indices: HashMap<NodeId, NodeIndex>,
    next_node_id: u32,

    terminal: Option<NodeIndex>,
    blocks_processed: u64,
}

impl AudioGraph {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            graph: InnerGraph::with_capacity(64, 64),
            processor: Processor::with_capacity(64),
            ctx: ProcessContext {
                sample_rate,
                buffer_size: BLOCK_SIZE,
            },
            node_indices: HashMap::new(),
            next_node_id: 0,
            terminal: None,
            blocks_processed: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.ctx.sample_rate
    }

    /// Seconds of audio rendered so far.
    pub fn current_time(&self) -> f64 {
        (self.blocks_processed * BLOCK_SIZE as u64) as f64 / self.ctx.sample_rate as f64
    }

    pub fn blocks_processed(&self) -> u64 {
        self.blocks_processed
    }

    pub fn add<N: AudioNode>(&mut self, node: N) -> NodeHandle<N::Message> {
        self.add_with_queue_size(node, MESSAGE_QUEUE_SIZE)
    }

    pub fn add_with_queue_size<N: AudioNode>(&mut self, node: N, queue_size: usize) -> NodeHandle<N::Message> {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;

        let (producer, consumer) = RingBuffer::new(queue_size);

        let num_outputs = node.num_outputs();
        let wrapper = NodeWrapper { node, receiver: consumer };
        let adapter = DaspAdapter {
            node: Box::new(wrapper),
            ctx: self.ctx,
        };

        let node_data = match num_outputs {
            2 => NodeData::new2(adapter),
            // sinks have no outputs, but dasp_graph still wants a buffer
            _ => NodeData::new1(adapter),
        };

        let idx = self.graph.add_node(node_data);
        self.node_indices.insert(id, idx);

        NodeHandle {
            id,
            sender: producer,
            _marker: PhantomData,
        }
    }

    /// Connect output of `from` to input of `to`. Unknown ids are ignored.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> bool {
        match (self.node_indices.get(&from), self.node_indices.get(&to)) {
            (Some(&a), Some(&b)) => {
                self.graph.update_edge(a, b, ());
                true
            }
            _ => false,
        }
    }

    pub fn is_connected(&self, from: NodeId, to: NodeId) -> bool {
        match (self.node_indices.get(&from), self.node_indices.get(&to)) {
            (Some(&a), Some(&b)) => self.graph.find_edge(a, b).is_some(),
            _ => false,
        }
    }

    /// Drop a node along with its connections and message queue.
    pub fn remove(&mut self, id: NodeId) -> bool {
        let Some(idx) = self.node_indices.remove(&id) else {
            return false;
        };
        if self.terminal == Some(idx) {
            self.terminal = None;
        }

        // petgraph fills the hole with the last node, so that one changes index
        let last = NodeIndex::new(self.graph.node_count() - 1);
        self.graph.remove_node(idx);
        if last != idx {
            if let Some(moved) = self.node_indices.values_mut().find(|i| **i == last) {
                *moved = idx;
            }
            if self.terminal == Some(last) {
                self.terminal = Some(idx);
            }
        }
        true
    }

    pub fn node_count(&self) -> usize {
        self.node_indices.len()
    }

    /// Set which node to process to (typically a sink)
    pub fn set_terminal(&mut self, id: NodeId) {
        self.terminal = self.node_indices.get(&id).copied();
    }

    /// Process one block of audio through the graph
    pub fn process(&mut self) {
        if let Some(terminal) = self.terminal {
            self.processor.process(&mut self.graph, terminal);
        }
        self.blocks_processed += 1;
    }
}
