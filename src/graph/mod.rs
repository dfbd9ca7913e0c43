//! This module contains the construction of the information flow graph for a
//! replayed trace.
//!
//! The graph has one node per replayed step, plus one for [`PRESTATE`]. An edge
//! from `a` to `b` says that step `b` read bytes that step `a` produced, and
//! carries exactly those bytes. Steps can be linked by more than one edge, as
//! an instruction may read several values produced by the same step.
//!
//! Provenance always points backwards in the trace, so the graph is acyclic.

use std::collections::{BTreeSet, HashMap};

use petgraph::{
    algo::has_path_connecting,
    graph::NodeIndex,
    stable_graph::StableDiGraph,
    visit::{EdgeRef, IntoEdgeReferences},
    Direction,
};

use crate::{
    constant::PRESTATE,
    data::{ByteGroup, StepIndex},
    flow::AccessKind,
    opcode::Instruction,
};

/// The information carried along an edge of the graph.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct FlowEdge {
    /// The kind of storage the consuming step read the bytes from.
    pub kind: AccessKind,

    /// The bytes that the consuming step read from the producing step.
    pub value: ByteGroup,
}

/// A directed multigraph of the data dependencies between the steps of a
/// trace.
#[derive(Clone, Debug)]
pub struct InformationFlowGraph {
    graph: StableDiGraph<StepIndex, FlowEdge>,
    nodes: HashMap<StepIndex, NodeIndex>,
}

impl InformationFlowGraph {
    /// Builds the graph for the replayed `instructions`.
    ///
    /// Instructions whose flow is not modelled only contribute edges for the
    /// stack items they consumed.
    #[must_use]
    pub fn build(instructions: &[Instruction]) -> Self {
        let mut result = Self {
            graph: StableDiGraph::new(),
            nodes: HashMap::new(),
        };
        result.node_for(PRESTATE);

        for instruction in instructions {
            let consumer = instruction.step_index();
            result.node_for(consumer);

            let reads: Vec<(AccessKind, &ByteGroup)> = match instruction.accesses() {
                Some(accesses) => accesses.iter().map(|a| (a.kind(), a.value())).collect(),
                None => instruction
                    .stack_inputs()
                    .iter()
                    .map(|value| (AccessKind::Stack, value))
                    .collect(),
            };
            for (kind, value) in reads {
                result.add_read(consumer, kind, value);
            }
        }

        result
    }

    /// Adds one edge per distinct producer of `value`, which was read by the
    /// step `consumer`.
    ///
    /// Bytes attributed to the consumer itself (such as zero padding) are not
    /// dependencies.
    fn add_read(&mut self, consumer: StepIndex, kind: AccessKind, value: &ByteGroup) {
        let to = self.node_for(consumer);
        for producer in value.depends_on() {
            if producer == consumer {
                continue;
            }
            let from = self.node_for(producer);
            let value = value.produced_by(producer);
            self.graph.add_edge(from, to, FlowEdge { kind, value });
        }
    }

    fn node_for(&mut self, step: StepIndex) -> NodeIndex {
        let graph = &mut self.graph;
        *self.nodes.entry(step).or_insert_with(|| graph.add_node(step))
    }

    /// Gets the number of steps in the graph, including [`PRESTATE`].
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Gets the number of edges in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Checks if `step` is a node of the graph.
    #[must_use]
    pub fn contains(&self, step: StepIndex) -> bool {
        self.nodes.contains_key(&step)
    }

    /// Gets every edge from `producer` to `consumer`.
    #[must_use]
    pub fn edges_between(&self, producer: StepIndex, consumer: StepIndex) -> Vec<&FlowEdge> {
        let (Some(from), Some(to)) = (self.nodes.get(&producer), self.nodes.get(&consumer)) else {
            return Vec::new();
        };
        self.graph
            .edges_connecting(*from, *to)
            .map(|edge| edge.weight())
            .collect()
    }

    /// Gets the steps that produced a value read by `step`.
    #[must_use]
    pub fn producers_of(&self, step: StepIndex) -> BTreeSet<StepIndex> {
        self.neighbours(step, Direction::Incoming)
    }

    /// Gets the steps that read a value produced by `step`.
    #[must_use]
    pub fn consumers_of(&self, step: StepIndex) -> BTreeSet<StepIndex> {
        self.neighbours(step, Direction::Outgoing)
    }

    fn neighbours(&self, step: StepIndex, direction: Direction) -> BTreeSet<StepIndex> {
        self.nodes
            .get(&step)
            .map(|node| {
                self.graph
                    .neighbors_directed(*node, direction)
                    .map(|n| self.graph[n])
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Checks if information flows, directly or transitively, from the step
    /// `producer` to the step `consumer`.
    #[must_use]
    pub fn depends_on(&self, consumer: StepIndex, producer: StepIndex) -> bool {
        match (self.nodes.get(&producer), self.nodes.get(&consumer)) {
            (Some(from), Some(to)) if from != to => {
                has_path_connecting(&self.graph, *from, *to, None)
            }
            _ => false,
        }
    }

    /// Iterates over every edge as `(producer, consumer, edge)`.
    pub fn edges(&self) -> impl Iterator<Item = (StepIndex, StepIndex, &FlowEdge)> + '_ {
        self.graph.edge_references().map(|edge| {
            (
                self.graph[edge.source()],
                self.graph[edge.target()],
                edge.weight(),
            )
        })
    }

    /// Gets the underlying graph, whose node weights are step indices.
    #[must_use]
    pub fn inner(&self) -> &StableDiGraph<StepIndex, FlowEdge> {
        &self.graph
    }
}

/// Builds the information flow graph for the replayed `instructions`.
#[must_use]
pub fn build_information_flow_graph(instructions: &[Instruction]) -> InformationFlowGraph {
    InformationFlowGraph::build(instructions)
}
