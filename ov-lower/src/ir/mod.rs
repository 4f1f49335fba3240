//! In-crate model of the target engine's node graph.

pub mod graph;
pub mod ov;
pub mod shape;

pub use graph::{Graph, Model, Node, NodeId};
pub use ov::{
    ConvAttrs, CoordinateTransformMode, ElementType, InterpolateAttrs, OvOp, PadType, PoolAttrs,
};
pub use shape::ShapeError;
