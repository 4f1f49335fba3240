//! TFLite partition support checking and lowering into an OpenVINO-style
//! node graph.

pub mod config;
pub mod ir;
pub mod lower;
pub mod tflite;

pub use config::DelegateOptions;
pub use lower::{lower_subgraph, Error, LoweredSubgraph, Result};
