//! Sources of synthetic run traces.

mod procedural;

pub use procedural::{GeneratedRun, ProceduralTrace, TraceConfig};
