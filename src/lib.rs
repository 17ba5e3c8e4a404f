//! marketflush - best-price aggregation for market order streams
//!
//! See [`pipeline`] for the architecture. The `pipeline_runtime` binary wires
//! a NATS subscription into a SQLite best-price table.

pub mod pipeline;
