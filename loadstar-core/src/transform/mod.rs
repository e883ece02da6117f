//! Pure transformation stages between extraction and loading.
//!
//! Each stage is a function over its inputs returning new sequences — no
//! shared mutable table object flows between stages. The coordinator in
//! `loadstar-pipeline` composes them explicitly:
//! raw prices -> [`analyze_prices`] -> writer, and
//! raw transactions -> [`resolve_dimensions`] -> [`assemble_facts`] -> writer.

pub mod analyzed;
pub mod dimensions;
pub mod facts;

pub use analyzed::{analyze_prices, TransformError};
pub use dimensions::{resolve_dimensions, MissingDimensionPolicy, ResolvedKeys};
pub use facts::{assemble_facts, FactBatch, ResolutionFailure};
