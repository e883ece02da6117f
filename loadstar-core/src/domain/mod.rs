//! Domain types for Loadstar.

pub mod price;
pub mod transaction;
pub mod warehouse;

pub use price::{AnalyzedObservation, PriceObservation};
pub use transaction::RawTransaction;
pub use warehouse::{FactRow, ProductDimension, UserDimension};

/// Entity identifier type alias (a ticker symbol in the price pipeline).
pub type EntityId = String;
