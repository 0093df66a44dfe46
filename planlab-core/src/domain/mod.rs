//! Domain types for the planning engine.

pub mod instrument;
pub mod opportunity;
pub mod portfolio;
pub mod position;
pub mod sequence;

pub use instrument::Instrument;
pub use opportunity::{Opportunity, Side};
pub use portfolio::{PortfolioState, TradeCosts, TradeEffect, TradeViolation};
pub use position::Position;
pub use sequence::{Sequence, SequenceStep};
