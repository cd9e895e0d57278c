//! # Data
//!
//! $$
//! P \in \mathbb R_{>0}^{T\times n},\qquad T\ge 2,\ n\ge 1
//! $$
//!
//! Price-history boundary: raw provider tables with explicit missing values and
//! their inner-joined, validated [`PriceHistory`] form.

pub mod history;
pub mod provider;

pub use history::InstrumentSeries;
pub use history::PriceHistory;
pub use history::PriceTable;
pub use provider::CsvPriceProvider;
pub use provider::DateRange;
pub use provider::InMemoryPriceProvider;
pub use provider::PriceHistoryProvider;
