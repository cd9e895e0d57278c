//! # frontier-rs
//!
//! $$
//! \mathbf w^\*=\arg\max_{\mathbf w\in\Delta^{n-1}}\frac{\mathbf w^\top\mu-r_f}{\sigma(\mathbf w)}
//! $$
//!
//! Long-only portfolio analytics over aligned daily close prices:
//!
//! - [`data`]: price history providers and inner-join alignment.
//! - [`stats`]: log returns, annualized moments, volatility, Sharpe and
//!   downside (Sortino) metrics.
//! - [`portfolio`]: random simplex sampling, Nelder–Mead optimizers for
//!   minimum variance, maximum Sharpe and maximum Sortino, the efficient
//!   frontier, reports and the end-to-end [`portfolio::PortfolioEngine`].
//!
//! Every weight vector produced by the crate is non-negative and sums to one.

pub mod data;
pub mod error;
pub mod portfolio;
pub mod stats;

pub use error::PortfolioError;
pub use error::Result;
