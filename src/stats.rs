//! # Stats
//!
//! $$
//! \mu = 252\,\bar r,\qquad \Sigma = 252\,\widehat{\operatorname{Cov}}(r),\qquad \sigma_p=\sqrt{\mathbf w^\top\Sigma\mathbf w}
//! $$
//!
//! Return preprocessing and scalar portfolio metrics.

pub mod downside;
pub mod metrics;
pub mod returns;

pub use downside::downside_deviation;
pub use downside::sortino;
pub use metrics::portfolio_return;
pub use metrics::portfolio_variance;
pub use metrics::portfolio_volatility;
pub use metrics::sharpe;
pub use returns::annualized_covariance;
pub use returns::annualized_mean;
pub use returns::log_returns;
pub use returns::ReturnSeries;

/// Trading periods per year used for annualization unless configured otherwise.
pub const TRADING_DAYS: f64 = 252.0;
