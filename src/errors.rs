use thiserror::Error;

use crate::orders::{OrderId, Quantity};

/// Violations of order accounting rules.
///
/// These indicate a bug in the caller or the engine rather than a rejectable
/// order; the matching loop sizes every fill with `min`, so it treats them as
/// unreachable.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderError {
    #[error("order {id}: fill of {requested} exceeds remaining quantity {remaining}")]
    Overfill {
        id: OrderId,
        requested: Quantity,
        remaining: Quantity,
    },
    #[error("order {id}: only market orders can be repriced to good-till-cancel")]
    NotMarket { id: OrderId },
}
