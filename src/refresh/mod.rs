//! Quota refresh state and background polling

mod coordinator;
mod features;
mod poller;
mod state;

#[cfg(test)]
pub(crate) mod mock;

pub use coordinator::{ItemOutcome, QuotaCoordinator, RefreshOutcome, RefreshScope};
pub use features::UnsupportedFeatures;
pub use poller::{Poller, UsageView};
