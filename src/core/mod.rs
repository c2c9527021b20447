//! Core data models and pure derivations

pub mod auth_file;
pub mod excluded_models;
pub mod identity;
pub mod key_stats;
pub mod masking;
pub mod quota_window;
pub mod status_bar;
pub mod timestamp;
pub mod usage_detail;

pub use auth_file::*;
pub use excluded_models::*;
pub use key_stats::*;
pub use masking::*;
pub use quota_window::*;
pub use status_bar::*;
pub use timestamp::*;
pub use usage_detail::*;
