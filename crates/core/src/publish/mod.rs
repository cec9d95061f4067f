//! # Publishing
//!
//! Turns saved artifacts into a change proposal.

pub mod body;
pub mod publisher;

pub use body::ProposalText;
pub use publisher::{PublishPlan, PublishProgress, PublishRequest, Publisher};
