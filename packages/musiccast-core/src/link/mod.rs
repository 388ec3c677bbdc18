//! Distribution group linking.
//!
//! - [`group_id`]: the 128-bit group identifier
//! - [`registry`]: groups formed by this controller
//! - [`linker`]: the link / unlink / verification protocol

pub mod group_id;
pub mod linker;
pub mod registry;

pub use group_id::GroupId;
pub use linker::{GroupLinker, LinkError, LinkStep, ServerCheck};
pub use registry::{DistributionGroup, GroupMember, GroupRegistry};
