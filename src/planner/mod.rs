//! Planner Module
//!
//! The decision core: RAID validation, node eligibility, churn-minimizing
//! node planning, disk-group assembly, and the engine tying them together.

pub mod eligibility;
pub mod engine;
pub mod group_builder;
pub mod node_plan;
pub mod raid;

pub use eligibility::*;
pub use engine::*;
pub use group_builder::*;
pub use node_plan::*;
pub use raid::*;
