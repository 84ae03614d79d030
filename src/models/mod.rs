pub mod actor;
pub mod item;

pub use actor::Actor;
pub use item::{Decision, Outcome, ReviewableItem, Status, StatusEvent, Variant};
