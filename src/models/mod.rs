//! Scheduling domain models.
//!
//! Core data types for rotation-assignment problems: who can be scheduled
//! ([`Resident`]), what they are scheduled onto ([`Rotation`]), the ordered
//! time axis ([`Block`]), and the typed registry tying them together
//! ([`Roster`]). All of these are immutable once a roster is built;
//! constraints refer to them by name and are resolved to dense indices at
//! model-build time.

mod resident;
mod roster;
mod rotation;

pub use resident::Resident;
pub use roster::{Block, Roster};
pub use rotation::Rotation;
