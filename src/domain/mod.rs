//! Domain module
pub mod aggregates;
pub mod events;
pub mod value_objects;
