//! Canonical engine-agnostic metadata model

mod arena;
mod elements;
mod types;

pub use arena::{TableArena, TableHandle};
pub use elements::*;
pub use types::{AnalogType, AutoIncrement, DataCategory, DbType};
