pub mod config;
pub mod copy;
pub mod dictionary;
pub mod error;
pub mod fuzzy;
pub mod geocode;
pub mod io;
pub mod mapping;
pub mod model;
pub mod normalize;
pub mod progress;
pub mod run;
pub mod substitute;

pub use error::{ReconcileError, Result};
