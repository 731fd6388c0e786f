pub mod boundary;
pub mod config;
pub mod detectors;
pub mod error;
pub mod filter;
pub mod io;
pub mod landmarks;
pub mod output;
pub mod phases;
pub mod pipeline;
pub mod plot;
pub mod signal;

pub use error::{PqrstError, Result};
pub use filter::*;
pub use landmarks::*;
pub use phases::*;
pub use signal::*;
