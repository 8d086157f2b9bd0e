//! Lectern Core - Domain types shared by the ingestion pipeline.

mod error;
mod media;
mod source;
mod unit;

pub use error::{Error, Result};
pub use media::*;
pub use source::{BatchContext, SourceId, SourceRef};
pub use unit::{ContentUnit, UnitId};
