//! Domain models for the prepscreen engine.

mod document;
mod evidence;
mod patient;
mod screening;
mod screening_type;

pub use document::*;
pub use evidence::*;
pub use patient::*;
pub use screening::*;
pub use screening_type::*;
