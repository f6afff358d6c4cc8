//! Condition and document matching.

mod condition;
mod crosswalk;
mod keyword;
mod normalize;

pub use condition::*;
pub use crosswalk::*;
pub use keyword::*;
pub use normalize::*;
