//! Data model
//!
//! Stage identity lives in `stage`, site-wide settings in `site`.

mod site;
mod stage;

pub use site::*;
pub use stage::*;
