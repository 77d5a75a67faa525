//! Pipeline listeners shipped with the crate.
//!
//! Each listener registers itself on the events it cares about via its
//! `attach` method; the embedding application composes them at startup.

mod preparation;
mod transformation_cache;
mod transformer;

pub use preparation::MediaPreparation;
pub use transformation_cache::{CACHE_STATE_HEADER, TransformationCache};
pub use transformer::TransformPipeline;
