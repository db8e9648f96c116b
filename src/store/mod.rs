pub mod fixtures;
pub mod loader;
pub mod reference;

pub use loader::load_reference_data;
pub use reference::{ReferenceData, ReferenceStore};
