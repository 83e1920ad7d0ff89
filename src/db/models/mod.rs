pub mod reference;

pub use reference::{ClassPrototype, ReferenceRecord};
