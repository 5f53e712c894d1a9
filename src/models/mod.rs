pub mod product;
pub mod site;

pub use product::*;
pub use site::*;

/// Rendered in CSV cells for fields the LLM could not fill.
pub const NULL_SENTINEL: &str = "N/A";
