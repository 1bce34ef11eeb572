/// Shader resource binding: descriptor tables and their compiled layouts

pub mod descriptor_table;
pub mod layout_builder;

pub use descriptor_table::*;
pub use layout_builder::*;
