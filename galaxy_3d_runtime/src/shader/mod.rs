/// Compiled shader bytecode

pub mod shader_library;

pub use shader_library::*;
