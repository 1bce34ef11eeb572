/// GPU/CPU synchronization

pub mod fence;

pub use fence::*;
