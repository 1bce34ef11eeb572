/// Small helpers shared by the runtime modules

pub mod alignment;

pub use alignment::*;
