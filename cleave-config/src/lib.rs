pub mod builder;

pub use builder::{Action, Kind, ProgramBuilder, Sub};
