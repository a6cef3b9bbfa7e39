#![no_std]
pub mod keycodes;
pub mod macro_wire;

pub const PROGRAM_VERSION: u8 = 1;
