//! A cycle-accurate Z80 core and ZX Spectrum 48K bus emulator.
//!
//! The crate is organized bottom-up, the way the teacher's workspace is:
//! value types first ([flags], [registers], [alu]), then the address space
//! ([memory]) and the engine that drives it ([cpu]), then the peripherals
//! that hang off the bus ([video], [audio], [io]), and finally the glue
//! that wires them into a runnable machine ([machine], [formats]).
#[macro_use]
extern crate bitflags;

pub mod alu;
pub mod audio;
pub mod bus;
pub mod cpu;
pub mod error;
pub mod flags;
pub mod formats;
pub mod io;
pub mod machine;
pub mod memory;
pub mod registers;
pub mod video;

pub use cpu::Cpu;
pub use machine::Machine;
pub use memory::Memory;
