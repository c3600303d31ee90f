//! Peripherals that communicate with the CPU purely through I/O ports
//! rather than the memory map.
pub mod keyboard;
