//! The `.sna` snapshot loader (§6), grounded on the teacher's
//! `spectrusty-formats::sna::read_sna48`: a fixed 27-byte header describing
//! every register plus a flat 48 KiB RAM image, with the program counter
//! recovered by popping it back off the stack the snapshot encodes.
use std::io::Read;

use crate::cpu::{Cpu, InterruptMode};
use crate::error::SnapshotError;
use crate::memory::Memory;
use crate::registers::Reg16;

const HEADER_LEN: usize = 27;
const RAM_LEN: usize = 0xC000;
pub const SNA48_LEN: usize = HEADER_LEN + RAM_LEN;

/// Parses the 27-byte header (offsets per spec.md §6) and applies it to
/// `cpu`, returning the border color found at offset 26.
fn load_header(header: &[u8; HEADER_LEN], cpu: &mut Cpu) -> u8 {
    cpu.reset();
    let word = |lo: usize| u16::from_le_bytes([header[lo], header[lo + 1]]);

    cpu.regs_mut().set_i(header[0]);
    cpu.regs_mut().set16(Reg16::HL_, word(1));
    cpu.regs_mut().set16(Reg16::DE_, word(3));
    cpu.regs_mut().set16(Reg16::BC_, word(5));
    cpu.regs_mut().set16(Reg16::AF_, word(7));
    cpu.regs_mut().set16(Reg16::HL, word(9));
    cpu.regs_mut().set16(Reg16::DE, word(11));
    cpu.regs_mut().set16(Reg16::BC, word(13));
    cpu.regs_mut().set16(Reg16::IY, word(15));
    cpu.regs_mut().set16(Reg16::IX, word(17));
    let iffs = header[19] & 0b0000_0100 != 0;
    cpu.set_iffs(iffs, iffs);
    cpu.regs_mut().set_r(header[20]);
    cpu.regs_mut().set16(Reg16::AF, word(21));
    cpu.regs_mut().set_sp(word(23));
    cpu.set_interrupt_mode(match header[25] {
        0 => InterruptMode::Im0,
        1 => InterruptMode::Im1,
        _ => InterruptMode::Im2,
    });
    header[26] & 0x07
}

/// Loads a 48K `.sna` image from `reader` into `mem` and `cpu`, returning
/// the border color. `reader` must yield exactly [SNA48_LEN] bytes; any
/// other length is a hard error per spec.md §6.
pub fn load<R: Read>(mut reader: R, cpu: &mut Cpu, mem: &mut Memory) -> Result<u8, SnapshotError> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    if buf.len() != SNA48_LEN {
        return Err(SnapshotError::WrongSize { expected: SNA48_LEN, found: buf.len() });
    }

    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&buf[..HEADER_LEN]);
    let border = load_header(&header, cpu);

    for (offset, &byte) in buf[HEADER_LEN..].iter().enumerate() {
        mem.write(0x4000u16.wrapping_add(offset as u16), byte);
    }

    // The SNA format stores PC the way an interrupt acknowledge would have
    // pushed it: popping it back off the stack both recovers it and leaves
    // SP exactly where execution should resume from.
    let sp = cpu.regs().sp();
    let pc = mem.read16(sp);
    cpu.regs_mut().set_sp(sp.wrapping_add(2));
    cpu.regs_mut().set_pc(pc);

    Ok(border)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_image(border: u8) -> Vec<u8> {
        let mut buf = vec![0u8; SNA48_LEN];
        buf[25] = 1; // IM1
        buf[26] = border;
        buf[19] = 0b0000_0100; // IFF1/IFF2 set
        buf[21] = 0xD7; // F
        buf[22] = 0x12; // A
        let sp: u16 = 0xFF00;
        buf[23] = sp as u8;
        buf[24] = (sp >> 8) as u8;
        let pc: u16 = 0x8000;
        let sp_offset = HEADER_LEN + (sp as usize - 0x4000);
        buf[sp_offset] = pc as u8;
        buf[sp_offset + 1] = (pc >> 8) as u8;
        buf
    }

    #[test]
    fn loads_header_ram_and_recovers_pc_from_the_stack() {
        let image = sample_image(4);
        let mut cpu = Cpu::new();
        let mut mem = Memory::new_48k();
        let border = load(&image[..], &mut cpu, &mut mem).unwrap();
        assert_eq!(border, 4);
        assert_eq!(cpu.interrupt_mode(), InterruptMode::Im1);
        assert!(cpu.iff1());
        assert_eq!(cpu.regs().get16(Reg16::AF), 0x12D7);
        assert_eq!(cpu.pc(), 0x8000);
        assert_eq!(cpu.regs().sp(), 0xFF02);
    }

    #[test]
    fn wrong_size_is_rejected() {
        let mut cpu = Cpu::new();
        let mut mem = Memory::new_48k();
        let err = load(&[0u8; 100][..], &mut cpu, &mut mem).unwrap_err();
        assert!(matches!(err, SnapshotError::WrongSize { expected: SNA48_LEN, found: 100 }));
    }
}
