//! Single-instruction conformance vectors (spec.md §8), each checked
//! end-to-end against [Cpu::execute_one] the way the teacher's
//! `tests/test_fuse.rs` drives fixture vectors against the full core rather
//! than unit-testing individual handlers.
use spectrum48::bus::Bus;
use spectrum48::cpu::{Cpu, InterruptMode};
use spectrum48::memory::Memory;
use spectrum48::registers::{Reg16, Reg8};

fn harness() -> (Cpu, Memory, Bus) {
    let mut cpu = Cpu::new();
    cpu.regs_mut().set_pc(0);
    let mut mem = Memory::new(4);
    mem.set_rom_flags([false, false, false, false]);
    (cpu, mem, Bus::new())
}

#[test]
fn ld_bc_nn_loads_immediate() {
    let (mut cpu, mut mem, mut bus) = harness();
    mem.write(0, 0x01);
    mem.write(1, 0x34);
    mem.write(2, 0x12);
    let t = cpu.execute_one(&mut mem, &mut bus).unwrap();
    assert_eq!(cpu.regs().get16(Reg16::BC), 0x1234);
    assert_eq!(cpu.pc(), 3);
    assert_eq!(t, 10);
}

#[test]
fn djnz_taken_wraps_to_the_relative_target() {
    let (mut cpu, mut mem, mut bus) = harness();
    cpu.regs_mut().set_pc(0x0040);
    cpu.regs_mut().set8(Reg8::B, 0);
    mem.write(0x0040, 0x10);
    mem.write(0x0041, 0x44);
    let t = cpu.execute_one(&mut mem, &mut bus).unwrap();
    assert_eq!(cpu.pc(), 0x0046);
    assert_eq!(t, 13);
}

#[test]
fn bit_0_hl_on_a_zero_byte_sets_zero_half_carry_and_parity() {
    let (mut cpu, mut mem, mut bus) = harness();
    cpu.regs_mut().set16(Reg16::HL, 0x1234);
    mem.write(0, 0xCB);
    mem.write(1, 0x46);
    let t = cpu.execute_one(&mut mem, &mut bus).unwrap();
    let f = cpu.regs().flags();
    assert!(f.zero());
    assert!(f.half_carry());
    assert!(f.parity());
    assert_eq!(t, 12);
}

#[test]
fn inc_ix_minus_one_increments_the_indexed_byte() {
    let (mut cpu, mut mem, mut bus) = harness();
    cpu.regs_mut().set16(Reg16::IX, 0x1235);
    mem.write(0, 0xDD);
    mem.write(1, 0x34);
    mem.write(2, 0xFF); // displacement -1
    mem.write(0x1234, 0x00);
    let t = cpu.execute_one(&mut mem, &mut bus).unwrap();
    assert_eq!(mem.read(0x1234), 1);
    assert!(!cpu.regs().flags().zero());
    assert_eq!(t, 23);
}

#[test]
fn ldir_final_iteration_copies_the_byte_and_clears_bc_and_parity() {
    let (mut cpu, mut mem, mut bus) = harness();
    cpu.regs_mut().set16(Reg16::BC, 1);
    cpu.regs_mut().set16(Reg16::HL, 0xF000);
    cpu.regs_mut().set16(Reg16::DE, 0x2345);
    mem.write(0xF000, 0x55);
    mem.write(0, 0xED);
    mem.write(1, 0xB0);
    let t = cpu.execute_one(&mut mem, &mut bus).unwrap();
    assert_eq!(mem.read(0x2345), 0x55);
    assert_eq!(cpu.regs().get16(Reg16::BC), 0);
    assert!(!cpu.regs().flags().parity());
    assert_eq!(cpu.pc(), 2);
    assert_eq!(t, 16);
}

#[test]
fn im_2_sets_the_interrupt_mode_register() {
    let (mut cpu, mut mem, mut bus) = harness();
    mem.write(0, 0xED);
    mem.write(1, 0x5E);
    let t = cpu.execute_one(&mut mem, &mut bus).unwrap();
    assert_eq!(cpu.interrupt_mode(), InterruptMode::Im2);
    assert_eq!(t, 8);
}

#[test]
fn add8_truth_table_matches_published_flags_for_a_sample() {
    use spectrum48::alu::add8;
    let (result, flags) = add8(0x0F, 0x01, false);
    assert_eq!(result, 0x10);
    assert!(flags.half_carry());
    assert!(!flags.carry());
}

#[test]
fn ei_defers_the_next_interrupt_by_exactly_one_instruction() {
    let (mut cpu, mut mem, mut bus) = harness();
    cpu.set_iffs(false, false);
    mem.write(0, 0xFB); // EI
    mem.write(1, 0x00); // NOP
    mem.write(2, 0x00); // NOP
    cpu.execute_one(&mut mem, &mut bus).unwrap();
    cpu.interrupt();
    assert_eq!(cpu.pc(), 1);
    cpu.execute_one(&mut mem, &mut bus).unwrap(); // the deferred instruction runs uninterrupted
    assert_eq!(cpu.pc(), 2);
}
