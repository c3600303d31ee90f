//! Smoke test of the `.sna` loading path end to end through [Machine],
//! standing in for the teacher's `tests/test_boot_spectrum.rs` (which needs
//! a shipped ROM image this crate doesn't carry).
use spectrum48::cpu::InterruptMode;
use spectrum48::error::SnapshotError;
use spectrum48::formats::sna::SNA48_LEN;
use spectrum48::machine::Machine;
use spectrum48::registers::Reg16;

fn build_snapshot() -> Vec<u8> {
    let mut buf = vec![0u8; SNA48_LEN];
    buf[0] = 0x3F; // I
    buf[25] = 2; // IM2
    buf[26] = 5; // border
    buf[19] = 0b0000_0100; // IFF1/IFF2 set
    let bc: u16 = 0x1122;
    buf[13] = bc as u8;
    buf[14] = (bc >> 8) as u8;
    let sp: u16 = 0x8000;
    buf[23] = sp as u8;
    buf[24] = (sp >> 8) as u8;
    let pc: u16 = 0x6000;
    let header_len = 27;
    let sp_offset = header_len + (sp as usize - 0x4000);
    buf[sp_offset] = pc as u8;
    buf[sp_offset + 1] = (pc >> 8) as u8;
    // a byte of RAM content elsewhere in the image, to confirm it lands
    // at the right logical address.
    let probe_offset = header_len + (0x5000 - 0x4000);
    buf[probe_offset] = 0xAB;
    buf
}

#[test]
fn loading_a_snapshot_restores_registers_ram_and_pc() {
    let image = build_snapshot();
    let mut machine = Machine::new(44100);
    machine.load_sna(&image[..]).expect("well-formed 48K snapshot");

    assert_eq!(machine.pc(), 0x6000);
    assert_eq!(machine.cpu().regs().get16(Reg16::BC), 0x1122);
    assert_eq!(machine.cpu().interrupt_mode(), InterruptMode::Im2);
    assert!(machine.iff1());
    assert_eq!(machine.memory().read(0x5000), 0xAB);
}

#[test]
fn a_truncated_file_is_rejected_without_mutating_the_machine() {
    let mut machine = Machine::new(44100);
    let err = machine.load_sna(&[0u8; 10][..]).unwrap_err();
    assert!(matches!(err, SnapshotError::WrongSize { .. }));
}
