//! `CB`-prefixed rotate/shift/`BIT`/`RES`/`SET` dispatch, including the
//! `DDCB`/`FDCB` indexed forms and their documented "shadow register" quirk.
use super::decode::{self, IndexMode, RotOp};
use super::Cpu;
use crate::alu;
use crate::memory::Memory;
use crate::registers::Reg8;

fn apply_rot_with_flags(op: RotOp, v: u8, flags: crate::flags::Flags) -> (u8, crate::flags::Flags) {
    match op {
        RotOp::Rlc => alu::rlc(v),
        RotOp::Rrc => alu::rrc(v),
        RotOp::Rl => alu::rl(v, flags),
        RotOp::Rr => alu::rr(v, flags),
        RotOp::Sla => alu::sla(v),
        RotOp::Sra => alu::sra(v),
        RotOp::Sll => alu::sll(v),
        RotOp::Srl => alu::srl(v),
    }
}

/// Plain (non-indexed) `CB xx`. A preceding `DD`/`FD` is routed to
/// [dispatch_indexed] by [super::Cpu::execute_one] instead.
pub fn dispatch(cpu: &mut Cpu, mem: &mut Memory) -> bool {
    let opcode = cpu.fetch_opcode_byte(mem);
    let op = decode::decode(opcode);

    if op.z == 6 {
        let addr = cpu.regs.get16(crate::registers::Reg16::HL);
        let v = cpu.read_mem(mem, addr);
        match op.x {
            0 => {
                let (result, flags) = apply_rot_with_flags(decode::rot_op(op.y), v, cpu.flags());
                cpu.charge(1);
                cpu.write_mem(mem, addr, result);
                cpu.set_flags(flags);
            }
            1 => {
                let flags = alu::bit(v, 1 << op.y, cpu.flags(), (cpu.regs.wz() >> 8) as u8);
                cpu.charge(1);
                cpu.set_flags(flags);
            }
            2 => {
                let result = v & !(1 << op.y);
                cpu.charge(1);
                cpu.write_mem(mem, addr, result);
            }
            3 => {
                let result = v | (1 << op.y);
                cpu.charge(1);
                cpu.write_mem(mem, addr, result);
            }
            _ => unreachable!(),
        }
    } else {
        let reg = decode::reg8(op.z, IndexMode::None);
        let v = cpu.regs.get8(reg);
        match op.x {
            0 => {
                let (result, flags) = apply_rot_with_flags(decode::rot_op(op.y), v, cpu.flags());
                cpu.regs.set8(reg, result);
                cpu.set_flags(flags);
            }
            1 => {
                let flags = alu::bit(v, 1 << op.y, cpu.flags(), v);
                cpu.set_flags(flags);
            }
            2 => cpu.regs.set8(reg, v & !(1 << op.y)),
            3 => cpu.regs.set8(reg, v | (1 << op.y)),
            _ => unreachable!(),
        }
    }
    true
}

/// `DD CB d op` / `FD CB d op`: the displacement is read first (the normal
/// indirect pre-pass, minus its usual charge since the timing here differs
/// from the plain indexed load/store forms), then the CB sub-opcode.
///
/// Undocumented opcodes where `z != 6` both perform the operation on
/// `(IX+d)`/`(IY+d)` *and* copy the result into the plain 8-bit register
/// named by `z` (never `IXH`/`IXL`) — the well-documented "shadow register"
/// side effect of this instruction family.
pub fn dispatch_indexed(cpu: &mut Cpu, mem: &mut Memory, mode: IndexMode) -> bool {
    let d = cpu.fetch_byte(mem) as i8;
    let sub_opcode = cpu.fetch_byte(mem);
    let base = cpu.regs.get16(mode.reg16());
    let addr = base.wrapping_add(d as i16 as u16);
    cpu.regs.set_wz(addr);

    let op = decode::decode(sub_opcode);
    let v = cpu.read_mem(mem, addr);

    match op.x {
        1 => {
            let flags = alu::bit(v, 1 << op.y, cpu.flags(), (addr >> 8) as u8);
            cpu.charge(3);
            cpu.set_flags(flags);
        }
        _ => {
            let result = match op.x {
                0 => {
                    let (result, flags) = apply_rot_with_flags(decode::rot_op(op.y), v, cpu.flags());
                    cpu.set_flags(flags);
                    result
                }
                2 => v & !(1 << op.y),
                3 => v | (1 << op.y),
                _ => unreachable!(),
            };
            cpu.charge(3);
            cpu.write_mem(mem, addr, result);
            if op.z != 6 {
                cpu.regs.set8(decode::reg8(op.z, IndexMode::None), result);
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::Cpu as CpuT;
    use crate::memory::Memory;
    use crate::registers::Reg16;

    #[test]
    fn bit_b_hl_leaks_wz_high_byte_into_35() {
        let mut cpu = CpuT::new();
        cpu.regs_mut().set_pc(0);
        cpu.regs_mut().set16(Reg16::HL, 0x4000);
        cpu.regs_mut().set_wz(0x2800);
        let mut mem = Memory::new(4);
        mem.set_rom_flags([false, false, false, false]);
        mem.write(0, 0xCB);
        mem.write(1, 0x46); // BIT 0,(HL)
        let mut bus = crate::bus::Bus::new();
        cpu.execute_one(&mut mem, &mut bus).unwrap();
        assert!(cpu.regs().flags().flag5());
        assert!(cpu.regs().flags().flag3());
    }

    #[test]
    fn rlc_hl_costs_fifteen_t_states() {
        let mut cpu = CpuT::new();
        cpu.regs_mut().set_pc(0);
        cpu.regs_mut().set16(Reg16::HL, 0x4000);
        let mut mem = Memory::new(4);
        mem.set_rom_flags([false, false, false, false]);
        mem.write(0, 0xCB);
        mem.write(1, 0x06); // RLC (HL)
        mem.write(0x4000, 0x80);
        let mut bus = crate::bus::Bus::new();
        let t = cpu.execute_one(&mut mem, &mut bus).unwrap();
        assert_eq!(t, 15);
    }

    #[test]
    fn bit_0_ix_plus_d_costs_twenty_t_states() {
        let mut cpu = CpuT::new();
        cpu.regs_mut().set_pc(0);
        cpu.regs_mut().set16(Reg16::IX, 0x4000);
        let mut mem = Memory::new(4);
        mem.set_rom_flags([false, false, false, false]);
        mem.write(0, 0xDD);
        mem.write(1, 0xCB);
        mem.write(2, 0x05); // displacement
        mem.write(3, 0x46); // BIT 0,(IX+5)
        mem.write(0x4005, 0x01);
        let mut bus = crate::bus::Bus::new();
        let t = cpu.execute_one(&mut mem, &mut bus).unwrap();
        assert_eq!(t, 20);
    }

    #[test]
    fn set_4_ix_plus_d_costs_twenty_three_t_states() {
        let mut cpu = CpuT::new();
        cpu.regs_mut().set_pc(0);
        cpu.regs_mut().set16(Reg16::IX, 0x4000);
        let mut mem = Memory::new(4);
        mem.set_rom_flags([false, false, false, false]);
        mem.write(0, 0xDD);
        mem.write(1, 0xCB);
        mem.write(2, 0x05); // displacement
        mem.write(3, 0xE6); // SET 4,(IX+5)
        mem.write(0x4005, 0x00);
        let mut bus = crate::bus::Bus::new();
        let t = cpu.execute_one(&mut mem, &mut bus).unwrap();
        assert_eq!(mem.read(0x4005), 0x10);
        assert_eq!(t, 23);
    }

    #[test]
    fn ddcb_undocumented_opcode_echoes_into_plain_register() {
        let mut cpu = CpuT::new();
        cpu.regs_mut().set_pc(0);
        cpu.regs_mut().set16(Reg16::IX, 0x4000);
        let mut mem = Memory::new(4);
        mem.set_rom_flags([false, false, false, false]);
        mem.write(0, 0xDD);
        mem.write(1, 0xCB);
        mem.write(2, 0x05); // displacement
        mem.write(3, 0x00); // RLC (IX+5),B (undocumented)
        mem.write(0x4005, 0x80);
        let mut bus = crate::bus::Bus::new();
        cpu.execute_one(&mut mem, &mut bus).unwrap();
        assert_eq!(mem.read(0x4005), 0x01);
        assert_eq!(cpu.regs().get8(Reg8::B), 0x01);
    }
}
