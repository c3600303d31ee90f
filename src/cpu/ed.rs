//! `ED`-prefixed dispatch: 16-bit `ADC`/`SBC`, the extended load forms, the
//! block transfer/search/I-O instruction families, `NEG`, `RETN`/`RETI`,
//! interrupt-mode selection, `RRD`/`RLD`, and `LD A,I`/`LD A,R`/`LD I,A`/`LD R,A`.
//!
//! Every `ED xx` byte pair not named by the documented table runs as an
//! 8 T-state `NOP`, matching real silicon rather than raising
//! [crate::error::CpuError::UnknownOpcode].
use super::decode::{self, IndexMode};
use super::{Cpu, InterruptMode};
use crate::alu;
use crate::bus::Bus;
use crate::flags::Flags;
use crate::memory::Memory;
use crate::registers::{Reg16, Reg8};

pub fn dispatch(cpu: &mut Cpu, mem: &mut Memory, bus: &mut Bus) -> bool {
    let opcode = cpu.fetch_opcode_byte(mem);
    let op = decode::decode(opcode);

    match op.x {
        1 => dispatch_x1(cpu, mem, bus, op),
        2 if op.y >= 4 => dispatch_block(cpu, mem, bus, op),
        _ => true, // undefined ED byte: 8 T-state NOP
    }
}

fn dispatch_x1(cpu: &mut Cpu, mem: &mut Memory, bus: &mut Bus, op: decode::Opcode) -> bool {
    match op.z {
        0 => {
            let port = cpu.regs.get16(Reg16::BC);
            let v = bus.read(port);
            cpu.charge(4);
            if op.y != 6 {
                cpu.regs.set8(decode::reg8(op.y, IndexMode::None), v);
            }
            let flags = Flags::empty()
                .with_sz53_from(v)
                .with_parity_of(v)
                .with(Flags::CARRY, cpu.flags().carry());
            cpu.set_flags(flags);
            cpu.regs.set_wz(port.wrapping_add(1));
            true
        }
        1 => {
            let port = cpu.regs.get16(Reg16::BC);
            let v = if op.y == 6 { 0 } else { cpu.regs.get8(decode::reg8(op.y, IndexMode::None)) };
            bus.write(port, v);
            cpu.charge(4);
            cpu.regs.set_wz(port.wrapping_add(1));
            true
        }
        2 => {
            let hl = cpu.regs.get16(Reg16::HL);
            let rp = cpu.regs.get16(decode::reg_pair(op.p, IndexMode::None));
            cpu.regs.set_wz(hl.wrapping_add(1));
            let (result, flags) = if op.q == 0 {
                alu::sbc16(hl, rp, cpu.flags().carry())
            } else {
                alu::adc16(hl, rp, cpu.flags().carry())
            };
            cpu.charge(7);
            cpu.regs.set16(Reg16::HL, result);
            cpu.set_flags(flags);
            true
        }
        3 => {
            let addr = cpu.fetch_word(mem);
            let rp = decode::reg_pair(op.p, IndexMode::None);
            if op.q == 0 {
                let v = cpu.regs.get16(rp);
                cpu.write_word(mem, addr, v);
            } else {
                let v = cpu.read_word(mem, addr);
                cpu.regs.set16(rp, v);
            }
            cpu.regs.set_wz(addr.wrapping_add(1));
            true
        }
        4 => {
            let a = cpu.regs.a();
            let (result, flags) = alu::neg(a);
            cpu.regs.set_a(result);
            cpu.set_flags(flags);
            true
        }
        5 => {
            let addr = cpu.pop16(mem);
            cpu.regs.set_pc(addr);
            cpu.regs.set_wz(addr);
            cpu.iff1 = cpu.iff2;
            true
        }
        6 => {
            cpu.im = match op.y {
                0 | 1 | 4 | 5 => InterruptMode::Im0,
                2 | 6 => InterruptMode::Im1,
                3 | 7 => InterruptMode::Im2,
                _ => unreachable!(),
            };
            true
        }
        7 => dispatch_misc(cpu, mem, op.y),
        _ => unreachable!(),
    }
}

fn dispatch_misc(cpu: &mut Cpu, mem: &mut Memory, y: u8) -> bool {
    match y {
        0 => {
            let a = cpu.regs.a();
            cpu.charge(1);
            cpu.regs.set_i(a);
        }
        1 => {
            let a = cpu.regs.a();
            cpu.charge(1);
            cpu.regs.set_r(a);
        }
        2 => {
            let i = cpu.regs.i();
            cpu.charge(1);
            cpu.regs.set_a(i);
            let iff2 = cpu.iff2;
            cpu.set_flags(ld_ir_flags(cpu.flags(), i, iff2));
        }
        3 => {
            let r = cpu.regs.r();
            cpu.charge(1);
            cpu.regs.set_a(r);
            let iff2 = cpu.iff2;
            cpu.set_flags(ld_ir_flags(cpu.flags(), r, iff2));
        }
        4 => rotate_digit(cpu, mem, true),
        5 => rotate_digit(cpu, mem, false),
        _ => {} // 6, 7: undocumented 8 T-state NOP
    }
    true
}

fn ld_ir_flags(flags_in: Flags, v: u8, iff2: bool) -> Flags {
    flags_in
        .with_sz53_from(v)
        .with(Flags::HALF_CARRY, false)
        .with(Flags::SUBTRACT, false)
        .with(Flags::OVERFLOW, iff2)
}

/// `RLD` (`shift_left_into_accumulator == true`) / `RRD`.
fn rotate_digit(cpu: &mut Cpu, mem: &mut Memory, shift_left_into_accumulator: bool) {
    let hl = cpu.regs.get16(Reg16::HL);
    let v = cpu.read_mem(mem, hl);
    let a = cpu.regs.a();
    let (new_a, new_mem) = if shift_left_into_accumulator {
        ((a & 0xF0) | (v >> 4), (v << 4) | (a & 0x0F))
    } else {
        ((a & 0xF0) | (v & 0x0F), (a << 4) | (v >> 4))
    };
    cpu.charge(4);
    cpu.write_mem(mem, hl, new_mem);
    cpu.regs.set_a(new_a);
    let flags = cpu.flags().with_sz53_from(new_a).with_parity_of(new_a)
        .with(Flags::HALF_CARRY, false)
        .with(Flags::SUBTRACT, false);
    cpu.set_flags(flags);
    cpu.regs.set_wz(hl.wrapping_add(1));
}

fn dispatch_block(cpu: &mut Cpu, mem: &mut Memory, bus: &mut Bus, op: decode::Opcode) -> bool {
    let increment = op.y == 4 || op.y == 6;
    let repeating = op.y == 6 || op.y == 7;
    match op.z {
        0 => block_ld(cpu, mem, increment, repeating),
        1 => block_cp(cpu, mem, increment, repeating),
        2 => block_in(cpu, mem, bus, increment, repeating),
        3 => block_out(cpu, mem, bus, increment, repeating),
        _ => unreachable!(),
    }
    true
}

fn step_hl_de(reg: &mut crate::registers::RegisterFile, pair: Reg16, increment: bool) {
    let v = reg.get16(pair);
    reg.set16(pair, if increment { v.wrapping_add(1) } else { v.wrapping_sub(1) });
}

fn block_ld(cpu: &mut Cpu, mem: &mut Memory, increment: bool, repeating: bool) {
    let hl = cpu.regs.get16(Reg16::HL);
    let de = cpu.regs.get16(Reg16::DE);
    let v = cpu.read_mem(mem, hl);
    cpu.write_mem(mem, de, v);
    step_hl_de(cpu.regs_mut(), Reg16::HL, increment);
    step_hl_de(cpu.regs_mut(), Reg16::DE, increment);
    let bc = cpu.regs.get16(Reg16::BC).wrapping_sub(1);
    cpu.regs.set16(Reg16::BC, bc);
    cpu.charge(2);

    let n = v.wrapping_add(cpu.regs.a());
    let flags = cpu.flags()
        .with(Flags::HALF_CARRY, false)
        .with(Flags::SUBTRACT, false)
        .with(Flags::OVERFLOW, bc != 0)
        .with(Flags::FLAG3, n & 0x08 != 0)
        .with(Flags::FLAG5, n & 0x02 != 0);
    cpu.set_flags(flags);

    if repeating && bc != 0 {
        cpu.charge(5);
        let pc = cpu.regs.pc().wrapping_sub(2);
        cpu.regs.set_pc(pc);
        cpu.regs.set_wz(pc.wrapping_add(1));
    }
}

fn block_cp(cpu: &mut Cpu, mem: &mut Memory, increment: bool, repeating: bool) {
    let hl = cpu.regs.get16(Reg16::HL);
    let v = cpu.read_mem(mem, hl);
    let a = cpu.regs.a();
    let (diff, sub_flags) = alu::sub8(a, v, false);
    step_hl_de(cpu.regs_mut(), Reg16::HL, increment);
    let bc = cpu.regs.get16(Reg16::BC).wrapping_sub(1);
    cpu.regs.set16(Reg16::BC, bc);
    cpu.charge(5);

    let half = sub_flags.half_carry();
    let n = diff.wrapping_sub(u8::from(half));
    let flags = cpu.flags()
        .with(Flags::SIGN, sub_flags.sign())
        .with(Flags::ZERO, sub_flags.zero())
        .with(Flags::HALF_CARRY, half)
        .with(Flags::SUBTRACT, true)
        .with(Flags::OVERFLOW, bc != 0)
        .with(Flags::FLAG3, n & 0x08 != 0)
        .with(Flags::FLAG5, n & 0x02 != 0);
    cpu.set_flags(flags);

    if increment {
        cpu.regs.set_wz(cpu.regs.wz().wrapping_add(1));
    } else {
        cpu.regs.set_wz(cpu.regs.wz().wrapping_sub(1));
    }

    if repeating && bc != 0 && !sub_flags.zero() {
        cpu.charge(5);
        let pc = cpu.regs.pc().wrapping_sub(2);
        cpu.regs.set_pc(pc);
        cpu.regs.set_wz(pc.wrapping_add(1));
    }
}

fn io_block_flags(flags_in: Flags, b_after: u8, k: u16, v: u8) -> Flags {
    flags_in
        .with_sz53_from(b_after)
        .with(Flags::SUBTRACT, v & 0x80 != 0)
        .with(Flags::CARRY, k > 0xFF)
        .with(Flags::HALF_CARRY, k > 0xFF)
        .with(Flags::PARITY, ((k as u8 & 7) ^ b_after).count_ones() % 2 == 0)
}

fn block_in(cpu: &mut Cpu, mem: &mut Memory, bus: &mut Bus, increment: bool, repeating: bool) {
    let bc = cpu.regs.get16(Reg16::BC);
    let v = bus.read(bc);
    cpu.charge(4);
    let hl = cpu.regs.get16(Reg16::HL);
    cpu.write_mem(mem, hl, v);
    step_hl_de(cpu.regs_mut(), Reg16::HL, increment);
    let b = cpu.regs.get8(Reg8::B).wrapping_sub(1);
    cpu.regs.set8(Reg8::B, b);
    cpu.charge(1);

    let c = bc as u8;
    let k = u16::from(v) + u16::from(if increment { c.wrapping_add(1) } else { c.wrapping_sub(1) });
    cpu.set_flags(io_block_flags(cpu.flags(), b, k, v));
    cpu.regs.set_wz(bc.wrapping_add(if increment { 1 } else { u16::MAX }));

    if repeating && b != 0 {
        cpu.charge(5);
        let pc = cpu.regs.pc().wrapping_sub(2);
        cpu.regs.set_pc(pc);
    }
}

fn block_out(cpu: &mut Cpu, mem: &mut Memory, bus: &mut Bus, increment: bool, repeating: bool) {
    let hl = cpu.regs.get16(Reg16::HL);
    let v = cpu.read_mem(mem, hl);
    let b = cpu.regs.get8(Reg8::B).wrapping_sub(1);
    cpu.regs.set8(Reg8::B, b);
    let bc = cpu.regs.get16(Reg16::BC);
    bus.write(bc, v);
    cpu.charge(4);
    step_hl_de(cpu.regs_mut(), Reg16::HL, increment);
    cpu.charge(1);

    let l = cpu.regs.get8(Reg8::L);
    let k = u16::from(v) + u16::from(l);
    cpu.set_flags(io_block_flags(cpu.flags(), b, k, v));
    cpu.regs.set_wz(bc.wrapping_add(if increment { 1 } else { u16::MAX }));

    if repeating && b != 0 {
        cpu.charge(5);
        let pc = cpu.regs.pc().wrapping_sub(2);
        cpu.regs.set_pc(pc);
    }
}
