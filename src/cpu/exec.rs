//! Dispatch for the unprefixed table and its `DD`/`FD`-indexed variants
//! (spec §4.5): the same `(x, y, z, p, q)` decode drives both, with `mode`
//! swapping `HL`/`(HL)` for `IX`/`(IX+d)` or `IY`/`(IY+d)` wherever an
//! instruction actually touches it.
use super::decode::{self, AluOp, IndexMode};
use super::Cpu;
use crate::alu;
use crate::bus::Bus;
use crate::memory::Memory;
use crate::registers::Reg16;

fn jr_target(pc: u16, d: i8) -> u16 {
    pc.wrapping_add(d as i16 as u16)
}

fn apply_alu(cpu: &mut Cpu, op: AluOp, v: u8) {
    let a = cpu.regs.a();
    let flags = cpu.flags();
    let (result, new_flags) = match op {
        AluOp::Add => alu::add8(a, v, false),
        AluOp::Adc => alu::add8(a, v, flags.carry()),
        AluOp::Sub => alu::sub8(a, v, false),
        AluOp::Sbc => alu::sub8(a, v, flags.carry()),
        AluOp::And => alu::and8(a, v),
        AluOp::Xor => alu::xor8(a, v),
        AluOp::Or => alu::or8(a, v),
        AluOp::Cp => {
            cpu.set_flags(alu::cmp8(a, v));
            return;
        }
    };
    cpu.regs.set_a(result);
    cpu.set_flags(new_flags);
}

/// Returns `false` for the handful of opcode slots with no defined
/// behavior even on real silicon (there are none left in this table, but
/// the signature matches [super::cb::dispatch] and [super::ed::dispatch]
/// for a uniform "unknown opcode" story in [Cpu::execute_one]).
pub fn dispatch(cpu: &mut Cpu, mem: &mut Memory, bus: &mut Bus, opcode: u8, mode: IndexMode) -> bool {
    let op = decode::decode(opcode);

    match op.x {
        0 => exec_x0(cpu, mem, op, mode),
        1 => exec_x1(cpu, mem, op, mode),
        2 => {
            let v = cpu.read_r(mem, op.z, mode);
            apply_alu(cpu, decode::alu_op(op.y), v);
            true
        }
        3 => exec_x3(cpu, mem, bus, op, mode),
        _ => unreachable!(),
    }
}

fn exec_x0(cpu: &mut Cpu, mem: &mut Memory, op: decode::Opcode, mode: IndexMode) -> bool {
    match op.z {
        0 => match op.y {
            0 => true, // NOP
            1 => {
                cpu.regs.ex_af_af_();
                true
            }
            2 => {
                // DJNZ d
                let b = cpu.regs.get8(crate::registers::Reg8::B).wrapping_sub(1);
                cpu.regs.set8(crate::registers::Reg8::B, b);
                let d = cpu.fetch_byte(mem) as i8;
                if b != 0 {
                    cpu.charge(6);
                    let target = jr_target(cpu.regs.pc(), d);
                    cpu.regs.set_pc(target);
                } else {
                    cpu.charge(1);
                }
                true
            }
            3 => {
                let d = cpu.fetch_byte(mem) as i8;
                cpu.charge(5);
                let target = jr_target(cpu.regs.pc(), d);
                cpu.regs.set_pc(target);
                true
            }
            4..=7 => {
                let cond = decode::condition(op.y - 4);
                let d = cpu.fetch_byte(mem) as i8;
                if cond.holds(cpu.flags()) {
                    cpu.charge(5);
                    let target = jr_target(cpu.regs.pc(), d);
                    cpu.regs.set_pc(target);
                }
                true
            }
            _ => unreachable!(),
        },
        1 => {
            if op.q == 0 {
                let nn = cpu.fetch_word(mem);
                cpu.regs.set16(decode::reg_pair(op.p, mode), nn);
            } else {
                let hl = cpu.regs.get16(mode.reg16());
                let rp = cpu.regs.get16(decode::reg_pair(op.p, mode));
                cpu.regs.set_wz(hl.wrapping_add(1));
                let (result, flags) = alu::add16(hl, rp, cpu.flags());
                cpu.charge(7);
                cpu.regs.set16(mode.reg16(), result);
                cpu.set_flags(flags);
            }
            true
        }
        2 => exec_indirect_load(cpu, mem, op, mode),
        3 => {
            let rp = decode::reg_pair(op.p, mode);
            let v = cpu.regs.get16(rp);
            let result = if op.q == 0 { v.wrapping_add(1) } else { v.wrapping_sub(1) };
            cpu.charge(2);
            cpu.regs.set16(rp, result);
            true
        }
        4 => {
            inc_r_field(cpu, mem, op.y, mode);
            true
        }
        5 => {
            dec_r_field(cpu, mem, op.y, mode);
            true
        }
        6 => {
            ld_r_field_immediate(cpu, mem, op.y, mode);
            true
        }
        7 => {
            accumulator_op(cpu, op.y);
            true
        }
        _ => unreachable!(),
    }
}

fn exec_indirect_load(cpu: &mut Cpu, mem: &mut Memory, op: decode::Opcode, mode: IndexMode) -> bool {
    match (op.q, op.p) {
        (0, 0) => {
            let bc = cpu.regs.get16(Reg16::BC);
            let a = cpu.regs.a();
            cpu.write_mem(mem, bc, a);
            cpu.regs.set_wz((u16::from(a) << 8) | (bc.wrapping_add(1) & 0xFF));
        }
        (0, 1) => {
            let de = cpu.regs.get16(Reg16::DE);
            let a = cpu.regs.a();
            cpu.write_mem(mem, de, a);
            cpu.regs.set_wz((u16::from(a) << 8) | (de.wrapping_add(1) & 0xFF));
        }
        (0, 2) => {
            let addr = cpu.fetch_word(mem);
            let hl = cpu.regs.get16(mode.reg16());
            cpu.write_word(mem, addr, hl);
            cpu.regs.set_wz(addr.wrapping_add(1));
        }
        (0, 3) => {
            let addr = cpu.fetch_word(mem);
            let a = cpu.regs.a();
            cpu.write_mem(mem, addr, a);
            cpu.regs.set_wz((u16::from(a) << 8) | (addr.wrapping_add(1) & 0xFF));
        }
        (1, 0) => {
            let bc = cpu.regs.get16(Reg16::BC);
            let v = cpu.read_mem(mem, bc);
            cpu.regs.set_a(v);
            cpu.regs.set_wz(bc.wrapping_add(1));
        }
        (1, 1) => {
            let de = cpu.regs.get16(Reg16::DE);
            let v = cpu.read_mem(mem, de);
            cpu.regs.set_a(v);
            cpu.regs.set_wz(de.wrapping_add(1));
        }
        (1, 2) => {
            let addr = cpu.fetch_word(mem);
            let v = cpu.read_word(mem, addr);
            cpu.regs.set16(mode.reg16(), v);
            cpu.regs.set_wz(addr.wrapping_add(1));
        }
        (1, 3) => {
            let addr = cpu.fetch_word(mem);
            let v = cpu.read_mem(mem, addr);
            cpu.regs.set_a(v);
            cpu.regs.set_wz(addr.wrapping_add(1));
        }
        _ => unreachable!(),
    }
    true
}

fn inc_r_field(cpu: &mut Cpu, mem: &mut Memory, y: u8, mode: IndexMode) {
    if y == 6 {
        let addr = cpu.resolve_hl(mem, mode);
        let v = cpu.read_mem(mem, addr);
        let (result, flags) = alu::inc8(v, cpu.flags());
        cpu.charge(1);
        cpu.write_mem(mem, addr, result);
        cpu.set_flags(flags);
    } else {
        let reg = decode::reg8(y, mode);
        let v = cpu.regs.get8(reg);
        let (result, flags) = alu::inc8(v, cpu.flags());
        cpu.regs.set8(reg, result);
        cpu.set_flags(flags);
    }
}

fn dec_r_field(cpu: &mut Cpu, mem: &mut Memory, y: u8, mode: IndexMode) {
    if y == 6 {
        let addr = cpu.resolve_hl(mem, mode);
        let v = cpu.read_mem(mem, addr);
        let (result, flags) = alu::dec8(v, cpu.flags());
        cpu.charge(1);
        cpu.write_mem(mem, addr, result);
        cpu.set_flags(flags);
    } else {
        let reg = decode::reg8(y, mode);
        let v = cpu.regs.get8(reg);
        let (result, flags) = alu::dec8(v, cpu.flags());
        cpu.regs.set8(reg, result);
        cpu.set_flags(flags);
    }
}

fn ld_r_field_immediate(cpu: &mut Cpu, mem: &mut Memory, y: u8, mode: IndexMode) {
    if y == 6 {
        match mode {
            IndexMode::None => {
                let addr = cpu.regs.get16(Reg16::HL);
                let n = cpu.fetch_byte(mem);
                cpu.write_mem(mem, addr, n);
            }
            IndexMode::Ix | IndexMode::Iy => {
                let d = cpu.fetch_byte(mem) as i8;
                cpu.charge(2);
                let n = cpu.fetch_byte(mem);
                let base = cpu.regs.get16(mode.reg16());
                let addr = base.wrapping_add(d as i16 as u16);
                cpu.regs.set_wz(addr);
                cpu.write_mem(mem, addr, n);
            }
        }
    } else {
        let n = cpu.fetch_byte(mem);
        cpu.regs.set8(decode::reg8(y, mode), n);
    }
}

fn accumulator_op(cpu: &mut Cpu, y: u8) {
    let a = cpu.regs.a();
    let flags = cpu.flags();
    match y {
        0 => {
            let (r, f) = alu::rlca(a, flags);
            cpu.regs.set_a(r);
            cpu.set_flags(f);
        }
        1 => {
            let (r, f) = alu::rrca(a, flags);
            cpu.regs.set_a(r);
            cpu.set_flags(f);
        }
        2 => {
            let (r, f) = alu::rla(a, flags);
            cpu.regs.set_a(r);
            cpu.set_flags(f);
        }
        3 => {
            let (r, f) = alu::rra(a, flags);
            cpu.regs.set_a(r);
            cpu.set_flags(f);
        }
        4 => {
            let (r, f) = alu::daa(a, flags);
            cpu.regs.set_a(r);
            cpu.set_flags(f);
        }
        5 => {
            let (r, f) = alu::cpl(a, flags);
            cpu.regs.set_a(r);
            cpu.set_flags(f);
        }
        6 => cpu.set_flags(alu::scf(a, flags)),
        7 => cpu.set_flags(alu::ccf(a, flags)),
        _ => unreachable!(),
    }
}

fn exec_x1(cpu: &mut Cpu, mem: &mut Memory, op: decode::Opcode, mode: IndexMode) -> bool {
    if op.y == 6 && op.z == 6 {
        cpu.halted = true;
        return true;
    }
    // The index register only substitutes for H/L when the opcode doesn't
    // simultaneously reference `(HL)`/`(IX+d)` as its other operand: e.g.
    // `LD (IX+d),H` stores the plain `H` register, not `IXH`.
    let reg_mode = if op.y == 6 || op.z == 6 { IndexMode::None } else { mode };
    let v = if op.z == 6 {
        let addr = cpu.resolve_hl(mem, mode);
        cpu.read_mem(mem, addr)
    } else {
        cpu.regs.get8(decode::reg8(op.z, reg_mode))
    };
    if op.y == 6 {
        let addr = cpu.resolve_hl(mem, mode);
        cpu.write_mem(mem, addr, v);
    } else {
        cpu.regs.set8(decode::reg8(op.y, reg_mode), v);
    }
    true
}

fn exec_x3(cpu: &mut Cpu, mem: &mut Memory, bus: &mut Bus, op: decode::Opcode, mode: IndexMode) -> bool {
    match op.z {
        0 => {
            cpu.charge(1);
            let cond = decode::condition(op.y);
            if cond.holds(cpu.flags()) {
                let addr = cpu.pop16(mem);
                cpu.regs.set_pc(addr);
                cpu.regs.set_wz(addr);
            }
            true
        }
        1 => exec_z1(cpu, mem, op, mode),
        2 => {
            let addr = cpu.fetch_word(mem);
            cpu.regs.set_wz(addr);
            if decode::condition(op.y).holds(cpu.flags()) {
                cpu.regs.set_pc(addr);
            }
            true
        }
        3 => exec_special(cpu, mem, bus, op, mode),
        4 => {
            let addr = cpu.fetch_word(mem);
            cpu.regs.set_wz(addr);
            if decode::condition(op.y).holds(cpu.flags()) {
                let pc = cpu.regs.pc();
                cpu.push16(mem, pc);
                cpu.regs.set_pc(addr);
            }
            true
        }
        5 => exec_z5(cpu, mem, op, mode),
        6 => {
            let n = cpu.fetch_byte(mem);
            apply_alu(cpu, decode::alu_op(op.y), n);
            true
        }
        7 => {
            let pc = cpu.regs.pc();
            cpu.push16(mem, pc);
            let target = u16::from(op.y) * 8;
            cpu.regs.set_pc(target);
            cpu.regs.set_wz(target);
            true
        }
        _ => unreachable!(),
    }
}

fn exec_z1(cpu: &mut Cpu, mem: &mut Memory, op: decode::Opcode, mode: IndexMode) -> bool {
    if op.q == 0 {
        let v = cpu.pop16(mem);
        cpu.regs.set16(decode::reg_pair2(op.p, mode), v);
        return true;
    }
    match op.p {
        0 => {
            let addr = cpu.pop16(mem);
            cpu.regs.set_pc(addr);
            cpu.regs.set_wz(addr);
        }
        1 => cpu.regs.exx(),
        2 => {
            let addr = cpu.regs.get16(mode.reg16());
            cpu.regs.set_pc(addr);
        }
        3 => {
            let v = cpu.regs.get16(mode.reg16());
            cpu.charge(2);
            cpu.regs.set_sp(v);
        }
        _ => unreachable!(),
    }
    true
}

fn exec_special(cpu: &mut Cpu, mem: &mut Memory, bus: &mut Bus, op: decode::Opcode, mode: IndexMode) -> bool {
    match op.y {
        0 => {
            let addr = cpu.fetch_word(mem);
            cpu.regs.set_pc(addr);
            cpu.regs.set_wz(addr);
        }
        1 => unreachable!("CB is intercepted before exec::dispatch"),
        2 => {
            let n = cpu.fetch_byte(mem);
            let a = cpu.regs.a();
            let port = (u16::from(a) << 8) | u16::from(n);
            bus.write(port, a);
            cpu.charge(4);
            cpu.regs.set_wz((port & 0xFF00) | (port.wrapping_add(1) & 0xFF));
        }
        3 => {
            let n = cpu.fetch_byte(mem);
            let a = cpu.regs.a();
            let port = (u16::from(a) << 8) | u16::from(n);
            let v = bus.read(port);
            cpu.charge(4);
            cpu.regs.set_a(v);
            cpu.regs.set_wz(port.wrapping_add(1));
        }
        4 => {
            let sp = cpu.regs.sp();
            let popped = cpu.read_word(mem, sp);
            let pushed = cpu.regs.get16(mode.reg16());
            cpu.write_word(mem, sp, pushed);
            cpu.charge(3);
            cpu.regs.set16(mode.reg16(), popped);
            cpu.regs.set_wz(popped);
        }
        5 => cpu.regs.ex_de_hl(),
        6 => {
            cpu.iff1 = false;
            cpu.iff2 = false;
        }
        7 => {
            cpu.iff1 = true;
            cpu.iff2 = true;
            cpu.ei_defer = true;
        }
        _ => unreachable!(),
    }
    true
}

fn exec_z5(cpu: &mut Cpu, mem: &mut Memory, op: decode::Opcode, mode: IndexMode) -> bool {
    if op.q == 0 {
        let v = cpu.regs.get16(decode::reg_pair2(op.p, mode));
        cpu.push16(mem, v);
        return true;
    }
    if op.p == 0 {
        let addr = cpu.fetch_word(mem);
        cpu.regs.set_wz(addr);
        let pc = cpu.regs.pc();
        cpu.push16(mem, pc);
        cpu.regs.set_pc(addr);
        true
    } else {
        false // DD/ED/FD prefixes never reach exec::dispatch as an opcode
    }
}
