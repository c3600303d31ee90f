//! `zexdoc` — the Z80 core conformance harness (§6 CLI / exit codes).
//!
//! Loads a zexdoc-style `.com` image at `0x0100` (the classic CP/M load
//! address these exercisers are built for), runs the core in strict decode
//! mode, and emulates just enough of CP/M's `BDOS` (`CALL 5`) to capture the
//! console output the exerciser prints: function 2 (`putchar`) and function
//! 9 (print `$`-terminated string). Exits 0 only if the output contains the
//! "Tests complete" sentinel and no "ERROR" line.
use std::fs;
use std::process;

use clap::clap_app;
use log::{error, info};

use spectrum48::cpu::Cpu;
use spectrum48::memory::Memory;
use spectrum48::registers::Reg8;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = clap_app!(zexdoc =>
        (version: env!("CARGO_PKG_VERSION"))
        (author: "")
        (about: "Z80 core conformance harness (zexdoc-style exercisers)")
        (@arg ROM: +required "Path to a zexdoc/zexall .com image, loaded at 0x0100")
        (@arg budget: -b --budget +takes_value "Maximum instructions to execute before giving up")
    )
    .get_matches();

    let path = matches.value_of("ROM").expect("required");
    let budget: u64 = matches
        .value_of("budget")
        .map(|s| s.parse().unwrap_or(500_000_000))
        .unwrap_or(500_000_000);

    let image = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("failed to read {}: {}", path, e);
            process::exit(1);
        }
    };

    let mut mem = Memory::new(4);
    mem.set_rom_flags([false, false, false, false]);
    for (offset, &byte) in image.iter().enumerate() {
        mem.raw_write((0x0100 + offset) / 0x4000, ((0x0100 + offset) % 0x4000) as u16, byte);
    }

    let mut cpu = Cpu::new();
    cpu.set_strict(true);
    cpu.regs_mut().set_pc(0x0100);
    cpu.regs_mut().set_sp(0xF000);

    let mut bus = spectrum48::bus::Bus::new();
    let mut output = String::new();
    let mut instructions: u64 = 0;

    while cpu.pc() != 0 {
        if instructions >= budget {
            error!("instruction budget of {} exceeded without reaching the exit trap", budget);
            process::exit(1);
        }
        match cpu.execute_one(&mut mem, &mut bus) {
            Ok(_) => {}
            Err(e) => {
                error!("{} (history: {:02x?})", e, cpu.history());
                process::exit(1);
            }
        }
        instructions += 1;

        if cpu.pc() == 5 {
            match cpu.regs().get8(Reg8::C) {
                2 => {
                    let c = cpu.regs().get8(Reg8::E) as char;
                    print!("{}", c);
                    output.push(c);
                }
                9 => {
                    let mut addr = cpu.regs().get16(spectrum48::registers::Reg16::DE);
                    loop {
                        let c = mem.read(addr) as char;
                        if c == '$' {
                            break;
                        }
                        print!("{}", c);
                        output.push(c);
                        addr = addr.wrapping_add(1);
                    }
                }
                other => {
                    error!("unsupported CP/M BDOS function {}", other);
                    process::exit(1);
                }
            }
            // The exerciser expects CALL 5 to behave like a RET.
            let sp = cpu.regs().sp();
            let ret_pc = mem.read16(sp);
            cpu.regs_mut().set_sp(sp.wrapping_add(2));
            cpu.regs_mut().set_pc(ret_pc);
        }
    }

    info!("ran {} instructions", instructions);

    if !output.contains("Tests complete") {
        error!("output missing the 'Tests complete' sentinel");
        process::exit(1);
    }
    if output.contains("ERROR") {
        error!("exerciser reported one or more ERROR lines");
        process::exit(1);
    }
    println!("\nall tests passed");
}
