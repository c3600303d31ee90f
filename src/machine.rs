//! The top-level driver: wires [Cpu], [Memory], [Video], [Audio] and the
//! keyboard matrix onto a shared [Bus], the way the teacher's
//! `chip::ula::UlaTsVideoFrame`/`ControlUnit` impls compose a machine out of
//! its peripherals (§2 of the specification).
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::audio::Audio;
use crate::bus::Bus;
use crate::cpu::Cpu;
use crate::error::{CpuError, SnapshotError};
use crate::formats::sna;
use crate::io::keyboard::ZxKeyMap;
use crate::memory::Memory;
use crate::video::Video;

/// A complete 48K machine: CPU core, paged memory, and the three port-0xFE
/// peripherals (video border/beeper output, keyboard/EAR input).
pub struct Machine {
    cpu: Cpu,
    mem: Memory,
    bus: Bus,
    video: Rc<RefCell<Video>>,
    audio: Rc<RefCell<Audio>>,
    keys: Rc<RefCell<ZxKeyMap>>,
    tape_ear: Rc<RefCell<bool>>,
    /// Frame-relative T-state count as of the start of the instruction
    /// currently executing, shared with the port-0xFE out-handler so a
    /// beeper/tape write can be timestamped for [Audio]'s resampling. This
    /// approximates the write as happening at instruction-start rather than
    /// at its exact mid-instruction T-state.
    frame_clock: Rc<Cell<u32>>,
}

impl Machine {
    /// Builds a machine with the standard 48K memory arrangement (ROM in
    /// slot 0, RAM in slots 1-3) and the port-0xFE handlers wired up.
    pub fn new(sample_rate: u32) -> Self {
        let video = Rc::new(RefCell::new(Video::new()));
        let audio = Rc::new(RefCell::new(Audio::new(sample_rate)));
        let keys = Rc::new(RefCell::new(ZxKeyMap::empty()));
        let tape_ear = Rc::new(RefCell::new(false));
        let frame_clock = Rc::new(Cell::new(0u32));

        let mut bus = Bus::new();

        let out_video = video.clone();
        let out_audio = audio.clone();
        let out_clock = frame_clock.clone();
        bus.add_out_handler(Box::new(move |port, value| {
            if port & 1 == 0 {
                out_video.borrow_mut().set_border(value);
                let beeper_on = value & 0b0001_0000 != 0;
                let tape_on = value & 0b0000_1000 != 0;
                out_audio.borrow_mut().set_output(out_clock.get(), beeper_on, tape_on);
            }
        }));

        let in_keys = keys.clone();
        let in_ear = tape_ear.clone();
        bus.add_in_handler(Box::new(move |port| {
            if port & 1 != 0 {
                return None;
            }
            let high = (port >> 8) as u8;
            // read_keyboard already floors bits 0-4 for pressed keys and
            // leaves 5-7 high; bit 6 is then overlaid with the EAR level.
            let mut value = in_keys.borrow().read_keyboard(high);
            if !*in_ear.borrow() {
                value &= !0b0100_0000;
            }
            Some(value)
        }));

        Machine {
            cpu: Cpu::new(),
            mem: Memory::new_48k(),
            bus,
            video,
            audio,
            keys,
            tape_ear,
            frame_clock,
        }
    }

    pub fn load_rom(&mut self, rom: &[u8]) {
        self.mem.load_rom(rom);
    }

    pub fn load_sna<R: std::io::Read>(&mut self, reader: R) -> Result<(), SnapshotError> {
        let border = sna::load(reader, &mut self.cpu, &mut self.mem)?;
        self.video.borrow_mut().set_border(border);
        Ok(())
    }

    pub fn set_key(&mut self, key: ZxKeyMap, pressed: bool) {
        let mut keys = self.keys.borrow_mut();
        keys.set(key, pressed);
    }

    pub fn set_tape_ear(&mut self, level: bool) {
        *self.tape_ear.borrow_mut() = level;
    }

    /// Executes one instruction (following any prefix chain) and returns
    /// the number of T-states it consumed.
    pub fn execute_one(&mut self) -> Result<u32, CpuError> {
        self.cpu.execute_one(&mut self.mem, &mut self.bus)
    }

    /// Runs roughly one video frame's worth of instructions (§6), polling
    /// the raster scanner after each and raising the maskable interrupt at
    /// VBlank. Returns the audio samples generated this frame.
    pub fn run_frame(&mut self) -> Result<Vec<i16>, CpuError> {
        let mut t_in_frame: u32 = 0;
        while t_in_frame < crate::video::T_STATES_PER_FRAME {
            self.frame_clock.set(t_in_frame);
            let t = self.execute_one()?;
            t_in_frame += t;
            if self.video.borrow_mut().poll(t) {
                self.video.borrow_mut().render(&self.mem);
                self.cpu.interrupt();
            }
        }
        let samples = self.audio.borrow_mut().fill(t_in_frame);
        self.audio.borrow_mut().start_new_frame();
        Ok(samples)
    }

    pub fn interrupt(&mut self) {
        self.cpu.interrupt();
    }

    pub fn iff1(&self) -> bool {
        self.cpu.iff1()
    }

    pub fn iff2(&self) -> bool {
        self.cpu.iff2()
    }

    pub fn halted(&self) -> bool {
        self.cpu.halted()
    }

    pub fn pc(&self) -> u16 {
        self.cpu.pc()
    }

    pub fn cycle_count(&self) -> u64 {
        self.cpu.cycle_count()
    }

    pub fn history(&self) -> Vec<u16> {
        self.cpu.history()
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.mem
    }

    /// Copies the last-rendered frame into `out` (see [Video::blit_to]).
    pub fn blit_video(&self, out: &mut [u32]) {
        self.video.borrow().blit_to(out);
    }

    pub fn audio_underruns(&self) -> u32 {
        self.audio.borrow().underruns()
    }
}
