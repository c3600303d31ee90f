//! The beeper/tape audio mixer.
//!
//! Mirrors the shape of the teacher's `audio::synth::BandLimited<T, O>`
//! (`src/audio/synth.rs`): output-level changes are timestamped in
//! T-states rather than applied instantly, so a sample can correctly
//! average several short pulses instead of aliasing, and a one-pole
//! high-pass filter removes the DC bias a naive square-wave accumulation
//! would otherwise leave in the output. Unlike the teacher's
//! multi-channel/AY-aware mixer this one only ever combines the beeper
//! (`EAR` out) and tape (`MIC` out) bits the 48K ULA exposes on port 0xFE.
const CPU_HZ: f32 = 3_500_000.0;

pub struct Audio {
    sample_rate: u32,
    t_states_per_sample: f32,
    /// T-state position, relative to the current frame, of the last
    /// [Audio::set_output] or [Audio::fill] call.
    cycle_position: f32,
    /// Integral of `level * dt` accumulated since the last sample was
    /// extracted.
    energy: f32,
    /// Total `dt` accumulated since the last sample was extracted.
    elapsed: f32,
    level: f32,
    dc_prev_in: f32,
    dc_prev_out: f32,
    underruns: u32,
}

impl Audio {
    pub fn new(sample_rate: u32) -> Self {
        Audio {
            sample_rate,
            t_states_per_sample: CPU_HZ / sample_rate as f32,
            cycle_position: 0.0,
            energy: 0.0,
            elapsed: 0.0,
            level: 0.0,
            dc_prev_in: 0.0,
            dc_prev_out: 0.0,
            underruns: 0,
        }
    }

    fn level_for(beeper_on: bool, tape_on: bool) -> f32 {
        let mut v = 0.0;
        if beeper_on {
            v += 0.7;
        }
        if tape_on {
            v += 0.3;
        }
        v
    }

    fn advance(&mut self, now_cycles: f32) {
        let dt = (now_cycles - self.cycle_position).max(0.0);
        self.energy += self.level * dt;
        self.elapsed += dt;
        self.cycle_position = now_cycles;
    }

    /// Called by the port-0xFE `OUT` handler whenever the beeper or tape
    /// output bit changes. `now_cycles` is the current frame-relative
    /// T-state count.
    pub fn set_output(&mut self, now_cycles: u32, beeper_on: bool, tape_on: bool) {
        self.advance(now_cycles as f32);
        self.level = Self::level_for(beeper_on, tape_on);
    }

    /// Renders every sample that fits between the last call and
    /// `now_cycles` (a frame-relative T-state count), returning them as
    /// signed 16-bit PCM. Call once per frame with the frame length.
    pub fn fill(&mut self, now_cycles: u32) -> Vec<i16> {
        self.advance(now_cycles as f32);
        let mut out = Vec::new();
        while self.elapsed >= self.t_states_per_sample {
            let avg_level = self.energy / self.elapsed;
            self.energy -= avg_level * self.t_states_per_sample;
            self.elapsed -= self.t_states_per_sample;

            // One-pole DC-blocking high-pass: y[n] = x[n] - x[n-1] + R*y[n-1].
            const R: f32 = 0.995;
            let filtered = avg_level - self.dc_prev_in + R * self.dc_prev_out;
            self.dc_prev_in = avg_level;
            self.dc_prev_out = filtered;

            out.push((filtered.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);
        }
        if out.is_empty() && self.t_states_per_sample > 0.0 {
            self.underruns += 1;
        }
        out
    }

    /// Resets the frame-relative time base; call after [Audio::fill] at
    /// the frame boundary alongside `Video::poll`'s own wraparound.
    pub fn start_new_frame(&mut self) {
        self.cycle_position = 0.0;
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn underruns(&self) -> u32 {
        self.underruns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_produces_zero_samples() {
        let mut audio = Audio::new(44100);
        let samples = audio.fill(70000);
        assert!(samples.iter().all(|&s| s.abs() < 100));
    }

    #[test]
    fn steady_tone_is_dc_blocked_towards_zero_mean() {
        let mut audio = Audio::new(44100);
        let period = 160; // roughly a 1kHz-ish square wave at 3.5MHz
        let mut on = true;
        let mut t = 0u32;
        let mut all_samples = Vec::new();
        while t < 69888 {
            audio.set_output(t, on, false);
            on = !on;
            t += period;
            all_samples.extend(audio.fill(t.min(69888)));
        }
        let mean: f64 = all_samples.iter().map(|&s| s as f64).sum::<f64>() / all_samples.len().max(1) as f64;
        assert!(mean.abs() < 2000.0, "mean {} should be pulled toward zero", mean);
    }

    #[test]
    fn underrun_counter_increments_when_span_too_short_for_a_sample() {
        let mut audio = Audio::new(44100);
        audio.fill(1);
        assert_eq!(audio.underruns(), 1);
    }
}
