// Sine oscillator module for aa-host-core.
//
// Build with `cargo build -p aa-sine-module --target wasm32-unknown-unknown --release` and
// copy `aa_sine_module.wasm` into `bundle/` as `sine.wasm`.
//
// Parameters: (0, 0) frequency in Hz, (0, 1) output gain.
// Notes retune the oscillator and gate it by velocity.

use aa_module_sdk::prelude::*;
use core::f32::consts::TAU;

struct Sine {
    sample_rate: f32,
    frequency: f32,
    gain: f32,
    gate: f32,
    phase: f32,
}

impl Sine {
    const fn new() -> Self {
        Self {
            sample_rate: 48_000.0,
            frequency: 440.0,
            gain: 0.5,
            gate: 1.0,
            phase: 0.0,
        }
    }
}

fn note_to_hz(note: i32) -> f32 {
    440.0 * 2.0f32.powf((note - 69) as f32 / 12.0)
}

impl AudioModule for Sine {
    const INPUTS: u32 = 0;
    const OUTPUTS: u32 = 1;

    fn init(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate as f32;
        log("sine: initialized");
    }

    fn set_param(&mut self, node: u32, index: u32, value: f32) -> bool {
        match (node, index) {
            (0, 0) => self.frequency = value,
            (0, 1) => self.gain = value,
            _ => return false,
        }
        true
    }

    fn note_on(&mut self, note: i32, velocity: f32) {
        self.frequency = note_to_hz(note);
        self.gate = velocity;
    }

    fn note_off(&mut self, _note: i32, _velocity: f32) {
        self.gate = 0.0;
    }

    fn compute(&mut self, _inputs: &[&[f32]], outputs: &mut [&mut [f32]]) {
        let step = self.frequency / self.sample_rate;
        let level = self.gain * self.gate;
        for sample in outputs[0].iter_mut() {
            *sample = (self.phase * TAU).sin() * level;
            self.phase = (self.phase + step).fract();
        }
    }
}

export_module!(Sine, Sine::new());
