//! The Wasmtime implementation of [`Sandbox`].

use super::{UnitState, imports};
use crate::abi::{GuestEntrypoints, guest_exports, validate};
use crate::catalog::ModuleBundle;
use crate::config::HostConfig;
use crate::events::NoteKind;
use crate::loader;
use crate::sandbox::{Call, Sandbox, SandboxError};

use tracing::debug;
use wasmtime::{Engine, Linker, Store};

const BYTES_PER_SAMPLE: usize = std::mem::size_of::<f32>();

/// Host-side runtime container. Cloning is cheap: the engine is shared.
#[derive(Clone)]
pub struct WasmSandbox {
    engine: Engine,
    config: HostConfig,
}

impl WasmSandbox {
    /// Create a new Wasmtime runtime with the WebAssembly features audio modules use.
    pub fn new(config: &HostConfig) -> Result<Self, anyhow::Error> {
        let mut cfg = wasmtime::Config::new();

        cfg.wasm_multi_value(true);
        cfg.wasm_bulk_memory(true);
        cfg.wasm_reference_types(true);
        cfg.wasm_simd(true);
        cfg.wasm_relaxed_simd(true);
        cfg.wasm_tail_call(true);

        // Fuel bounds guest execution time so a runaway module cannot stall the audio thread.
        cfg.consume_fuel(config.fuel_enabled());

        let engine = Engine::new(&cfg)?;

        Ok(Self {
            engine,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    fn refuel(&self, store: &mut Store<UnitState>, fuel: u64) -> wasmtime::Result<()> {
        if self.config.fuel_enabled() {
            store.set_fuel(fuel)?;
        }
        Ok(())
    }
}

/// A loaded module: its store, resolved entrypoints and guest block buffers.
pub struct WasmUnit {
    store: Store<UnitState>,
    entry: GuestEntrypoints,
    block_size: usize,
    /// Guest offsets of the per-channel block buffers, resolved by `Call::Init`.
    inputs: Vec<u32>,
    outputs: Vec<u32>,
    ready: bool,
}

impl WasmUnit {
    /// Query channel counts and buffer offsets. Runs once, right after the guest's init.
    fn resolve_buffers(&mut self, default_block_size: usize) -> Result<(), SandboxError> {
        let store = &mut self.store;
        let entry = &self.entry;

        let inputs = entry.number_inputs.call(&mut *store, ()).map_err(trap)?;
        let outputs = entry.number_outputs.call(&mut *store, ()).map_err(trap)?;
        let (inputs, outputs) = (inputs.clamp(0, 2) as u32, outputs.clamp(0, 2) as u32);

        let block_size = match &entry.block_size {
            Some(f) => f.call(&mut *store, ()).map_err(trap)? as usize,
            None => default_block_size,
        }
        .max(1);

        let mut input_offsets = Vec::with_capacity(inputs as usize);
        if inputs > 0 {
            let get_input = entry
                .get_input
                .as_ref()
                .ok_or(SandboxError::MissingExport(guest_exports::GET_INPUT))?;
            for channel in 0..inputs {
                input_offsets.push(get_input.call(&mut *store, channel).map_err(trap)?);
            }
        }

        let mut output_offsets = Vec::with_capacity(outputs as usize);
        for channel in 0..outputs {
            output_offsets.push(entry.get_output.call(&mut *store, channel).map_err(trap)?);
        }

        // Memory never shrinks, so a block that fits now fits for the unit's lifetime.
        let memory_len = entry.memory.data_size(&*store);
        let block_bytes = block_size * BYTES_PER_SAMPLE;
        for (channel, &offset) in input_offsets.iter().chain(&output_offsets).enumerate() {
            let end = (offset as usize).checked_add(block_bytes);
            if end.is_none_or(|end| end > memory_len) {
                return Err(SandboxError::OutOfBounds { channel });
            }
        }

        self.block_size = block_size;
        self.inputs = input_offsets;
        self.outputs = output_offsets;
        self.ready = true;
        Ok(())
    }
}

impl Sandbox for WasmSandbox {
    type Handle = WasmUnit;

    fn load(&mut self, bundle: &ModuleBundle) -> Result<WasmUnit, SandboxError> {
        let (unit_code, dependencies) = bundle
            .code
            .split_last()
            .ok_or_else(|| SandboxError::Load("bundle has no code".to_string()))?;

        let mut store = Store::new(
            &self.engine,
            UnitState {
                module: bundle.descriptor.name.clone(),
            },
        );
        self.refuel(&mut store, self.config.fuel_per_call)
            .map_err(load_failed)?;

        let mut linker = Linker::new(&self.engine);
        imports::define_imports(&mut linker).map_err(load_failed)?;

        for dependency in dependencies {
            let module = loader::compile(&self.engine, dependency).map_err(load_failed)?;
            linker
                .module(&mut store, &dependency.name, &module)
                .map_err(load_failed)?;
        }

        let module = loader::compile(&self.engine, unit_code).map_err(load_failed)?;
        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(load_failed)?;

        if let Some(missing) = validate::first_missing_export(&instance, &mut store) {
            return Err(SandboxError::MissingExport(missing));
        }
        let entry = GuestEntrypoints::resolve(&instance, &mut store).map_err(load_failed)?;

        debug!(
            module = %bundle.descriptor.name,
            dependencies = dependencies.len(),
            "instantiated module"
        );

        Ok(WasmUnit {
            store,
            entry,
            block_size: self.config.default_block_size.max(1),
            inputs: Vec::new(),
            outputs: Vec::new(),
            ready: false,
        })
    }

    fn call(&mut self, unit: &mut WasmUnit, call: Call) -> Result<i32, SandboxError> {
        // Control calls get their own budget; staged calls spend the current render's.
        if matches!(call, Call::Init { .. } | Call::InputCount | Call::OutputCount) {
            self.refuel(&mut unit.store, self.config.fuel_per_call)
                .map_err(trap)?;
        }

        let store = &mut unit.store;
        let entry = &unit.entry;

        match call {
            Call::Init { sample_rate } => {
                if let Some(init) = &entry.init {
                    init.call(&mut *store, sample_rate).map_err(trap)?;
                }
                unit.resolve_buffers(self.config.default_block_size)?;
                Ok(0)
            }
            Call::InputCount => entry.number_inputs.call(store, ()).map_err(trap),
            Call::OutputCount => entry.number_outputs.call(store, ()).map_err(trap),
            Call::SetParam { address, value } => {
                let Some(set_param) = &entry.set_param else {
                    return Err(SandboxError::UnknownParameter(address));
                };
                match set_param
                    .call(store, (address.node, address.index, value))
                    .map_err(render_trap)?
                {
                    0 => Ok(0),
                    _ => Err(SandboxError::UnknownParameter(address)),
                }
            }
            Call::Note(event) => {
                let handler = match event.kind {
                    NoteKind::NoteOn => &entry.note_on,
                    NoteKind::NoteOff => &entry.note_off,
                };
                if let Some(handler) = handler {
                    handler
                        .call(store, (event.note, event.velocity))
                        .map_err(render_trap)?;
                }
                Ok(0)
            }
        }
    }

    fn begin_render(&mut self, unit: &mut WasmUnit, frames: usize) -> Result<(), SandboxError> {
        self.refuel(
            &mut unit.store,
            self.config.fuel_per_frame.saturating_mul(frames as u64),
        )
        .map_err(render_trap)
    }

    fn compute(
        &mut self,
        unit: &mut WasmUnit,
        frames: usize,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
    ) -> Result<(), SandboxError> {
        if !unit.ready {
            return Err(SandboxError::NotInitialized);
        }
        if inputs.len() > unit.inputs.len() {
            return Err(SandboxError::OutOfBounds {
                channel: unit.inputs.len(),
            });
        }
        if outputs.len() > unit.outputs.len() {
            return Err(SandboxError::OutOfBounds {
                channel: unit.outputs.len(),
            });
        }

        let WasmUnit {
            store,
            entry,
            block_size,
            inputs: input_offsets,
            outputs: output_offsets,
            ..
        } = unit;
        let memory = entry.memory;

        let mut offset = 0;
        while offset < frames {
            let n = (frames - offset).min(*block_size);
            let span = offset..offset + n;

            let data = memory.data_mut(&mut *store);
            for (channel, (input, &guest)) in inputs.iter().zip(input_offsets.iter()).enumerate()
            {
                input
                    .get(span.clone())
                    .and_then(|samples| write_block(data, guest, samples))
                    .ok_or(SandboxError::OutOfBounds { channel })?;
            }

            entry
                .compute
                .call(&mut *store, n as u32)
                .map_err(render_trap)?;

            let data = memory.data(&*store);
            for (channel, (output, &guest)) in
                outputs.iter_mut().zip(output_offsets.iter()).enumerate()
            {
                output
                    .get_mut(span.clone())
                    .and_then(|samples| read_block(data, guest, samples))
                    .ok_or(SandboxError::OutOfBounds { channel })?;
            }

            offset += n;
        }

        Ok(())
    }

    fn free(&mut self, unit: WasmUnit) {
        debug!(module = %unit.store.data().module, "releasing module");
        drop(unit);
    }
}

fn load_failed(err: impl std::fmt::Display) -> SandboxError {
    SandboxError::Load(err.to_string())
}

fn trap(err: impl std::fmt::Display) -> SandboxError {
    SandboxError::Trap(err.to_string())
}

/// Audio-thread counterpart of [`trap`]: the guest error is dropped, not formatted.
fn render_trap<E>(_err: E) -> SandboxError {
    SandboxError::RenderTrap
}

/// Copy samples into guest memory as little-endian `f32`.
fn write_block(memory: &mut [u8], guest: u32, samples: &[f32]) -> Option<()> {
    let start = guest as usize;
    let end = start.checked_add(samples.len() * BYTES_PER_SAMPLE)?;
    let dst = memory.get_mut(start..end)?;
    for (bytes, sample) in dst.chunks_exact_mut(BYTES_PER_SAMPLE).zip(samples) {
        bytes.copy_from_slice(&sample.to_le_bytes());
    }
    Some(())
}

/// Copy little-endian `f32` samples out of guest memory.
fn read_block(memory: &[u8], guest: u32, samples: &mut [f32]) -> Option<()> {
    let start = guest as usize;
    let end = start.checked_add(samples.len() * BYTES_PER_SAMPLE)?;
    let src = memory.get(start..end)?;
    for (sample, bytes) in samples.iter_mut().zip(src.chunks_exact(BYTES_PER_SAMPLE)) {
        *sample = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_round_trip_through_guest_memory() {
        let mut memory = vec![0u8; 64];
        write_block(&mut memory, 8, &[0.5, -1.0, 0.25]).unwrap();

        let mut out = [0.0f32; 3];
        read_block(&memory, 8, &mut out).unwrap();
        assert_eq!(out, [0.5, -1.0, 0.25]);
    }

    #[test]
    fn out_of_bounds_blocks_are_rejected() {
        let mut memory = vec![0u8; 16];
        assert!(write_block(&mut memory, 12, &[1.0, 2.0]).is_none());
        assert!(read_block(&memory, u32::MAX, &mut [0.0; 1]).is_none());
    }
}
