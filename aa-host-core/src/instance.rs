//! Module instance: one loaded module, its lifecycle and its render entry point.
//!
//! State is split by thread role:
//! - control side: parameter state and the command producer, each behind its own lock;
//! - audio side: the sandbox, its handle and the command consumer, behind a lock the
//!   render path only ever `try_lock`s.
//!
//! Every method takes `&self`, so one instance can be shared between the control thread
//! and the audio thread (as the C ABI does with a single pointer) without aliasing
//! mutable state. Lifecycle methods (`initialize`, drop) must not run concurrently with
//! rendering; that is the caller's contract, and a render that finds the audio side busy
//! outputs silence instead of waiting.

use crate::catalog::{Catalog, GuiHints, ModuleDescriptor};
use crate::config::HostConfig;
use crate::error::{CreationError, HostError, Result};
use crate::events::{Command, CommandReceiver, CommandSender, NoteEvent, command_channel};
use crate::introspect::{GuiDescription, GuiParameter};
use crate::node::{ParamAddress, ParameterState};
use crate::render::{ChannelShape, RenderBuffers};
use crate::sandbox::{Call, Sandbox, SandboxError};

use parking_lot::Mutex;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Fixed state established by `initialize`.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Initialized {
    sample_rate: f64,
    shape: ChannelShape,
}

/// Everything the audio thread touches.
struct AudioSide<S: Sandbox> {
    sandbox: S,
    /// `None` only while dropping.
    handle: Option<S::Handle>,
    commands: CommandReceiver,
}

/// A live module instance.
pub struct ModuleInstance<S: Sandbox> {
    descriptor: ModuleDescriptor,
    gui: GuiHints,
    init: OnceLock<Initialized>,
    params: Mutex<ParameterState>,
    commands: Mutex<CommandSender>,
    audio: Mutex<AudioSide<S>>,
    faulted: AtomicBool,
    rejected_params: AtomicU64,
}

impl<S: Sandbox> ModuleInstance<S> {
    /// Resolve `name` at `source` and load it into `sandbox`.
    ///
    /// No audio resources are allocated until [`Self::initialize`].
    pub fn create(
        catalog: &dyn Catalog,
        mut sandbox: S,
        config: &HostConfig,
        source: &str,
        name: &str,
    ) -> std::result::Result<Self, CreationError> {
        let bundle = catalog
            .fetch_bundle(source, name)
            .map_err(|e| CreationError::from_catalog(name, e))?;

        let handle = sandbox
            .load(&bundle)
            .map_err(|e| CreationError::LoadFailed {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        let (sender, receiver) = command_channel(config.event_queue_capacity);

        info!(source, module = name, "created module instance");

        Ok(Self {
            params: Mutex::new(ParameterState::seeded(&bundle.descriptor.parameters)),
            descriptor: bundle.descriptor,
            gui: bundle.gui,
            init: OnceLock::new(),
            commands: Mutex::new(sender),
            audio: Mutex::new(AudioSide {
                sandbox,
                handle: Some(handle),
                commands: receiver,
            }),
            faulted: AtomicBool::new(false),
            rejected_params: AtomicU64::new(0),
        })
    }

    /// One-time setup: bind the sample rate, run the module's init and fix its channel
    /// shape. Later calls are ignored.
    ///
    /// Not thread-safe with respect to rendering: call before the audio thread starts.
    pub fn initialize(&self, sample_rate: f64) -> Result<()> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(HostError::InvalidSampleRate(sample_rate));
        }
        if let Some(existing) = self.init.get() {
            warn!(
                module = %self.descriptor.name,
                sample_rate = existing.sample_rate,
                "initialize called twice; keeping the first configuration"
            );
            return Ok(());
        }

        let mut audio = self.audio.lock();
        if self.init.get().is_some() {
            return Ok(());
        }
        let AudioSide {
            sandbox, handle, ..
        } = &mut *audio;
        let handle = handle.as_mut().ok_or(SandboxError::NotInitialized)?;

        sandbox.call(handle, Call::Init { sample_rate })?;
        let inputs = sandbox.call(handle, Call::InputCount)?;
        let outputs = sandbox.call(handle, Call::OutputCount)?;

        let shape = u32::try_from(inputs)
            .ok()
            .zip(u32::try_from(outputs).ok())
            .and_then(|(i, o)| ChannelShape::from_counts(i, o))
            .ok_or(HostError::UnsupportedShape { inputs, outputs })?;

        if Some(shape) != self.descriptor.shape() {
            warn!(
                module = %self.descriptor.name,
                declared = ?self.descriptor.shape(),
                reported = ?shape,
                "module reports a different channel shape than its bundle declares"
            );
        }

        // Racing initializers are serialized by the audio lock above.
        let _ = self.init.set(Initialized { sample_rate, shape });
        debug!(module = %self.descriptor.name, sample_rate, ?shape, "initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.init.get().is_some()
    }

    pub fn sample_rate(&self) -> Option<f64> {
        self.init.get().map(|i| i.sample_rate)
    }

    /// Shape reported by the module at initialization, or the bundle's declared shape
    /// before that.
    pub fn channel_shape(&self) -> Option<ChannelShape> {
        self.init
            .get()
            .map(|i| i.shape)
            .or_else(|| self.descriptor.shape())
    }

    pub fn input_channel_count(&self) -> u32 {
        self.channel_shape().map_or(0, ChannelShape::inputs)
    }

    pub fn output_channel_count(&self) -> u32 {
        self.channel_shape().map_or(0, ChannelShape::outputs)
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    /// Record `value` at `(node, index)` and stage it for the next render.
    ///
    /// The value is forwarded as given; range handling is the module's business.
    pub fn set_parameter(&self, node: u32, index: u32, value: f32) -> Result<()> {
        let address = ParamAddress::new(node, index);
        // Queue order and recorded order must agree across racing control threads.
        let mut commands = self.commands.lock();
        commands
            .send(Command::Param { address, value })
            .map_err(|_| HostError::QueueFull)?;
        self.params.lock().set(address, value);
        Ok(())
    }

    /// Last value written to `(node, index)`, or its declared default.
    pub fn parameter(&self, node: u32, index: u32) -> Option<f32> {
        self.params.lock().get(ParamAddress::new(node, index))
    }

    pub fn note_on(&self, note: i32, velocity: f32) -> Result<()> {
        self.stage(Command::Note(NoteEvent::on(note, velocity)))
    }

    pub fn note_off(&self, note: i32, velocity: f32) -> Result<()> {
        self.stage(Command::Note(NoteEvent::off(note, velocity)))
    }

    fn stage(&self, command: Command) -> Result<()> {
        self.commands
            .lock()
            .send(command)
            .map_err(|_| HostError::QueueFull)
    }

    /// Parameter commands the module rejected as unknown since creation.
    pub fn rejected_parameter_count(&self) -> u64 {
        self.rejected_params.load(Ordering::Relaxed)
    }

    /// Whether the module trapped; a faulted instance renders silence until destroyed.
    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    /// Render one period. Audio thread only.
    ///
    /// Applies every staged command in arrival order, then fills `frames` samples of
    /// every output. Never fails: any problem produces silence.
    pub fn render(&self, frames: usize, mut buffers: RenderBuffers<'_>) {
        debug_assert!(
            frames <= buffers.capacity(),
            "render buffers hold fewer than {frames} frames"
        );

        let Some(init) = self.init.get() else {
            buffers.silence(frames);
            return;
        };
        debug_assert_eq!(
            buffers.shape(),
            init.shape,
            "render entry point does not match the module's channel shape"
        );

        let Some(mut audio) = self.audio.try_lock() else {
            buffers.silence(frames);
            return;
        };
        let AudioSide {
            sandbox,
            handle,
            commands,
        } = &mut *audio;
        let Some(handle) = handle.as_mut() else {
            buffers.silence(frames);
            return;
        };

        // Staged calls and compute share this period's budget.
        if !self.is_faulted() {
            if let Err(e) = sandbox.begin_render(handle, frames) {
                if e.is_fatal() {
                    self.faulted.store(true, Ordering::Release);
                }
            }
        }

        // Faulted instances drain and discard.
        commands.drain(|command| {
            if self.faulted.load(Ordering::Relaxed) {
                return;
            }
            let call = match command {
                Command::Param { address, value } => Call::SetParam { address, value },
                Command::Note(event) => Call::Note(event),
            };
            match sandbox.call(handle, call) {
                Ok(_) => {}
                Err(SandboxError::UnknownParameter(_)) => {
                    self.rejected_params.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) if e.is_fatal() => self.faulted.store(true, Ordering::Release),
                Err(_) => {}
            }
        });

        if self.faulted.load(Ordering::Acquire) {
            buffers.silence(frames);
            return;
        }

        let result = buffers.with_channels(frames, |inputs, outputs| {
            let n = outputs.first().map_or(0, |o| o.len());
            sandbox.compute(handle, n, inputs, outputs)
        });

        if let Err(e) = result {
            if e.is_fatal() {
                self.faulted.store(true, Ordering::Release);
            }
            buffers.silence(frames);
        }
    }

    /// Current parameter set, values and GUI hints, for external rendering.
    ///
    /// Read-only; safe while the audio thread renders.
    pub fn gui_description(&self) -> GuiDescription {
        let params = self.params.lock();
        GuiDescription {
            module: self.descriptor.name.clone(),
            title: self.gui.title.clone(),
            url: self.gui.url.clone(),
            width: self.gui.width,
            height: self.gui.height,
            layout: self.gui.layout.clone(),
            parameters: self
                .descriptor
                .parameters
                .iter()
                .map(|p| GuiParameter {
                    value: params.get(p.address()).unwrap_or(p.default_value),
                    descriptor: p.clone(),
                })
                .collect(),
        }
    }
}

impl<S: Sandbox> Drop for ModuleInstance<S> {
    fn drop(&mut self) {
        let audio = self.audio.get_mut();
        if let Some(handle) = audio.handle.take() {
            audio.sandbox.free(handle);
        }
        debug!(module = %self.descriptor.name, "destroyed module instance");
    }
}

impl<S: Sandbox> std::fmt::Debug for ModuleInstance<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("module", &self.descriptor.name)
            .field("init", &self.init.get())
            .field("faulted", &self.is_faulted())
            .finish_non_exhaustive()
    }
}
