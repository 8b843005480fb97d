//! The execution-sandbox seam.
//!
//! The host never runs module code itself. It asks a [`Sandbox`] to load a bundle into
//! an opaque handle, calls entry points on that handle, and frees it exactly once.
//! [`crate::runtime::WasmSandbox`] is the production implementation; tests substitute
//! recording mocks.

use crate::catalog::ModuleBundle;
use crate::events::NoteEvent;
use crate::node::ParamAddress;
use thiserror::Error;

/// Scalar entry points. Rendering goes through [`Sandbox::compute`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Call {
    Init { sample_rate: f64 },
    InputCount,
    OutputCount,
    SetParam { address: ParamAddress, value: f32 },
    Note(NoteEvent),
}

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("module failed to load: {0}")]
    Load(String),

    #[error("module is missing required export `{0}`")]
    MissingExport(&'static str),

    #[error("module has no parameter {0}")]
    UnknownParameter(ParamAddress),

    #[error("module code trapped: {0}")]
    Trap(String),

    /// A trap on the audio thread. Carries no message so reporting it never allocates.
    #[error("module code trapped while rendering")]
    RenderTrap,

    #[error("guest buffer for channel {channel} is out of bounds")]
    OutOfBounds { channel: usize },

    #[error("module was called before initialization")]
    NotInitialized,
}

impl SandboxError {
    /// Whether the module's internal state can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SandboxError::Trap(_) | SandboxError::RenderTrap | SandboxError::OutOfBounds { .. }
        )
    }
}

/// Loads, runs and frees isolated module code.
pub trait Sandbox: Send {
    type Handle: Send;

    /// Instantiate the bundle's code. Must not allocate audio resources yet.
    fn load(&mut self, bundle: &ModuleBundle) -> Result<Self::Handle, SandboxError>;

    /// Invoke a scalar entry point. Returns the entry point's integer result
    /// (channel counts) or `0` for entry points without one.
    ///
    /// `SetParam` and `Note` only run on the audio thread, between [`Sandbox::begin_render`]
    /// and [`Sandbox::compute`], and draw on that render's budget.
    fn call(&mut self, handle: &mut Self::Handle, call: Call) -> Result<i32, SandboxError>;

    /// Open one render period of `frames` samples. Staged calls and the compute that follow
    /// share the execution budget granted here, so the period's cost is bounded by
    /// `frames`.
    fn begin_render(
        &mut self,
        _handle: &mut Self::Handle,
        _frames: usize,
    ) -> Result<(), SandboxError> {
        Ok(())
    }

    /// Render `frames` samples from `inputs` into every slice of `outputs`.
    ///
    /// Called on the audio thread after [`Sandbox::begin_render`]. On `Ok`, every output
    /// slice must be fully written.
    fn compute(
        &mut self,
        handle: &mut Self::Handle,
        frames: usize,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
    ) -> Result<(), SandboxError>;

    /// Release a handle. Called exactly once per successful `load`.
    fn free(&mut self, handle: Self::Handle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traps_are_fatal_unknown_params_are_not() {
        assert!(SandboxError::Trap("unreachable".into()).is_fatal());
        assert!(SandboxError::RenderTrap.is_fatal());
        assert!(SandboxError::OutOfBounds { channel: 1 }.is_fatal());
        assert!(!SandboxError::UnknownParameter(ParamAddress::new(1, 2)).is_fatal());
        assert!(!SandboxError::NotInitialized.is_fatal());
    }

    #[test]
    fn unknown_parameter_display_names_the_address() {
        let err = SandboxError::UnknownParameter(ParamAddress::new(3, 4));
        assert_eq!(err.to_string(), "module has no parameter 3:4");
    }
}
