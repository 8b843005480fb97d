//! Fixed channel shapes and caller-owned buffer views for rendering.
//!
//! The host supports exactly five shapes (inputs x outputs): 0x1, 1x1, 1x2, 2x2, 0x2.
//! Buffers are non-interleaved: one slice per channel. Callers query the shape once
//! after initialization and then always call the matching entry point; the shape is not
//! re-validated per call on release builds.

/// One of the five supported input/output channel layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelShape {
    ZeroOne,
    OneOne,
    OneTwo,
    TwoTwo,
    ZeroTwo,
}

impl ChannelShape {
    pub const fn from_counts(inputs: u32, outputs: u32) -> Option<Self> {
        match (inputs, outputs) {
            (0, 1) => Some(ChannelShape::ZeroOne),
            (1, 1) => Some(ChannelShape::OneOne),
            (1, 2) => Some(ChannelShape::OneTwo),
            (2, 2) => Some(ChannelShape::TwoTwo),
            (0, 2) => Some(ChannelShape::ZeroTwo),
            _ => None,
        }
    }

    pub const fn inputs(self) -> u32 {
        match self {
            ChannelShape::ZeroOne | ChannelShape::ZeroTwo => 0,
            ChannelShape::OneOne | ChannelShape::OneTwo => 1,
            ChannelShape::TwoTwo => 2,
        }
    }

    pub const fn outputs(self) -> u32 {
        match self {
            ChannelShape::ZeroOne | ChannelShape::OneOne => 1,
            ChannelShape::OneTwo | ChannelShape::TwoTwo | ChannelShape::ZeroTwo => 2,
        }
    }
}

/// Caller-owned buffers for one render call, tagged by shape.
///
/// Inputs are read-only, outputs are fully overwritten.
#[derive(Debug)]
pub enum RenderBuffers<'a> {
    ZeroOne {
        output: &'a mut [f32],
    },
    OneOne {
        input: &'a [f32],
        output: &'a mut [f32],
    },
    OneTwo {
        input: &'a [f32],
        output0: &'a mut [f32],
        output1: &'a mut [f32],
    },
    TwoTwo {
        input0: &'a [f32],
        input1: &'a [f32],
        output0: &'a mut [f32],
        output1: &'a mut [f32],
    },
    ZeroTwo {
        output0: &'a mut [f32],
        output1: &'a mut [f32],
    },
}

impl RenderBuffers<'_> {
    pub fn shape(&self) -> ChannelShape {
        match self {
            RenderBuffers::ZeroOne { .. } => ChannelShape::ZeroOne,
            RenderBuffers::OneOne { .. } => ChannelShape::OneOne,
            RenderBuffers::OneTwo { .. } => ChannelShape::OneTwo,
            RenderBuffers::TwoTwo { .. } => ChannelShape::TwoTwo,
            RenderBuffers::ZeroTwo { .. } => ChannelShape::ZeroTwo,
        }
    }

    /// Largest frame count every buffer can hold.
    pub fn capacity(&self) -> usize {
        match self {
            RenderBuffers::ZeroOne { output } => output.len(),
            RenderBuffers::OneOne { input, output } => input.len().min(output.len()),
            RenderBuffers::OneTwo {
                input,
                output0,
                output1,
            } => input.len().min(output0.len()).min(output1.len()),
            RenderBuffers::TwoTwo {
                input0,
                input1,
                output0,
                output1,
            } => input0
                .len()
                .min(input1.len())
                .min(output0.len())
                .min(output1.len()),
            RenderBuffers::ZeroTwo { output0, output1 } => output0.len().min(output1.len()),
        }
    }

    /// Zero the first `frames` samples of every output.
    pub fn silence(&mut self, frames: usize) {
        self.with_channels(frames, |_, outputs| {
            for out in outputs.iter_mut() {
                out.fill(0.0);
            }
        });
    }

    /// Hand out per-channel views trimmed to `frames` (clamped to [`Self::capacity`]),
    /// without allocating.
    pub fn with_channels<R>(
        &mut self,
        frames: usize,
        f: impl FnOnce(&[&[f32]], &mut [&mut [f32]]) -> R,
    ) -> R {
        let n = frames.min(self.capacity());
        match self {
            RenderBuffers::ZeroOne { output } => f(&[], &mut [&mut output[..n]]),
            RenderBuffers::OneOne { input, output } => f(&[&input[..n]], &mut [&mut output[..n]]),
            RenderBuffers::OneTwo {
                input,
                output0,
                output1,
            } => f(&[&input[..n]], &mut [&mut output0[..n], &mut output1[..n]]),
            RenderBuffers::TwoTwo {
                input0,
                input1,
                output0,
                output1,
            } => f(
                &[&input0[..n], &input1[..n]],
                &mut [&mut output0[..n], &mut output1[..n]],
            ),
            RenderBuffers::ZeroTwo { output0, output1 } => {
                f(&[], &mut [&mut output0[..n], &mut output1[..n]])
            }
        }
    }
}
