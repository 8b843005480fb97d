//! C ABI exported by the `cdylib`.
//!
//! Every instance is a heap-allocated [`AaModule`] handed out as an opaque pointer. The
//! Wasmtime engine is process-wide and shared by every instance; each instance still owns
//! its own store.
//!
//! Conventions:
//! - Constructors return null on failure; the reason is logged.
//! - Control calls return a status code (`AA_OK` or a negative `AA_ERR_*`).
//! - Strings returned to the caller are owned by the caller and released with
//!   [`aa_string_free`].
//! - A source is a directory, a `file://` URL or an `http(s)://` base URL.
//! - Render calls never fail: a null instance or an invalid argument yields silence where
//!   the output pointers allow it.
//!
//! The header lives in `include/aa_host.h`.

use crate::catalog::{self, Catalog};
use crate::config::HostConfig;
use crate::error::HostError;
use crate::instance::ModuleInstance;
use crate::introspect;
use crate::logging;
use crate::render::RenderBuffers;
use crate::runtime::WasmSandbox;

use std::ffi::{CStr, CString, c_char, c_double, c_float, c_int, c_uint};
use std::sync::OnceLock;
use tracing::{error, warn};

/// Opaque instance type seen by C callers.
pub type AaModule = ModuleInstance<WasmSandbox>;

pub const AA_OK: c_int = 0;
pub const AA_ERR_NULL: c_int = -1;
pub const AA_ERR_QUEUE_FULL: c_int = -2;
pub const AA_ERR_INVALID_ARGUMENT: c_int = -3;
pub const AA_ERR_SANDBOX: c_int = -4;

static SANDBOX: OnceLock<Option<WasmSandbox>> = OnceLock::new();

fn shared_sandbox() -> Option<&'static WasmSandbox> {
    SANDBOX
        .get_or_init(|| match WasmSandbox::new(&HostConfig::default()) {
            Ok(sandbox) => Some(sandbox),
            Err(e) => {
                error!(error = %e, "failed to create the wasm engine");
                None
            }
        })
        .as_ref()
}

fn status(result: Result<(), HostError>) -> c_int {
    match result {
        Ok(()) => AA_OK,
        Err(HostError::QueueFull) => AA_ERR_QUEUE_FULL,
        Err(HostError::InvalidSampleRate(_)) => AA_ERR_INVALID_ARGUMENT,
        Err(HostError::UnsupportedShape { .. } | HostError::Sandbox(_)) => AA_ERR_SANDBOX,
    }
}

/// # Safety
/// `ptr` must be null or a valid NUL-terminated string that outlives the call.
unsafe fn str_arg<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null and NUL-terminated per the caller's contract.
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

fn into_c_string(text: String) -> *mut c_char {
    match CString::new(text) {
        Ok(s) => s.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// # Safety
/// `ptr` must be null or a pointer returned by [`aa_module_new`] not yet deleted.
unsafe fn instance<'a>(ptr: *const AaModule) -> Option<&'a AaModule> {
    // SAFETY: null or live per the caller's contract.
    unsafe { ptr.as_ref() }
}

/// # Safety
/// `ptr` must be null or valid for writes of `frames` floats.
unsafe fn out_slice<'a>(ptr: *mut c_float, frames: usize) -> Option<&'a mut [f32]> {
    // SAFETY: non-null and sized per the caller's contract.
    (!ptr.is_null()).then(|| unsafe { std::slice::from_raw_parts_mut(ptr, frames) })
}

/// # Safety
/// `ptr` must be null or valid for reads of `frames` floats.
unsafe fn in_slice<'a>(ptr: *const c_float, frames: usize) -> Option<&'a [f32]> {
    // SAFETY: non-null and sized per the caller's contract.
    (!ptr.is_null()).then(|| unsafe { std::slice::from_raw_parts(ptr, frames) })
}

/// Load module `name` from `source`. Returns null on failure.
///
/// # Safety
/// `source` and `name` must be null or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aa_module_new(
    source: *const c_char,
    name: *const c_char,
) -> *mut AaModule {
    // SAFETY: forwarded caller contract.
    let (Some(source), Some(name)) = (unsafe { str_arg(source) }, unsafe { str_arg(name) })
    else {
        warn!("aa_module_new called with a null or non-UTF-8 argument");
        return std::ptr::null_mut();
    };
    let Some(sandbox) = shared_sandbox() else {
        return std::ptr::null_mut();
    };

    match ModuleInstance::create(
        catalog::for_source(source),
        sandbox.clone(),
        sandbox.config(),
        source,
        name,
    ) {
        Ok(instance) => Box::into_raw(Box::new(instance)),
        Err(e) => {
            error!(source, module = name, error = %e, "failed to create module");
            std::ptr::null_mut()
        }
    }
}

/// Destroy an instance. Null is ignored.
///
/// # Safety
/// `ptr` must be null or a pointer returned by [`aa_module_new`], not used afterwards and
/// not being rendered concurrently.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aa_module_delete(ptr: *mut AaModule) {
    if !ptr.is_null() {
        // SAFETY: ownership returns from the caller exactly once.
        drop(unsafe { Box::from_raw(ptr) });
    }
}

/// JSON array describing every module at `source`, or null if the source cannot be
/// listed. Release with [`aa_string_free`].
///
/// # Safety
/// `source` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aa_get_modules(source: *const c_char) -> *mut c_char {
    // SAFETY: forwarded caller contract.
    let Some(source) = (unsafe { str_arg(source) }) else {
        return std::ptr::null_mut();
    };
    match introspect::catalog_json(catalog::for_source(source), source) {
        Ok(json) => into_c_string(json),
        Err(e) => {
            warn!(source, error = %e, "failed to list modules");
            std::ptr::null_mut()
        }
    }
}

/// Name of the module `source` marks as default, or null if it names none or cannot be
/// read. Release with [`aa_string_free`].
///
/// # Safety
/// `source` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aa_get_default_module(source: *const c_char) -> *mut c_char {
    // SAFETY: forwarded caller contract.
    let Some(source) = (unsafe { str_arg(source) }) else {
        return std::ptr::null_mut();
    };
    match catalog::for_source(source).default_module(source) {
        Ok(Some(name)) => into_c_string(name),
        Ok(None) => std::ptr::null_mut(),
        Err(e) => {
            warn!(source, error = %e, "failed to read the default module");
            std::ptr::null_mut()
        }
    }
}

/// JSON GUI description of a live instance, or null. Release with [`aa_string_free`].
///
/// # Safety
/// `ptr` must be null or a live instance.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aa_module_gui_description(ptr: *const AaModule) -> *mut c_char {
    // SAFETY: forwarded caller contract.
    let Some(module) = (unsafe { instance(ptr) }) else {
        return std::ptr::null_mut();
    };
    module
        .gui_description()
        .to_json()
        .map_or(std::ptr::null_mut(), into_c_string)
}

/// Same as [`aa_module_gui_description`], under the name older hosts link against.
///
/// # Safety
/// `ptr` must be null or a live instance.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn get_gui_description(ptr: *const AaModule) -> *mut c_char {
    // SAFETY: forwarded caller contract.
    unsafe { aa_module_gui_description(ptr) }
}

/// Release a string returned by this library. Null is ignored.
///
/// # Safety
/// `ptr` must be null or a string returned by this library and not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aa_string_free(ptr: *mut c_char) {
    if !ptr.is_null() {
        // SAFETY: produced by `CString::into_raw` in this module.
        drop(unsafe { CString::from_raw(ptr) });
    }
}

/// One-time setup. Not thread safe with respect to rendering.
///
/// # Safety
/// `ptr` must be null or a live instance.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aa_module_init(ptr: *const AaModule, sample_rate: c_double) -> c_int {
    // SAFETY: forwarded caller contract.
    let Some(module) = (unsafe { instance(ptr) }) else {
        return AA_ERR_NULL;
    };
    let result = module.initialize(sample_rate);
    if let Err(e) = &result {
        error!(module = %module.descriptor().name, error = %e, "initialization failed");
    }
    status(result)
}

/// Stage a parameter change for the next render.
///
/// # Safety
/// `ptr` must be null or a live instance.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aa_module_set_param_float(
    ptr: *const AaModule,
    node: c_uint,
    index: c_uint,
    value: c_float,
) -> c_int {
    // SAFETY: forwarded caller contract.
    let Some(module) = (unsafe { instance(ptr) }) else {
        return AA_ERR_NULL;
    };
    status(module.set_parameter(node, index, value))
}

/// Same as [`aa_module_set_param_float`], under the name older hosts link against.
///
/// # Safety
/// `ptr` must be null or a live instance.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn set_param_float(
    ptr: *const AaModule,
    node: c_uint,
    index: c_uint,
    value: c_float,
) -> c_int {
    // SAFETY: forwarded caller contract.
    unsafe { aa_module_set_param_float(ptr, node, index, value) }
}

/// # Safety
/// `ptr` must be null or a live instance.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aa_module_handle_note_on(
    ptr: *const AaModule,
    note: c_int,
    velocity: c_float,
) -> c_int {
    // SAFETY: forwarded caller contract.
    let Some(module) = (unsafe { instance(ptr) }) else {
        return AA_ERR_NULL;
    };
    status(module.note_on(note, velocity))
}

/// # Safety
/// `ptr` must be null or a live instance.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aa_module_handle_note_off(
    ptr: *const AaModule,
    note: c_int,
    velocity: c_float,
) -> c_int {
    // SAFETY: forwarded caller contract.
    let Some(module) = (unsafe { instance(ptr) }) else {
        return AA_ERR_NULL;
    };
    status(module.note_off(note, velocity))
}

/// Number of input channels (0, 1 or 2), or `AA_ERR_NULL`.
///
/// # Safety
/// `ptr` must be null or a live instance.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aa_module_get_number_inputs(ptr: *const AaModule) -> c_int {
    // SAFETY: forwarded caller contract.
    unsafe { instance(ptr) }.map_or(AA_ERR_NULL, |m| m.input_channel_count() as c_int)
}

/// Number of output channels (1 or 2), or `AA_ERR_NULL`.
///
/// # Safety
/// `ptr` must be null or a live instance.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aa_module_get_number_outputs(ptr: *const AaModule) -> c_int {
    // SAFETY: forwarded caller contract.
    unsafe { instance(ptr) }.map_or(AA_ERR_NULL, |m| m.output_channel_count() as c_int)
}

fn frame_count(frames: c_int) -> Option<usize> {
    usize::try_from(frames).ok().filter(|&n| n > 0)
}

/// Render `buffers` through `ptr`, or silence them when there is no instance.
///
/// # Safety
/// `ptr` must be null or a live instance only rendered from this thread.
unsafe fn render(ptr: *const AaModule, frames: usize, mut buffers: RenderBuffers<'_>) {
    // SAFETY: forwarded caller contract.
    match unsafe { instance(ptr) } {
        Some(module) => module.render(frames, buffers),
        None => buffers.silence(frames),
    }
}

/// Render one period: no input, one output.
///
/// # Safety
/// `ptr` must be null or a live instance. `output` must be null or valid for `frames`
/// writes. Exactly one audio thread per instance.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aa_module_compute_zero_one(
    ptr: *const AaModule,
    frames: c_int,
    output: *mut c_float,
) {
    let Some(n) = frame_count(frames) else { return };
    // SAFETY: forwarded caller contract.
    let Some(output) = (unsafe { out_slice(output, n) }) else {
        return;
    };
    unsafe { render(ptr, n, RenderBuffers::ZeroOne { output }) }
}

/// Render one period: one input, one output.
///
/// # Safety
/// As [`aa_module_compute_zero_one`]; `input` must be null or valid for `frames` reads
/// and must not overlap `output`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aa_module_compute_one_one(
    ptr: *const AaModule,
    frames: c_int,
    input: *const c_float,
    output: *mut c_float,
) {
    let Some(n) = frame_count(frames) else { return };
    // SAFETY: forwarded caller contract.
    let Some(output) = (unsafe { out_slice(output, n) }) else {
        return;
    };
    match unsafe { in_slice(input, n) } {
        Some(input) => unsafe { render(ptr, n, RenderBuffers::OneOne { input, output }) },
        None => output.fill(0.0),
    }
}

/// Render one period: one input, two non-interleaved outputs.
///
/// # Safety
/// As [`aa_module_compute_one_one`], for every channel pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aa_module_compute_one_two_non(
    ptr: *const AaModule,
    frames: c_int,
    input: *const c_float,
    output0: *mut c_float,
    output1: *mut c_float,
) {
    let Some(n) = frame_count(frames) else { return };
    // SAFETY: forwarded caller contract.
    let (Some(output0), Some(output1)) =
        (unsafe { (out_slice(output0, n), out_slice(output1, n)) })
    else {
        return;
    };
    match unsafe { in_slice(input, n) } {
        Some(input) => unsafe {
            render(
                ptr,
                n,
                RenderBuffers::OneTwo {
                    input,
                    output0,
                    output1,
                },
            )
        },
        None => {
            output0.fill(0.0);
            output1.fill(0.0);
        }
    }
}

/// Render one period: two inputs, two non-interleaved outputs.
///
/// # Safety
/// As [`aa_module_compute_one_one`], for every channel pointer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aa_module_compute_two_two_non(
    ptr: *const AaModule,
    frames: c_int,
    input0: *const c_float,
    input1: *const c_float,
    output0: *mut c_float,
    output1: *mut c_float,
) {
    let Some(n) = frame_count(frames) else { return };
    // SAFETY: forwarded caller contract.
    let (Some(output0), Some(output1)) =
        (unsafe { (out_slice(output0, n), out_slice(output1, n)) })
    else {
        return;
    };
    match unsafe { (in_slice(input0, n), in_slice(input1, n)) } {
        (Some(input0), Some(input1)) => unsafe {
            render(
                ptr,
                n,
                RenderBuffers::TwoTwo {
                    input0,
                    input1,
                    output0,
                    output1,
                },
            )
        },
        _ => {
            output0.fill(0.0);
            output1.fill(0.0);
        }
    }
}

/// Render one period: no input, two non-interleaved outputs.
///
/// # Safety
/// As [`aa_module_compute_zero_one`], for both output pointers.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aa_module_compute_zero_two_non(
    ptr: *const AaModule,
    frames: c_int,
    output0: *mut c_float,
    output1: *mut c_float,
) {
    let Some(n) = frame_count(frames) else { return };
    // SAFETY: forwarded caller contract.
    let (Some(output0), Some(output1)) =
        (unsafe { (out_slice(output0, n), out_slice(output1, n)) })
    else {
        return;
    };
    unsafe { render(ptr, n, RenderBuffers::ZeroTwo { output0, output1 }) }
}

/// Install a stderr `tracing` subscriber. `level`: 0 = error, 1 = warn, 2 = info,
/// 3 = debug, 4 = trace.
///
/// Returns `AA_OK`, or `AA_ERR_INVALID_ARGUMENT` for an unknown level or when a
/// subscriber is already installed.
#[unsafe(no_mangle)]
pub extern "C" fn aa_init_logging(level: c_int) -> c_int {
    match logging::level_from_index(level) {
        Some(level) if logging::init_logging(level) => AA_OK,
        _ => AA_ERR_INVALID_ARGUMENT,
    }
}
