//! The C ABI, driven the way a native host would.

mod common;

use aa_host_core::{ChannelShape, HostConfig};
use aa_host_core::ffi::*;
use common::*;
use serde_json::Value;
use std::ffi::{CStr, CString, c_char};
use std::ptr;
use tempfile::TempDir;

fn c(text: &str) -> CString {
    CString::new(text).unwrap()
}

fn take_json(ptr: *mut c_char) -> Value {
    assert!(!ptr.is_null());
    let text = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_owned();
    unsafe { aa_string_free(ptr) };
    serde_json::from_str(&text).unwrap()
}

fn new_module(dir: &TempDir, name: &str) -> *mut AaModule {
    let source = c(&location(dir));
    let name = c(name);
    unsafe { aa_module_new(source.as_ptr(), name.as_ptr()) }
}

#[test]
fn sine_lifecycle() {
    let dir = standard_source();
    let module = new_module(&dir, "sine");
    assert!(!module.is_null());

    unsafe {
        assert_eq!(aa_module_init(module, 48_000.0), AA_OK);
        assert_eq!(aa_module_get_number_inputs(module), 0);
        assert_eq!(aa_module_get_number_outputs(module), 1);

        assert_eq!(aa_module_set_param_float(module, 0, 0, 880.0), AA_OK);
        let mut out = vec![0.0f32; 128];
        aa_module_compute_zero_one(module, 128, out.as_mut_ptr());
        assert!(out.iter().any(|s| s.abs() > 0.5));
        assert_eq!(upward_crossings(&out), 2);

        let gui = take_json(aa_module_gui_description(module));
        assert_eq!(gui["module"], "sine");
        assert_eq!(gui["parameters"][0]["value"], 880.0);

        aa_module_delete(module);
    }
}

#[test]
fn catalog_listing_is_a_json_array() {
    let dir = standard_source();
    let source = c(&location(&dir));
    let listing = take_json(unsafe { aa_get_modules(source.as_ptr()) });

    let names: Vec<&str> = listing
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["name"].as_str())
        .collect();
    assert!(names.contains(&"sine"));
    assert!(names.contains(&"gain_2x2"));
}

#[test]
fn unreachable_source_lists_nothing() {
    let source = c("/no/such/module/source");
    assert!(unsafe { aa_get_modules(source.as_ptr()) }.is_null());
}

#[test]
fn unknown_module_yields_null() {
    let dir = standard_source();
    assert!(new_module(&dir, "reverb").is_null());
    assert!(new_module(&dir, "no_compute").is_null());
}

#[test]
fn invalid_sample_rate_is_rejected() {
    let dir = standard_source();
    let module = new_module(&dir, "sine");
    unsafe {
        assert_eq!(aa_module_init(module, 0.0), AA_ERR_INVALID_ARGUMENT);
        assert_eq!(aa_module_init(module, f64::INFINITY), AA_ERR_INVALID_ARGUMENT);
        assert_eq!(aa_module_init(module, 44_100.0), AA_OK);
        assert_eq!(aa_module_init(module, 96_000.0), AA_OK);
        aa_module_delete(module);
    }
}

#[test]
fn staging_into_a_full_queue_fails() {
    let dir = standard_source();
    let module = new_module(&dir, &gain_name(ChannelShape::ZeroOne));
    unsafe {
        assert_eq!(aa_module_init(module, 48_000.0), AA_OK);

        let mut status = AA_OK;
        for _ in 0..=HostConfig::default().event_queue_capacity {
            status = aa_module_handle_note_on(module, 60, 1.0);
        }
        assert_eq!(status, AA_ERR_QUEUE_FULL);

        // Rendering drains the queue and staging works again.
        let mut out = [0.0f32; 16];
        aa_module_compute_zero_one(module, 16, out.as_mut_ptr());
        assert_eq!(aa_module_handle_note_off(module, 60, 0.0), AA_OK);

        aa_module_delete(module);
    }
}

#[test]
fn stereo_processing_through_two_two() {
    let dir = standard_source();
    let module = new_module(&dir, &gain_name(ChannelShape::TwoTwo));
    let left: Vec<f32> = (0..64).map(|i| i as f32 / 64.0).collect();
    let right: Vec<f32> = left.iter().map(|s| 1.0 - s).collect();
    let mut out_left = vec![f32::NAN; 64];
    let mut out_right = vec![f32::NAN; 64];

    unsafe {
        assert_eq!(aa_module_init(module, 48_000.0), AA_OK);
        assert_eq!(aa_module_get_number_inputs(module), 2);
        assert_eq!(aa_module_set_param_float(module, 0, 0, 2.0), AA_OK);
        aa_module_compute_two_two_non(
            module,
            64,
            left.as_ptr(),
            right.as_ptr(),
            out_left.as_mut_ptr(),
            out_right.as_mut_ptr(),
        );
        aa_module_delete(module);
    }

    for i in 0..64 {
        assert_eq!(out_left[i], left[i] * 2.0);
        assert_eq!(out_right[i], right[i] * 2.0);
    }
}

#[test]
fn null_input_pointer_yields_silence() {
    let dir = standard_source();
    let module = new_module(&dir, &gain_name(ChannelShape::OneTwo));
    let mut out0 = [1.0f32; 32];
    let mut out1 = [1.0f32; 32];
    unsafe {
        assert_eq!(aa_module_init(module, 48_000.0), AA_OK);
        aa_module_compute_one_two_non(
            module,
            32,
            ptr::null(),
            out0.as_mut_ptr(),
            out1.as_mut_ptr(),
        );
        aa_module_delete(module);
    }
    assert!(out0.iter().chain(&out1).all(|&s| s == 0.0));
}

#[test]
fn stereo_generator_through_zero_two() {
    let dir = standard_source();
    let module = new_module(&dir, &gain_name(ChannelShape::ZeroTwo));
    let mut out0 = [f32::NAN; 48];
    let mut out1 = [f32::NAN; 48];
    unsafe {
        assert_eq!(aa_module_init(module, 48_000.0), AA_OK);
        assert_eq!(aa_module_handle_note_on(module, 64, 0.75), AA_OK);
        aa_module_compute_zero_two_non(module, 48, out0.as_mut_ptr(), out1.as_mut_ptr());
        aa_module_delete(module);
    }
    assert!(out0.iter().chain(&out1).all(|&s| s == 0.75));
}

#[test]
fn mono_effect_through_one_one() {
    let dir = standard_source();
    let module = new_module(&dir, &gain_name(ChannelShape::OneOne));
    let input = [0.5f32; 40];
    let mut output = [f32::NAN; 40];
    unsafe {
        assert_eq!(aa_module_init(module, 48_000.0), AA_OK);
        aa_module_compute_one_one(module, 40, input.as_ptr(), output.as_mut_ptr());
        aa_module_delete(module);
    }
    assert!(output.iter().all(|&s| s == 0.5));
}

#[test]
fn http_sources_work_through_the_c_abi() {
    let dir = standard_source();
    let url = c(&serve_http(&dir));

    let listing = take_json(unsafe { aa_get_modules(url.as_ptr()) });
    assert!(listing.as_array().is_some_and(|m| !m.is_empty()));

    let name = c("sine");
    let module = unsafe { aa_module_new(url.as_ptr(), name.as_ptr()) };
    assert!(!module.is_null());
    unsafe {
        assert_eq!(aa_module_init(module, 48_000.0), AA_OK);
        let mut out = [0.0f32; 128];
        aa_module_compute_zero_one(module, 128, out.as_mut_ptr());
        assert_eq!(upward_crossings(&out), 1);
        aa_module_delete(module);
    }
}

#[test]
fn default_module_names_the_manifest_default() {
    let dir = standard_source();
    let source = c(&location(&dir));
    let name = unsafe { aa_get_default_module(source.as_ptr()) };
    assert!(!name.is_null());
    assert_eq!(unsafe { CStr::from_ptr(name) }.to_str().unwrap(), "sine");
    unsafe { aa_string_free(name) };

    let missing = c("/no/such/module/source");
    assert!(unsafe { aa_get_default_module(missing.as_ptr()) }.is_null());
}

#[test]
fn legacy_names_reach_the_same_instance() {
    let dir = standard_source();
    let module = new_module(&dir, "sine");
    unsafe {
        assert_eq!(aa_module_init(module, 48_000.0), AA_OK);
        assert_eq!(set_param_float(module, 0, 0, 660.0), AA_OK);
        let gui = take_json(get_gui_description(module));
        assert_eq!(gui["parameters"][0]["value"], 660.0);
        aa_module_delete(module);
    }
}
