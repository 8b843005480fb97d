//! Shared fixtures: temporary module sources populated with WAT modules.
#![allow(dead_code)]

use aa_host_core::{ChannelShape, ModuleInstance, RenderBuffers, Sandbox};
use serde_json::json;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Guest offset of input channel 0; channel `k` sits `k * CHANNEL_STRIDE` above it.
pub const INPUT_BASE: u32 = 4096;
pub const OUTPUT_BASE: u32 = 8192;
pub const CHANNEL_STRIDE: u32 = 1024;

/// Oscillator with a frequency parameter at (0, 0), default 440 Hz. Outputs a parabolic
/// sine approximation and logs once from init.
pub const SINE_WAT: &str = r#"(module
  (import "env" "aa_log" (func $log (param i32 i32)))
  (import "env" "aa_abi_version" (func $abi (result i32)))
  (memory (export "memory") 1)
  (data (i32.const 16) "sine ready")
  (global $rate (mut f32) (f32.const 48000))
  (global $freq (mut f32) (f32.const 440))
  (global $phase (mut f32) (f32.const 0))
  (func (export "aa_init") (param $sample_rate f64)
    (global.set $rate (f32.demote_f64 (local.get $sample_rate)))
    (call $log (i32.const 16) (i32.const 10)))
  (func (export "aa_get_number_inputs") (result i32) (i32.const 0))
  (func (export "aa_get_number_outputs") (result i32) (i32.const 1))
  (func (export "aa_get_output") (param $channel i32) (result i32) (i32.const 1024))
  (func (export "aa_block_size") (result i32) (i32.const 128))
  (func (export "aa_set_param_float") (param $node i32) (param $index i32) (param $value f32) (result i32)
    (if (result i32) (i32.or (local.get $node) (local.get $index))
      (then (i32.const 1))
      (else (global.set $freq (local.get $value)) (i32.const 0))))
  (func (export "aa_compute") (param $frames i32)
    (local $i i32)
    (local $x f32)
    (block $done
      (loop $next
        (br_if $done (i32.ge_u (local.get $i) (local.get $frames)))
        (local.set $x (f32.sub (f32.mul (global.get $phase) (f32.const 2)) (f32.const 1)))
        (f32.store
          (i32.add (i32.const 1024) (i32.shl (local.get $i) (i32.const 2)))
          (f32.mul
            (f32.mul (f32.const 4) (local.get $x))
            (f32.sub (f32.const 1) (f32.abs (local.get $x)))))
        (global.set $phase
          (f32.add (global.get $phase) (f32.div (global.get $freq) (global.get $rate))))
        (if (f32.ge (global.get $phase) (f32.const 1))
          (then (global.set $phase (f32.sub (global.get $phase) (f32.const 1)))))
        (local.set $i (i32.add (local.get $i) (i32.const 1)))
        (br $next)))))
"#;

/// Traps on the first compute.
pub const TRAP_WAT: &str = r#"(module
  (memory (export "memory") 1)
  (func (export "aa_get_number_inputs") (result i32) (i32.const 0))
  (func (export "aa_get_number_outputs") (result i32) (i32.const 1))
  (func (export "aa_get_output") (param i32) (result i32) (i32.const 1024))
  (func (export "aa_compute") (param i32) unreachable))
"#;

/// Never returns from compute.
pub const RUNAWAY_WAT: &str = r#"(module
  (memory (export "memory") 1)
  (func (export "aa_get_number_inputs") (result i32) (i32.const 0))
  (func (export "aa_get_number_outputs") (result i32) (i32.const 1))
  (func (export "aa_get_output") (param i32) (result i32) (i32.const 1024))
  (func (export "aa_compute") (param i32) (loop $spin (br $spin))))
"#;

/// Lacks `aa_compute`.
pub const NO_COMPUTE_WAT: &str = r#"(module
  (memory (export "memory") 1)
  (func (export "aa_get_number_inputs") (result i32) (i32.const 0))
  (func (export "aa_get_number_outputs") (result i32) (i32.const 1))
  (func (export "aa_get_output") (param i32) (result i32) (i32.const 1024)))
"#;

/// Outputs 0.5. Each note-on spins `note * 10_000` loop iterations first.
pub const BUSY_NOTE_WAT: &str = r#"(module
  (memory (export "memory") 1)
  (global $spins (mut i32) (i32.const 0))
  (func (export "aa_get_number_inputs") (result i32) (i32.const 0))
  (func (export "aa_get_number_outputs") (result i32) (i32.const 1))
  (func (export "aa_get_output") (param i32) (result i32) (i32.const 1024))
  (func (export "aa_handle_note_on") (param $note i32) (param $velocity f32)
    (local $i i32)
    (block $done
      (loop $spin
        (br_if $done
          (i32.ge_u (local.get $i) (i32.mul (local.get $note) (i32.const 10000))))
        (global.set $spins (i32.add (global.get $spins) (i32.const 1)))
        (local.set $i (i32.add (local.get $i) (i32.const 1)))
        (br $spin))))
  (func (export "aa_compute") (param $frames i32)
    (local $i i32)
    (block $done
      (loop $next
        (br_if $done (i32.ge_u (local.get $i) (local.get $frames)))
        (f32.store
          (i32.add (i32.const 1024) (i32.shl (local.get $i) (i32.const 2)))
          (f32.const 0.5))
        (local.set $i (i32.add (local.get $i) (i32.const 1)))
        (br $next)))))
"#;

/// Library module linked ahead of [`SCALED_WAT`].
pub const DSP_WAT: &str = r#"(module
  (func (export "scale") (param f32) (result f32)
    (f32.mul (local.get 0) (f32.const 0.25))))
"#;

/// Outputs `dsp.scale(1.0)` on every frame.
pub const SCALED_WAT: &str = r#"(module
  (import "dsp" "scale" (func $scale (param f32) (result f32)))
  (memory (export "memory") 1)
  (func (export "aa_get_number_inputs") (result i32) (i32.const 0))
  (func (export "aa_get_number_outputs") (result i32) (i32.const 1))
  (func (export "aa_get_output") (param i32) (result i32) (i32.const 1024))
  (func (export "aa_compute") (param $frames i32)
    (local $i i32)
    (block $done
      (loop $next
        (br_if $done (i32.ge_u (local.get $i) (local.get $frames)))
        (f32.store
          (i32.add (i32.const 1024) (i32.shl (local.get $i) (i32.const 2)))
          (call $scale (f32.const 1)))
        (local.set $i (i32.add (local.get $i) (i32.const 1)))
        (br $next)))))
"#;

/// A gain stage for any supported shape. Parameter (0, 0) is the gain (default 1).
///
/// Output `k` is `gain * input[min(k, inputs - 1)]`, or `gain * level` without inputs.
/// `level` starts at 0.5; note-on sets it to the velocity and note-off to zero.
pub fn gain_wat(inputs: u32, outputs: u32) -> String {
    let mut body = String::new();
    for k in 0..outputs {
        let source = if inputs == 0 {
            "(global.get $level)".to_string()
        } else {
            let channel = k.min(inputs - 1);
            format!(
                "(f32.load (i32.add (i32.const {}) (local.get $off)))",
                INPUT_BASE + channel * CHANNEL_STRIDE
            )
        };
        body.push_str(&format!(
            "(f32.store (i32.add (i32.const {}) (local.get $off)) (f32.mul (global.get $gain) {source}))\n",
            OUTPUT_BASE + k * CHANNEL_STRIDE
        ));
    }

    format!(
        r#"(module
  (memory (export "memory") 1)
  (global $gain (mut f32) (f32.const 1))
  (global $level (mut f32) (f32.const 0.5))
  (func (export "aa_get_number_inputs") (result i32) (i32.const {inputs}))
  (func (export "aa_get_number_outputs") (result i32) (i32.const {outputs}))
  (func (export "aa_get_input") (param $channel i32) (result i32)
    (i32.add (i32.const {INPUT_BASE}) (i32.mul (local.get $channel) (i32.const {CHANNEL_STRIDE}))))
  (func (export "aa_get_output") (param $channel i32) (result i32)
    (i32.add (i32.const {OUTPUT_BASE}) (i32.mul (local.get $channel) (i32.const {CHANNEL_STRIDE}))))
  (func (export "aa_block_size") (result i32) (i32.const 256))
  (func (export "aa_set_param_float") (param $node i32) (param $index i32) (param $value f32) (result i32)
    (if (result i32) (i32.or (local.get $node) (local.get $index))
      (then (i32.const 1))
      (else (global.set $gain (local.get $value)) (i32.const 0))))
  (func (export "aa_handle_note_on") (param $note i32) (param $velocity f32)
    (global.set $level (local.get $velocity)))
  (func (export "aa_handle_note_off") (param $note i32) (param $velocity f32)
    (global.set $level (f32.const 0)))
  (func (export "aa_compute") (param $frames i32)
    (local $i i32)
    (local $off i32)
    (block $done
      (loop $next
        (br_if $done (i32.ge_u (local.get $i) (local.get $frames)))
        (local.set $off (i32.shl (local.get $i) (i32.const 2)))
        {body}
        (local.set $i (i32.add (local.get $i) (i32.const 1)))
        (br $next)))))
"#
    )
}

/// Name of the gain module registered for `shape` by [`standard_source`].
pub fn gain_name(shape: ChannelShape) -> String {
    format!("gain_{}x{}", shape.inputs(), shape.outputs())
}

pub const ALL_SHAPES: [ChannelShape; 5] = [
    ChannelShape::ZeroOne,
    ChannelShape::OneOne,
    ChannelShape::OneTwo,
    ChannelShape::TwoTwo,
    ChannelShape::ZeroTwo,
];

/// One module to place in a test source.
pub struct TestModule {
    pub name: String,
    pub inputs: u32,
    pub outputs: u32,
    /// `(file name, contents)` in link order; the last file is the unit.
    pub files: Vec<(String, String)>,
    pub parameters: serde_json::Value,
}

impl TestModule {
    pub fn single(name: &str, inputs: u32, outputs: u32, wat: &str) -> Self {
        Self {
            name: name.to_string(),
            inputs,
            outputs,
            files: vec![(format!("{name}.wat"), wat.to_string())],
            parameters: json!([]),
        }
    }

    pub fn with_parameter(mut self, name: &str, min: f32, max: f32, default: f32) -> Self {
        if let Some(list) = self.parameters.as_array_mut() {
            list.push(json!({
                "node": 0, "index": 0, "name": name,
                "min": min, "max": max, "default": default
            }));
        }
        self
    }
}

/// Write `modules` into a fresh directory laid out as a module source.
pub fn write_source(modules: &[TestModule]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let entries: Vec<_> = modules
        .iter()
        .map(|m| json!({ "name": m.name, "json_url": format!("{}.json", m.name) }))
        .collect();
    let manifest = json!({
        "default": modules.first().map(|m| m.name.clone()),
        "modules": entries,
    });
    fs::write(dir.path().join("modules.json"), manifest.to_string()).unwrap();

    for module in modules {
        let code: Vec<&String> = module.files.iter().map(|(file, _)| file).collect();
        let bundle = json!({
            "wasm_url": code,
            "gui": { "name": module.name, "width": 200, "height": 100 },
            "info": { "name": module.name, "inputs": module.inputs, "outputs": module.outputs },
            "parameters": module.parameters,
        });
        fs::write(
            dir.path().join(format!("{}.json", module.name)),
            bundle.to_string(),
        )
        .unwrap();
        for (file, contents) in &module.files {
            fs::write(dir.path().join(file), contents).unwrap();
        }
    }
    dir
}

/// A source with `sine`, one gain module per shape and the failure fixtures.
pub fn standard_source() -> TempDir {
    let mut modules = vec![
        TestModule::single("sine", 0, 1, SINE_WAT).with_parameter("freq", 20.0, 2000.0, 440.0),
        TestModule::single("trap", 0, 1, TRAP_WAT),
        TestModule::single("runaway", 0, 1, RUNAWAY_WAT),
        TestModule::single("busy_notes", 0, 1, BUSY_NOTE_WAT),
        TestModule::single("no_compute", 0, 1, NO_COMPUTE_WAT),
        TestModule {
            name: "scaled".into(),
            inputs: 0,
            outputs: 1,
            files: vec![
                ("dsp.wat".into(), DSP_WAT.into()),
                ("scaled.wat".into(), SCALED_WAT.into()),
            ],
            parameters: json!([]),
        },
    ];
    for shape in ALL_SHAPES {
        let (i, o) = (shape.inputs(), shape.outputs());
        modules.push(
            TestModule::single(&gain_name(shape), i, o, &gain_wat(i, o))
                .with_parameter("gain", 0.0, 2.0, 1.0),
        );
    }
    write_source(&modules)
}

pub fn location(dir: &TempDir) -> String {
    dir.path().to_string_lossy().into_owned()
}

/// Serve the files of `dir` over plain HTTP on a loopback port and return the base URL.
/// The server lives until the test process exits.
pub fn serve_http(dir: &TempDir) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let root = dir.path().to_path_buf();
    std::thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            serve_file(&root, stream);
        }
    });
    base
}

fn serve_file(root: &Path, mut stream: TcpStream) {
    let Ok(reader) = stream.try_clone() else { return };
    let mut reader = BufReader::new(reader);

    let mut request = String::new();
    if reader.read_line(&mut request).is_err() {
        return;
    }
    let mut header = String::new();
    while reader.read_line(&mut header).is_ok_and(|n| n > 2) {
        header.clear();
    }

    let path = request.split_whitespace().nth(1).unwrap_or("/");
    let file: PathBuf = root.join(path.trim_start_matches('/'));
    let (status, body) = match fs::read(&file) {
        Ok(body) => ("200 OK", body),
        Err(_) => ("404 Not Found", Vec::new()),
    };
    let head = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&body);
}

/// A loopback URL nothing listens on.
pub fn dead_http_source() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    base
}

#[derive(Debug, PartialEq)]
pub struct ShapeMismatch {
    pub expected: Option<ChannelShape>,
    pub actual: ChannelShape,
}

/// Render only when `buffers` match the instance's channel shape.
pub fn checked_render<S: Sandbox>(
    instance: &ModuleInstance<S>,
    frames: usize,
    buffers: RenderBuffers<'_>,
) -> Result<(), ShapeMismatch> {
    let expected = instance.channel_shape();
    if !instance.is_initialized() || expected != Some(buffers.shape()) {
        return Err(ShapeMismatch {
            expected,
            actual: buffers.shape(),
        });
    }
    instance.render(frames, buffers);
    Ok(())
}

/// Frames at which the signal crosses zero going upwards.
pub fn upward_crossings(samples: &[f32]) -> usize {
    samples
        .windows(2)
        .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
        .count()
}
