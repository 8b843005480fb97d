//! Turns the code files of a bundle into compiled Wasmtime modules.
//!
//! A bundle may ship binary `.wasm` or `.wat` text; the file name is not trusted, the
//! bytes are sniffed. Text is assembled with the `wat` crate before compilation.

use crate::catalog::ModuleCode;
use std::borrow::Cow;
use wasmtime::{Engine, Module};

const WASM_MAGIC: &[u8] = b"\0asm";
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("`{file}` is neither a wasm binary nor wat text")]
    UnrecognizedFormat { file: String },

    #[error("`{file}` is not valid wat: {reason}")]
    InvalidText { file: String, reason: wat::Error },

    #[error("`{file}` failed to compile: {reason}")]
    CompileFailed {
        file: String,
        reason: wasmtime::Error,
    },
}

/// Encoding of one code file.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CodeFormat {
    Binary,
    Text,
}

impl CodeFormat {
    /// Sniff `bytes`. Text may start with a UTF-8 BOM and whitespace before its first `(`.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(WASM_MAGIC) {
            return Some(CodeFormat::Binary);
        }
        let text = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        text.trim_ascii_start()
            .starts_with(b"(")
            .then_some(CodeFormat::Text)
    }
}

/// Binary wasm for `code`, borrowed when it already is binary.
pub fn wasm_bytes(code: &ModuleCode) -> Result<Cow<'_, [u8]>, LoaderError> {
    match CodeFormat::detect(&code.bytes) {
        Some(CodeFormat::Binary) => Ok(Cow::Borrowed(code.bytes.as_slice())),
        Some(CodeFormat::Text) => wat::parse_bytes(&code.bytes)
            .map(|wasm| Cow::Owned(wasm.into_owned()))
            .map_err(|reason| LoaderError::InvalidText {
                file: code.name.clone(),
                reason,
            }),
        None => Err(LoaderError::UnrecognizedFormat {
            file: code.name.clone(),
        }),
    }
}

pub fn compile(engine: &Engine, code: &ModuleCode) -> Result<Module, LoaderError> {
    let wasm = wasm_bytes(code)?;
    tracing::trace!(file = %code.name, len = wasm.len(), "compiling");
    Module::new(engine, &*wasm).map_err(|reason| LoaderError::CompileFailed {
        file: code.name.clone(),
        reason,
    })
}
