//! aa-host-core: a host bridge that loads sandboxed audio modules and drives them
//! from a real-time audio callback.
//!
//! The crate is layered leaves-first:
//! - [`node`]: parameter addressing (`node`, `index`) and per-instance parameter state.
//! - [`catalog`]: module discovery (`Catalog` trait, local and HTTP implementations).
//! - [`sandbox`]: the execution-sandbox seam (`load` / `call` / `free`).
//! - [`runtime`]: the Wasmtime-backed sandbox that actually runs module code.
//! - [`events`]: note/parameter commands staged from the control thread.
//! - [`render`]: the five fixed channel shapes and their buffer views.
//! - [`instance`]: one loaded module, its lifecycle and its render entry point.
//! - [`introspect`]: catalog listing and GUI description as JSON text.
//! - `ffi`: the C ABI consumed by native hosts.
//!
//! Threading model (by convention, not enforced by the type system):
//! - A *control* thread creates, initializes, stages events and destroys.
//! - Exactly one *audio* thread per instance calls the render entry points.
//!
//! The render path never blocks: it only `try_lock`s its own state and degrades to
//! silence when anything goes wrong.

pub mod abi;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod ffi;
pub mod instance;
pub mod introspect;
pub mod loader;
pub mod logging;
pub mod node;
pub mod render;
pub mod runtime;
pub mod sandbox;

pub use catalog::{
    Catalog, FsCatalog, HttpCatalog, ModuleBundle, ModuleCode, ModuleDescriptor, ParamRange,
    ParameterDescriptor,
};
pub use config::HostConfig;
pub use error::{CatalogError, CreationError, HostError};
pub use events::{NoteEvent, NoteKind};
pub use instance::ModuleInstance;
pub use introspect::{GuiDescription, GuiParameter};
pub use node::ParamAddress;
pub use render::{ChannelShape, RenderBuffers};
pub use runtime::WasmSandbox;
pub use sandbox::{Call, Sandbox, SandboxError};
