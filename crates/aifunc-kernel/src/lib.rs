//! aifunc kernel
//!
//! Leaf types shared by every crate in the workspace. Everything here is
//! network-free; the foundation crate talks to models only through the
//! [`llm::LLMProvider`] contract defined below.

// error module
pub mod error;
pub use error::{AiFunctionError, AiFunctionResult, ErrorKind};

// schema module
pub mod schema;
pub use schema::{SchemaError, SchemaInput, SchemaKind, SchemaNode, compile};

// repair trace records
pub mod trace;
pub use trace::{RepairAttempt, RepairStage, RepairTrace};

// args module
pub mod args;
pub use args::{NormalizedArgs, normalize};

// llm contract
pub mod llm;

// Global configuration system
#[cfg(feature = "config")]
pub mod config;
