//! aifunc foundation
//!
//! Everything between a caller's function description and a validated
//! return value: prompt assembly, model invocation through the kernel's
//! provider contract, and the completion repair pipeline that turns raw model
//! text into a schema-conformant [`serde_json::Value`].

// coerce module - schema conformance
pub mod coerce;

// repair module - completion repair pipeline
pub mod repair;

// prompt module
pub mod prompt;

// llm module
pub mod llm;

// config module
pub mod config;

// function module - AiFunction client
pub mod function;

pub use config::AiFunctionConfig;
pub use function::{AiFunction, AiFunctionOptions, CallOutcome, InvocationRecord};
pub use repair::{RepairOptions, RepairOrder, RepairPipeline, Resolved, SanitizeMode};

pub use aifunc_kernel::{
    AiFunctionError, AiFunctionResult, ErrorKind, RepairAttempt, RepairStage, RepairTrace,
    SchemaInput, SchemaNode,
};
