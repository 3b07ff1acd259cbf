//! Built-in activities.
//!
//! The baseline activity set every worker ships with. File writes are
//! registered governed because they mutate the host; reads and echo
//! are plain.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use actgate_core::error::{ActGateError, ActivityError};
use actgate_core::instrument::InstrumentTarget;

use crate::activity::{Activity, ActivityRegistry, InvocationContext};

/// Returns its arguments unchanged. Useful as a liveness probe for
/// the whole dispatch path.
pub struct Echo;

impl Activity for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn run(&self, _ctx: &InvocationContext, args: Value) -> Result<Value, ActivityError> {
        Ok(args)
    }
}

#[derive(Deserialize)]
struct ReadFileArgs {
    path: String,
}

/// Reads a UTF-8 text file from the worker host.
pub struct ReadTextFile;

impl Activity for ReadTextFile {
    fn name(&self) -> &str {
        "read_text_file"
    }

    fn run(&self, ctx: &InvocationContext, args: Value) -> Result<Value, ActivityError> {
        let args: ReadFileArgs = serde_json::from_value(args)
            .map_err(|e| ActivityError::execution(format!("invalid arguments: {e}")))?;

        let contents = ctx
            .instrumentation
            .observe_result(InstrumentTarget::FileIo, "read_text_file", || {
                std::fs::read_to_string(&args.path)
            })
            .map_err(|e| ActivityError::execution(format!("read '{}': {e}", args.path)))?;

        Ok(Value::String(contents))
    }
}

#[derive(Deserialize)]
struct WriteFileArgs {
    path: String,
    contents: String,
}

/// Writes a UTF-8 text file on the worker host. Governed: writes
/// mutate the host, so each one needs a governance verdict.
pub struct WriteTextFile;

impl Activity for WriteTextFile {
    fn name(&self) -> &str {
        "write_text_file"
    }

    fn run(&self, ctx: &InvocationContext, args: Value) -> Result<Value, ActivityError> {
        let args: WriteFileArgs = serde_json::from_value(args)
            .map_err(|e| ActivityError::execution(format!("invalid arguments: {e}")))?;

        ctx.instrumentation
            .observe_result(InstrumentTarget::FileIo, "write_text_file", || {
                std::fs::write(&args.path, &args.contents)
            })
            .map_err(|e| ActivityError::execution(format!("write '{}': {e}", args.path)))?;

        Ok(serde_json::json!({ "bytes_written": args.contents.len() }))
    }
}

/// Register the built-in activity set.
///
/// # Errors
///
/// Returns `ActGateError::DuplicateActivity` if a caller already
/// registered one of the built-in names.
pub fn register_builtin(registry: &mut ActivityRegistry) -> Result<(), ActGateError> {
    registry.register_plain(Arc::new(Echo))?;
    registry.register_plain(Arc::new(ReadTextFile))?;
    registry.register_governed(Arc::new(WriteTextFile))?;
    Ok(())
}
