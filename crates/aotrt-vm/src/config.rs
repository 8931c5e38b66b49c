//! Runtime configuration.
//!
//! ## Environment Variables
//!
//! - `AOTRT_INTERFACE_ASSIGNABILITY`: `"1"` or `"true"` makes
//!   [`Runtime::is_assignable_from`](crate::Runtime::is_assignable_from)
//!   accept implemented interfaces (default: base chain only)
//! - `AOTRT_MAX_OBJECT_SIZE`: largest single allocation in bytes
//! - `AOTRT_METRICS`: `"0"` or `"false"` disables metrics collection
use std::env;
use tracing::warn;

pub const ENV_INTERFACE_ASSIGNABILITY: &str = "AOTRT_INTERFACE_ASSIGNABILITY";
pub const ENV_MAX_OBJECT_SIZE: &str = "AOTRT_MAX_OBJECT_SIZE";
pub const ENV_METRICS: &str = "AOTRT_METRICS";

/// Largest size `std::alloc::Layout` accepts for pointer-aligned blocks.
pub const DEFAULT_MAX_OBJECT_SIZE: usize = isize::MAX as usize - (std::mem::size_of::<usize>() - 1);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub interface_assignability: bool,
    pub max_object_size: usize,
    pub metrics: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            interface_assignability: false,
            max_object_size: DEFAULT_MAX_OBJECT_SIZE,
            metrics: true,
        }
    }
}

fn parse_flag(name: &str, value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            warn!("Ignoring {}={:?}: expected a boolean", name, other);
            None
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a configuration from an arbitrary variable source, falling
    /// back to the defaults for missing or malformed values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(flag) = lookup(ENV_INTERFACE_ASSIGNABILITY)
            .and_then(|v| parse_flag(ENV_INTERFACE_ASSIGNABILITY, &v))
        {
            config.interface_assignability = flag;
        }

        if let Some(raw) = lookup(ENV_MAX_OBJECT_SIZE) {
            match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => config.max_object_size = size.min(DEFAULT_MAX_OBJECT_SIZE),
                _ => warn!("Ignoring {}={:?}: expected a positive byte count", ENV_MAX_OBJECT_SIZE, raw),
            }
        }

        if let Some(flag) = lookup(ENV_METRICS).and_then(|v| parse_flag(ENV_METRICS, &v)) {
            config.metrics = flag;
        }

        config
    }
}
