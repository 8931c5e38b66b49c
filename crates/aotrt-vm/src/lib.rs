//! # aotrt-vm
//!
//! The runtime services ahead-of-time compiled code links against.
//!
//! ## Subsystems
//!
//! - **State** (`state`): the [`Runtime`] value tying the type table, heap and monitors together.
//! - **Memory** (`memory/`): zero-filled object and array allocation, cloning and block bookkeeping.
//! - **Intrinsics** (`intrinsics/`): object, array and threading entry points.
//! - **Dispatch** (`dispatch`): interface calls through the IMT and virtual calls through the vtable.
//! - **Casting** (`casting`): `isinst`, `castclass` and assignability.
//! - **Sync** (`sync/`): re-entrant per-object monitors.
pub mod casting;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod intrinsics;
pub mod memory;
pub mod metrics;
pub mod state;
pub mod sync;

pub use config::RuntimeConfig;
pub use error::{AllocationError, SyncError, VmError};
pub use memory::HeapManager;
pub use metrics::{MetricsSnapshot, RuntimeMetrics};
pub use state::Runtime;
