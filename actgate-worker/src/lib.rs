//! ActGate activity worker.
//!
//! Hosts registered activities behind a governance gate and runs them
//! on a bounded blocking executor, polling an orchestration engine for
//! task work. Resource lifecycle (tool clients, executor pool, engine
//! connection) is owned by [`bootstrap`] and torn down exactly once on
//! every exit path.
//!
//! # Traceability
//! - Implements: REQ-DSP-001 (Governed Dispatch)
//! - Implements: REQ-WKR-001 (Executor Pool)
//! - Implements: REQ-WKR-002 (Activity Registry)
//! - Implements: REQ-OPS-001 (Worker Lifecycle)
//! - Implements: REQ-OPS-002 (Bootstrap and Cleanup)
//! - Implements: REQ-OPS-003 (Cold-Start Warm-Up)

pub mod activity;
pub mod bootstrap;
pub mod builtin;
pub mod dispatch;
pub mod executor;
pub mod lifecycle;
pub mod runner;
pub mod tools;
pub mod warmup;

pub use activity::{Activity, ActivityRegistry, InvocationContext, RegisteredActivity};
pub use bootstrap::Worker;
pub use dispatch::GovernedDispatcher;
pub use executor::ExecutorPool;
pub use lifecycle::{LifecycleManager, WorkerState};
pub use runner::{LongPollRunner, Runner};
pub use tools::ToolClientManager;
pub use warmup::{WarmUpReport, warm_up};
