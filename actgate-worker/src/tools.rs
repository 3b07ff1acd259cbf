//! Tool client connection manager.
//!
//! Implements: REQ-OPS-002/§9.2 (Resource Lifecycle)
//!
//! Owns the long-lived tool client connections activities use
//! (databases, agent tool servers). Cleanup runs exactly once no
//! matter how many exit paths race to trigger it, and always attempts
//! every client even when an earlier close fails.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use actgate_core::error::ActGateError;

/// A long-lived client connection owned by the worker.
#[async_trait]
pub trait ToolClient: Send + Sync {
    /// Connection name, unique within the manager.
    fn name(&self) -> &str;

    /// Release the underlying connection.
    ///
    /// # Errors
    ///
    /// Close failures are reported but never re-attempted.
    async fn close(&self) -> Result<(), ActGateError>;
}

/// Registry of tool clients with exactly-once teardown.
#[derive(Default)]
pub struct ToolClientManager {
    clients: DashMap<String, Arc<dyn ToolClient>>,
    cleaned_up: AtomicBool,
}

impl ToolClientManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client. Replaces any earlier client with the same
    /// name and returns it so callers can close it if needed.
    pub fn register(&self, client: Arc<dyn ToolClient>) -> Option<Arc<dyn ToolClient>> {
        self.clients.insert(client.name().to_string(), client)
    }

    /// Look up a client by name. Returns `None` after cleanup.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolClient>> {
        if self.cleaned_up.load(Ordering::SeqCst) {
            return None;
        }
        self.clients.get(name).map(|entry| Arc::clone(&entry))
    }

    /// Number of registered clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Close every registered client.
    ///
    /// Idempotent: only the first call performs any work, later calls
    /// return immediately. Every client is attempted even when earlier
    /// closes fail; failures are logged and folded into the returned
    /// error.
    ///
    /// # Errors
    ///
    /// Returns `ActGateError::Cleanup` naming the clients that failed
    /// to close.
    pub async fn cleanup(&self) -> Result<(), ActGateError> {
        if self.cleaned_up.swap(true, Ordering::SeqCst) {
            debug!("Tool client cleanup already performed, skipping");
            return Ok(());
        }

        let clients: Vec<Arc<dyn ToolClient>> = self
            .clients
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        self.clients.clear();

        info!(count = clients.len(), "Closing tool client connections");

        let mut failed: Vec<String> = Vec::new();
        for client in clients {
            if let Err(e) = client.close().await {
                warn!(client = client.name(), error = %e, "Tool client close failed");
                failed.push(client.name().to_string());
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(ActGateError::Cleanup {
                reason: format!("failed to close tool clients: {}", failed.join(", ")),
            })
        }
    }

    /// Whether cleanup has already run.
    #[must_use]
    pub fn is_cleaned_up(&self) -> bool {
        self.cleaned_up.load(Ordering::SeqCst)
    }
}
