//! Seams between the bulk workflows and the dispatch layer

use async_trait::async_trait;
use crate::error::Result;
use messenger_types::SendReceipt;

/// Outbound message capability used by the bulk workflows.
///
/// Kept as a trait so the orchestrator can run against a recording sender in tests.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// True while a live session can carry messages
    async fn is_connected(&self) -> bool;

    /// Send one text message; failures are already logged by the implementation
    async fn send(&self, address: &str, body: &str) -> Result<SendReceipt>;
}
