//! Conversation log trait definition.
//!
//! The persistence layer receives every completed exchange after dispatch
//! has produced its response. Storage schemas are owned by the implementor;
//! the core only hands over a `ConversationTurn`.

use concierge_types::dispatch::ConversationTurn;
use concierge_types::error::RepositoryError;

/// Sink for completed conversation turns.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
/// Failures are logged by the dispatcher and never change the dispatch result.
pub trait ConversationLog: Send + Sync {
    fn record_turn(
        &self,
        turn: &ConversationTurn,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

/// Discards every turn. Default for deployments without persistence.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopConversationLog;

impl ConversationLog for NoopConversationLog {
    async fn record_turn(&self, _turn: &ConversationTurn) -> Result<(), RepositoryError> {
        Ok(())
    }
}
