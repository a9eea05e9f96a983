//! Post-sync analysis hook
//!
//! Called with the number of freshly synced messages so a downstream
//! component can classify or summarize them. Failures never fail a sync.

use async_trait::async_trait;
use domain::AccountId;
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait MailAnalysisPort: Send + Sync {
    async fn analyze_new(&self, account_id: &AccountId, count: usize)
    -> Result<(), ApplicationError>;
}

/// Analysis hook that does nothing, for deployments without an analyzer
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMailAnalysis;

#[async_trait]
impl MailAnalysisPort for NoOpMailAnalysis {
    async fn analyze_new(
        &self,
        _account_id: &AccountId,
        _count: usize,
    ) -> Result<(), ApplicationError> {
        Ok(())
    }
}
