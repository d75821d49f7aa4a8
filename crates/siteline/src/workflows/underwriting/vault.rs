use super::domain::{RecordId, UnderwritingReport};

/// Persistence boundary for finalized decisions. The compute core never calls
/// this; the orchestrator writes exactly once, after the verdict is final.
pub trait DecisionVault: Send + Sync {
    fn save_record(&self, report: &UnderwritingReport) -> Result<RecordId, VaultError>;
    fn fetch_record(&self, id: &RecordId) -> Result<Option<UnderwritingReport>, VaultError>;
}

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("vault unavailable: {0}")]
    Unavailable(String),
}
