use async_trait::async_trait;

use crate::error::CaseError;
use crate::http::client::Transport;

use super::context::SharedContext;
use super::outcome::Checked;

/// One named behavioural check against the system under test.
///
/// `execute` may read and write the shared context. Returning an error
/// never aborts the run; the orchestrator records it as a failing outcome.
/// Cases that create server-side entities are not idempotent and should
/// draw identifiers from generated suite variables.
#[async_trait]
pub trait TestCase: Send + Sync {
    fn name(&self) -> &str;

    /// Context keys that must be set before this case may run. When one is
    /// absent the case is skipped with a prerequisite-missing outcome and
    /// `execute` is never called.
    fn requires(&self) -> &[String] {
        &[]
    }

    async fn execute(
        &self,
        ctx: &mut SharedContext,
        transport: &dyn Transport,
    ) -> Result<Checked, CaseError>;
}
