// ── API seam ──
//
// The controller and the sync loop only need six vendor operations. Keeping
// them behind a trait lets the state machine run against a scripted fake
// in tests while production uses `TedeeClient`.

use std::future::Future;

use tedly_api::{LockOperation, LockRecord, LockSync, TedeeClient};

use crate::error::CoreError;

/// Vendor operations used by [`Bridge`](crate::Bridge) and
/// [`LockController`](crate::LockController).
pub trait LockApi: Send + Sync + 'static {
    fn list_locks(&self) -> impl Future<Output = Result<Vec<LockRecord>, CoreError>> + Send;

    fn sync_all(&self) -> impl Future<Output = Result<Vec<LockSync>, CoreError>> + Send;

    fn sync_one(&self, id: u64) -> impl Future<Output = Result<LockSync, CoreError>> + Send;

    /// Run a command and wait for the vendor to report completion.
    fn execute(
        &self,
        id: u64,
        operation: LockOperation,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}

impl LockApi for TedeeClient {
    async fn list_locks(&self) -> Result<Vec<LockRecord>, CoreError> {
        Ok(TedeeClient::list_locks(self).await?)
    }

    async fn sync_all(&self) -> Result<Vec<LockSync>, CoreError> {
        Ok(TedeeClient::sync_all(self).await?)
    }

    async fn sync_one(&self, id: u64) -> Result<LockSync, CoreError> {
        Ok(TedeeClient::sync_one(self, id).await?)
    }

    async fn execute(&self, id: u64, operation: LockOperation) -> Result<(), CoreError> {
        match operation {
            LockOperation::Open => self.open(id).await?,
            LockOperation::Close => self.close(id).await?,
            LockOperation::PullSpring => self.pull_spring(id).await?,
        }
        Ok(())
    }
}
