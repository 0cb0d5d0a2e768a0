//! File-backed status store
//!
//! The system of record for deployment status and image/container
//! metadata. One JSON document keyed by deployment id, rewritten
//! atomically under a single-writer lock.

use std::collections::BTreeMap;

use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::WorkerError;
use crate::filesys::file::JsonFile;
use crate::store::record::{DeploymentRecord, DeploymentStatus};

/// Persistent per-deployment record store
pub struct StatusStore {
    file: JsonFile,
    // Serializes every read-modify-write of the backing file
    lock: Mutex<()>,
}

type RecordMap = BTreeMap<String, DeploymentRecord>;

impl StatusStore {
    pub fn new(file: JsonFile) -> Self {
        Self {
            file,
            lock: Mutex::new(()),
        }
    }

    /// Insert or replace a record.
    ///
    /// `created_at` of an existing row is preserved; everything else is
    /// taken from the new record and `updated_at` is refreshed.
    pub async fn upsert(&self, mut record: DeploymentRecord) -> Result<(), WorkerError> {
        let _guard = self.lock.lock().await;

        let mut records = self.load().await?;
        if let Some(existing) = records.get(&record.deployment_id) {
            record.created_at = existing.created_at;
        }
        record.updated_at = chrono::Utc::now();

        debug!(deployment_id = %record.deployment_id, status = %record.status, "Upserting record");
        records.insert(record.deployment_id.clone(), record);
        self.save(&records).await
    }

    /// Read a record by deployment id; `None` when absent
    pub async fn read(&self, deployment_id: &str) -> Result<Option<DeploymentRecord>, WorkerError> {
        let _guard = self.lock.lock().await;
        let records = self.load().await?;
        Ok(records.get(deployment_id).cloned())
    }

    /// Advance a record's status.
    ///
    /// Fails with a state error when the record is missing or the
    /// transition is not allowed by the status machine.
    pub async fn update_status(
        &self,
        deployment_id: &str,
        status: DeploymentStatus,
    ) -> Result<(), WorkerError> {
        self.mutate(deployment_id, |record| {
            record.status = status;
            Ok(())
        })
        .await
    }

    /// Mark a deployment running: status transition plus the last-run
    /// descriptor and the leased host port, as one write.
    ///
    /// The container port (`port`) set at clone time is left untouched;
    /// only the host-side lease is recorded here.
    pub async fn record_run(
        &self,
        deployment_id: &str,
        last_run_descriptor: &str,
        host_port: Option<u16>,
    ) -> Result<(), WorkerError> {
        self.mutate(deployment_id, |record| {
            record.status = DeploymentStatus::Running;
            record.container_name = Some(last_run_descriptor.to_string());
            record.host_port = host_port;
            Ok(())
        })
        .await
    }

    /// Remove a record entirely. Removing an absent id is not an error.
    pub async fn delete(&self, deployment_id: &str) -> Result<(), WorkerError> {
        let _guard = self.lock.lock().await;

        let mut records = self.load().await?;
        if records.remove(deployment_id).is_some() {
            debug!(deployment_id, "Deleted record");
            self.save(&records).await?;
        }
        Ok(())
    }

    async fn mutate<F>(&self, deployment_id: &str, apply: F) -> Result<(), WorkerError>
    where
        F: FnOnce(&mut DeploymentRecord) -> Result<(), WorkerError>,
    {
        let _guard = self.lock.lock().await;

        let mut records = self.load().await?;
        let record = records.get_mut(deployment_id).ok_or_else(|| {
            WorkerError::StateError(format!("no record for deployment {}", deployment_id))
        })?;

        let previous = record.status;
        apply(record)?;

        if record.status != previous && !previous.can_advance_to(record.status) {
            return Err(WorkerError::StateError(format!(
                "invalid status transition {} -> {} for deployment {}",
                previous, record.status, deployment_id
            )));
        }

        record.updated_at = chrono::Utc::now();
        self.save(&records).await
    }

    async fn load(&self) -> Result<RecordMap, WorkerError> {
        if !self.file.exists().await {
            return Ok(RecordMap::new());
        }
        self.file.read().await
    }

    async fn save(&self, records: &RecordMap) -> Result<(), WorkerError> {
        self.file.write(records).await
    }
}
