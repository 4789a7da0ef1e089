// libs/practitioner-cell/src/services/directory.rs
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::ClinicStore;

use crate::models::{Branch, Practitioner, ScheduleError};

/// Read-only access to the clinic directory (branches, practitioners).
/// The records are owned by the hosted store; this cell never writes
/// them.
pub struct DirectoryService {
    store: ClinicStore,
}

impl DirectoryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: ClinicStore::new(config),
        }
    }

    pub async fn list_branches(&self) -> Result<Vec<Branch>, ScheduleError> {
        debug!("Listing branches");

        let result: Vec<Value> = self
            .store
            .request(Method::GET, "/rest/v1/branches?order=code.asc", None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        let branches: Vec<Branch> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Branch>, _>>()
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse branches: {}", e)))?;

        Ok(branches)
    }

    pub async fn get_branch(&self, branch_id: Uuid) -> Result<Branch, ScheduleError> {
        debug!("Fetching branch {}", branch_id);

        let path = format!("/rest/v1/branches?id=eq.{}", branch_id);
        let result: Vec<Value> = self
            .store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        let Some(row) = result.into_iter().next() else {
            return Err(ScheduleError::BranchNotFound);
        };

        serde_json::from_value(row)
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse branch: {}", e)))
    }

    /// Active practitioners attached to a branch.
    pub async fn list_branch_practitioners(
        &self,
        branch_id: Uuid,
    ) -> Result<Vec<Practitioner>, ScheduleError> {
        debug!("Listing practitioners for branch {}", branch_id);

        let path = format!(
            "/rest/v1/practitioners?branch_id=eq.{}&is_active=eq.true&order=full_name.asc",
            branch_id
        );
        let result: Vec<Value> = self
            .store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        let practitioners: Vec<Practitioner> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Practitioner>, _>>()
            .map_err(|e| {
                ScheduleError::DatabaseError(format!("Failed to parse practitioners: {}", e))
            })?;

        Ok(practitioners)
    }

    pub async fn get_practitioner(
        &self,
        practitioner_id: Uuid,
    ) -> Result<Practitioner, ScheduleError> {
        debug!("Fetching practitioner {}", practitioner_id);

        let path = format!("/rest/v1/practitioners?id=eq.{}", practitioner_id);
        let result: Vec<Value> = self
            .store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        let Some(row) = result.into_iter().next() else {
            return Err(ScheduleError::PractitionerNotFound);
        };

        serde_json::from_value(row).map_err(|e| {
            ScheduleError::DatabaseError(format!("Failed to parse practitioner: {}", e))
        })
    }
}
