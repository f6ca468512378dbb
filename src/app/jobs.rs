use crate::core::awb::AwbLifecycleManager;
use crate::core::pudo_sync::LocationSyncEngine;
use crate::domain::model::{ReconcileStats, SyncStats};
use crate::domain::ports::{OrderRepository, PudoRepository};
use crate::utils::error::{Result, ShipError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Batch jobs an external scheduler may trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledJob {
    ReconcileStatuses,
    SyncPudos,
}

impl FromStr for ScheduledJob {
    type Err = ShipError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "reconcile" | "reconcile_statuses" | "sync_status" => Ok(ScheduledJob::ReconcileStatuses),
            "sync_pudos" | "pudo" | "sync_pudo" => Ok(ScheduledJob::SyncPudos),
            other => Err(ShipError::InvalidConfigValueError {
                field: "job".to_string(),
                value: other.to_string(),
                reason: "Expected 'reconcile-statuses' or 'sync-pudos'".to_string(),
            }),
        }
    }
}

impl fmt::Display for ScheduledJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduledJob::ReconcileStatuses => f.write_str("reconcile_statuses"),
            ScheduledJob::SyncPudos => f.write_str("sync_pudos"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum JobReport {
    ReconcileStatuses(ReconcileStats),
    SyncPudos(SyncStats),
}

/// Token-guarded entry point for the scheduled jobs.
pub struct ScheduledJobs<R: OrderRepository + PudoRepository> {
    token: String,
    awb: Arc<AwbLifecycleManager<R>>,
    sync: Arc<LocationSyncEngine<R>>,
}

impl<R: OrderRepository + PudoRepository> ScheduledJobs<R> {
    pub fn new(
        token: impl Into<String>,
        awb: Arc<AwbLifecycleManager<R>>,
        sync: Arc<LocationSyncEngine<R>>,
    ) -> Self {
        Self {
            token: token.into(),
            awb,
            sync,
        }
    }

    pub async fn run(&self, job: ScheduledJob, provided_token: &str) -> Result<JobReport> {
        self.authorize(provided_token)?;
        tracing::info!("🚀 Running scheduled job {}", job);

        match job {
            ScheduledJob::ReconcileStatuses => {
                Ok(JobReport::ReconcileStatuses(self.awb.reconcile_statuses().await?))
            }
            ScheduledJob::SyncPudos => Ok(JobReport::SyncPudos(self.sync.sync().await?)),
        }
    }

    fn authorize(&self, provided: &str) -> Result<()> {
        if self.token.is_empty() {
            tracing::warn!("⚠️ Scheduled job refused: no cron token configured");
            return Err(ShipError::Forbidden {
                message: "Cron token is not configured".to_string(),
            });
        }
        if !constant_time_eq(self.token.as_bytes(), provided.as_bytes()) {
            tracing::warn!("⚠️ Scheduled job refused: invalid token");
            return Err(ShipError::Forbidden {
                message: "Invalid cron token".to_string(),
            });
        }
        Ok(())
    }
}

/// Compares without an early exit on the first differing byte.
fn constant_time_eq(expected: &[u8], provided: &[u8]) -> bool {
    if expected.len() != provided.len() {
        return false;
    }
    expected
        .iter()
        .zip(provided)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"token", b"token"));
        assert!(!constant_time_eq(b"token", b"tokem"));
        assert!(!constant_time_eq(b"token", b"token2"));
        assert!(!constant_time_eq(b"token", b""));
    }

    #[test]
    fn test_parse_job_names() {
        assert_eq!(
            "reconcile-statuses".parse::<ScheduledJob>().unwrap(),
            ScheduledJob::ReconcileStatuses
        );
        assert_eq!("sync-pudos".parse::<ScheduledJob>().unwrap(), ScheduledJob::SyncPudos);
        assert!("cleanup".parse::<ScheduledJob>().is_err());
    }

    #[test]
    fn test_report_serializes_with_job_tag() {
        let report = JobReport::SyncPudos(SyncStats {
            processed: 3,
            deactivated: 1,
        });
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["job"], "sync_pudos");
        assert_eq!(value["processed"], 3);
    }
}
