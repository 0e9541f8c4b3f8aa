//! Readiness reporting for the donation store

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info};

const DATABASE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub version: &'static str,
    /// `postgres` or `in-memory`
    pub store: &'static str,
    pub checks: BTreeMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComponentState {
    Up,
    Down,
}

impl HealthStatus {
    fn new(store: &'static str) -> Self {
        Self {
            status: HealthState::Healthy,
            version: env!("CARGO_PKG_VERSION"),
            store,
            checks: BTreeMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Record a component; any `Down` component makes the whole service unhealthy
    fn record(&mut self, name: &str, component: ComponentHealth) {
        if component.status == ComponentState::Down {
            self.status = HealthState::Unhealthy;
        }
        self.checks.insert(name.to_string(), component);
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Healthy
    }
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>, details: Option<String>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }
}

#[derive(Clone)]
pub struct HealthChecker {
    /// `None` when running against the in-memory store
    db_pool: Option<sqlx::PgPool>,
}

impl HealthChecker {
    pub fn new(db_pool: Option<sqlx::PgPool>) -> Self {
        Self { db_pool }
    }

    pub async fn check_health(&self) -> HealthStatus {
        let Some(pool) = &self.db_pool else {
            let mut status = HealthStatus::new("in-memory");
            status.record(
                "database",
                ComponentHealth::up(None, Some("not configured".to_string())),
            );
            return status;
        };

        let mut status = HealthStatus::new("postgres");
        let component = match timeout(DATABASE_CHECK_TIMEOUT, check_database_health(pool)).await {
            Ok(Ok(response_time)) => {
                info!(response_time_ms = response_time as u64, "Database health check passed");
                ComponentHealth::up(Some(response_time), None)
            }
            Ok(Err(e)) => {
                error!(error = %e, "Database health check failed");
                ComponentHealth::down(Some(e.to_string()))
            }
            Err(_) => {
                error!(
                    timeout_secs = DATABASE_CHECK_TIMEOUT.as_secs(),
                    "Database health check timed out"
                );
                ComponentHealth::down(Some("timeout".to_string()))
            }
        };
        status.record("database", component);
        status
    }
}

/// Round-trip time of a trivial query, in milliseconds
pub async fn check_database_health(
    pool: &sqlx::PgPool,
) -> Result<u128, crate::database::error::DatabaseError> {
    let start = Instant::now();
    crate::database::health_check(pool).await?;
    Ok(start.elapsed().as_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn down_component_makes_service_unhealthy() {
        let mut status = HealthStatus::new("postgres");
        status.record("database", ComponentHealth::up(Some(3), None));
        assert!(status.is_healthy());

        status.record("database", ComponentHealth::down(Some("timeout".to_string())));
        assert!(!status.is_healthy());
        assert_eq!(status.checks["database"].status, ComponentState::Down);
    }

    #[tokio::test]
    async fn in_memory_mode_is_healthy() {
        let status = HealthChecker::new(None).check_health().await;
        assert!(status.is_healthy());
        assert_eq!(status.store, "in-memory");

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["checks"]["database"]["status"], "up");
        assert!(json["checks"]["database"].get("response_time_ms").is_none());
    }
}
