//! Operator health for liveness and readiness probes
//!
//! Four fixed components are tracked: the metrics source, report
//! collection, packaging and the report storage. The operator is ready once
//! its report directories are prepared, for as long as storage and the
//! metrics source are usable. Collection or packaging trouble only degrades
//! health; the next cycle retries it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Parts of the operator with their own health
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Component {
    Prometheus,
    Collector,
    Packager,
    Storage,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::Prometheus,
        Component::Collector,
        Component::Packager,
        Component::Storage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Prometheus => "prometheus",
            Component::Collector => "collector",
            Component::Packager => "packager",
            Component::Storage => "storage",
        }
    }

    /// Whether this component failing makes the operator unready
    fn gates_readiness(&self) -> bool {
        matches!(self, Component::Prometheus | Component::Storage)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered from best to worst, so the overall status is the maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// The last attempt failed; the next cycle retries it
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// When the component entered its current status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            since: Some(Utc::now()),
        }
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthResponse {
    pub fn component(&self, component: Component) -> Option<&ComponentHealth> {
        self.components.get(component.as_str())
    }
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

#[derive(Debug)]
struct State {
    components: BTreeMap<Component, ComponentHealth>,
    directories_prepared: bool,
}

/// Shared health state; clones see the same components
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    state: Arc<RwLock<State>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    /// Every component starts healthy; the operator is not ready until its
    /// directories are prepared
    pub fn new() -> Self {
        let components = Component::ALL
            .into_iter()
            .map(|c| (c, ComponentHealth::new(ComponentStatus::Healthy, None)))
            .collect();
        Self {
            state: Arc::new(RwLock::new(State {
                components,
                directories_prepared: false,
            })),
        }
    }

    async fn update(&self, component: Component, status: ComponentStatus, message: Option<String>) {
        let mut state = self.state.write().await;
        let Some(current) = state.components.get_mut(&component) else {
            return;
        };
        if current.status != status {
            match status {
                ComponentStatus::Healthy => info!(component = %component, "Component recovered"),
                _ => warn!(
                    component = %component,
                    status = ?status,
                    message = message.as_deref().unwrap_or_default(),
                    "Component health changed"
                ),
            }
            *current = ComponentHealth::new(status, message);
        } else {
            current.message = message;
        }
    }

    pub async fn set_healthy(&self, component: Component) {
        self.update(component, ComponentStatus::Healthy, None).await;
    }

    pub async fn set_degraded(&self, component: Component, message: impl Into<String>) {
        self.update(component, ComponentStatus::Degraded, Some(message.into()))
            .await;
    }

    pub async fn set_unhealthy(&self, component: Component, message: impl Into<String>) {
        self.update(component, ComponentStatus::Unhealthy, Some(message.into()))
            .await;
    }

    /// Record whether the report, staging and upload directories exist
    pub async fn set_directories_prepared(&self, prepared: bool) {
        self.state.write().await.directories_prepared = prepared;
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;
        let status = state
            .components
            .values()
            .map(|h| h.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);
        let components = state
            .components
            .iter()
            .map(|(c, h)| (c.as_str().to_string(), h.clone()))
            .collect();
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;
        let mut reasons = Vec::new();
        if !state.directories_prepared {
            reasons.push("report directories not prepared".to_string());
        }
        for (component, health) in &state.components {
            if component.gates_readiness() && health.status == ComponentStatus::Unhealthy {
                reasons.push(match &health.message {
                    Some(message) => format!("{component}: {message}"),
                    None => format!("{component} unhealthy"),
                });
            }
        }
        ReadinessResponse {
            ready: reasons.is_empty(),
            reasons,
        }
    }
}
