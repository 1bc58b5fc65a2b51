//! Boundaries the dispatcher calls through: the cluster and the language model.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::PodStatus;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ClusterError {
    #[error("no pod matching '{service}' in namespace '{namespace}'")]
    NotFound { service: String, namespace: String },
    #[error("{0}")]
    Api(String),
    #[error("cluster request timed out after {0}s")]
    Timeout(u64),
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum AdapterError {
    #[error("language model unreachable: {0}")]
    Unavailable(String),
    #[error("language model rejected the credentials: {0}")]
    Auth(String),
    #[error("language model quota exhausted: {0}")]
    Quota(String),
    #[error("language model request timed out after {0}s")]
    Timeout(u64),
    #[error("language model returned no text")]
    EmptyResponse,
}

/// Read and scale primitives against the orchestration platform.
///
/// `service` is matched as a substring of live pod names in `namespace`; the
/// first pod enumerated by the platform wins. Callers must tolerate an
/// ambiguous name silently picking one pod.
#[async_trait]
pub trait ClusterAdapter: Send + Sync {
    async fn get_status(&self, service: &str, namespace: &str) -> Result<PodStatus, ClusterError>;

    async fn get_logs(
        &self,
        service: &str,
        namespace: &str,
        tail_lines: i64,
    ) -> Result<String, ClusterError>;

    async fn describe(&self, service: &str, namespace: &str) -> Result<String, ClusterError>;

    /// Returns a confirmation message on success.
    async fn scale(
        &self,
        service: &str,
        namespace: &str,
        replicas: i32,
    ) -> Result<String, ClusterError>;
}

/// Best-effort natural-language to JSON mapping. Output is never trusted as-is.
#[async_trait]
pub trait IntentExtractor: Send + Sync {
    async fn extract(&self, prompt: &str, known_services: &[String])
    -> Result<String, AdapterError>;
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FollowupSubject {
    Logs,
    Description,
}

impl FollowupSubject {
    pub fn label(self) -> &'static str {
        match self {
            Self::Logs => "logs",
            Self::Description => "description",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FollowupRequest {
    pub subject: FollowupSubject,
    pub service: String,
    pub context_text: String,
    pub original_prompt: Option<String>,
    pub question: String,
    pub known_services: Vec<String>,
}

#[async_trait]
pub trait FollowupAdvisor: Send + Sync {
    async fn ask(&self, request: &FollowupRequest) -> Result<String, AdapterError>;
}
