mod session;

pub use session::{FollowupOutcome, Session, SessionError};

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::adapters::{
    ClusterAdapter, ClusterError, FollowupAdvisor, FollowupRequest, FollowupSubject,
    IntentExtractor,
};
use crate::intent::{Intent, IntentAction, ParseError, parse_intent};
use crate::model::{PodStatusReport, View};

pub const DEFAULT_LOG_TAIL_LINES: i64 = 100;

/// Concrete work selected for a validated intent.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Operation {
    Status {
        service: String,
        namespace: String,
    },
    Logs {
        service: String,
        namespace: String,
        tail_lines: i64,
    },
    Describe {
        service: String,
        namespace: String,
    },
    Scale {
        service: String,
        namespace: String,
        replicas: i32,
    },
    Help,
    Irrelevant,
}

impl Operation {
    pub fn plan(intent: &Intent, tail_lines: i64) -> Result<Self, ParseError> {
        intent.validate()?;
        let service = intent.service.clone();
        let namespace = intent.namespace.clone();

        let operation = match intent.action {
            IntentAction::Status => Self::Status { service, namespace },
            IntentAction::Logs => Self::Logs {
                service,
                namespace,
                tail_lines,
            },
            IntentAction::Description => Self::Describe { service, namespace },
            IntentAction::Scale => {
                let replicas =
                    intent
                        .scale_replicas()
                        .ok_or(ParseError::IncompleteForAction {
                            action: IntentAction::Scale,
                            field: "replicas",
                        })?;
                Self::Scale {
                    service,
                    namespace,
                    replicas,
                }
            }
            IntentAction::Help => Self::Help,
            IntentAction::Irrelevant => Self::Irrelevant,
        };

        Ok(operation)
    }

    pub fn is_mutating(&self) -> bool {
        matches!(self, Self::Scale { .. })
    }
}

/// One-shot command interpreter: each prompt yields at most one cluster call.
#[derive(Clone)]
pub struct Router {
    cluster: Arc<dyn ClusterAdapter>,
    extractor: Arc<dyn IntentExtractor>,
    advisor: Arc<dyn FollowupAdvisor>,
    known_services: Vec<String>,
    log_tail_lines: i64,
}

impl Router {
    pub fn new(
        cluster: Arc<dyn ClusterAdapter>,
        extractor: Arc<dyn IntentExtractor>,
        advisor: Arc<dyn FollowupAdvisor>,
        known_services: Vec<String>,
    ) -> Self {
        Self {
            cluster,
            extractor,
            advisor,
            known_services,
            log_tail_lines: DEFAULT_LOG_TAIL_LINES,
        }
    }

    pub fn with_log_tail_lines(mut self, lines: i64) -> Self {
        self.log_tail_lines = lines.max(1);
        self
    }

    pub fn known_services(&self) -> &[String] {
        &self.known_services
    }

    pub async fn dispatch(&self, session: &mut Session, prompt: &str) -> Result<View, SessionError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(SessionError::EmptyPrompt);
        }
        session.ensure_home()?;

        let raw = match self.extractor.extract(prompt, &self.known_services).await {
            Ok(raw) => raw,
            Err(error) => {
                warn!("intent extraction failed: {error}");
                session.fail_dispatch(ParseError::ServiceUnavailable(error.to_string()));
                return Ok(View::Home);
            }
        };
        debug!("raw intent: {raw}");

        let planned = parse_intent(&raw).and_then(|intent| {
            Operation::plan(&intent, self.log_tail_lines).map(|operation| (intent, operation))
        });
        let (intent, operation) = match planned {
            Ok(planned) => planned,
            Err(error) => {
                warn!("rejected intent ({}): {error}", error.kind_label());
                session.fail_dispatch(error);
                return Ok(View::Home);
            }
        };

        info!(
            action = %intent.action,
            service = %intent.service,
            namespace = %intent.namespace,
            mutating = operation.is_mutating(),
            "dispatching intent"
        );
        self.execute(session, prompt, intent, operation).await;
        Ok(session.view())
    }

    async fn execute(&self, session: &mut Session, prompt: &str, intent: Intent, operation: Operation) {
        match operation {
            Operation::Status { service, namespace } => {
                let report = match self.cluster.get_status(&service, &namespace).await {
                    Ok(status) => PodStatusReport::from(status),
                    Err(ClusterError::NotFound { .. }) => PodStatusReport::not_found(&service),
                    Err(error) => PodStatusReport::error(&service, &error.to_string()),
                };
                session.show_status(intent, report);
            }
            Operation::Logs {
                service,
                namespace,
                tail_lines,
            } => {
                let logs = match self.cluster.get_logs(&service, &namespace, tail_lines).await {
                    Ok(logs) => logs,
                    Err(ClusterError::NotFound { .. }) => format!("No pod found for {service}"),
                    Err(error) => format!("Error fetching logs for {service}: {error}"),
                };
                session.show_logs(intent, logs);
            }
            Operation::Describe { service, namespace } => {
                let description = match self.cluster.describe(&service, &namespace).await {
                    Ok(description) => description,
                    Err(ClusterError::NotFound { .. }) => format!("No pod found for {service}"),
                    Err(error) => format!("Error describing {service}: {error}"),
                };
                session.show_description(intent, prompt, description);
            }
            Operation::Scale {
                service,
                namespace,
                replicas,
            } => {
                let result = self
                    .cluster
                    .scale(&service, &namespace, replicas)
                    .await
                    .map_err(|error| format!("Error scaling {service}: {error}"));
                session.show_scale(intent, result);
            }
            Operation::Help => session.show_help(intent),
            Operation::Irrelevant => session.show_irrelevant(intent),
        }
    }

    /// Asks the language model about the artifact on screen without leaving the view.
    pub async fn ask_followup(&self, session: &mut Session, question: &str) -> Result<(), SessionError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SessionError::EmptyPrompt);
        }
        let subject = session.followup_subject()?;

        let request = FollowupRequest {
            subject,
            service: session.active_service().to_string(),
            context_text: session.artifact().unwrap_or_default().to_string(),
            original_prompt: match subject {
                FollowupSubject::Description => session.origin_prompt().map(str::to_string),
                FollowupSubject::Logs => None,
            },
            question: question.to_string(),
            known_services: self.known_services.clone(),
        };

        let outcome = match self.advisor.ask(&request).await {
            Ok(answer) => FollowupOutcome::Answered(answer),
            Err(error) => {
                warn!("follow-up on {} failed: {error}", subject.label());
                FollowupOutcome::Failed(ParseError::ServiceUnavailable(error.to_string()).to_string())
            }
        };
        session.record_followup(question, outcome);
        Ok(())
    }

    pub fn reset(&self, session: &mut Session) {
        session.reset();
    }
}
