use thiserror::Error;

use crate::adapters::FollowupSubject;
use crate::intent::{Intent, ParseError};
use crate::model::{PodStatusReport, View};

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum SessionError {
    #[error("nothing to send: the prompt is empty")]
    EmptyPrompt,
    #[error("the {current} view must be reset to home before sending a new prompt")]
    NotAtHome { current: View },
    #[error("follow-up questions are only available on logs and description (current: {current})")]
    FollowupUnavailable { current: View },
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FollowupOutcome {
    Answered(String),
    Failed(String),
}

/// The single record of what is being shown.
///
/// Read access is public; every mutation goes through the router.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Session {
    view: View,
    active_service: String,
    active_namespace: String,
    last_intent: Option<Intent>,
    last_status: Option<PodStatusReport>,
    last_logs: Option<String>,
    last_description: Option<String>,
    origin_prompt: Option<String>,
    scale_result: Option<Result<String, String>>,
    pending_followup_prompt: Option<String>,
    followup: Option<FollowupOutcome>,
    notice: Option<ParseError>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn active_service(&self) -> &str {
        &self.active_service
    }

    pub fn active_namespace(&self) -> &str {
        &self.active_namespace
    }

    pub fn last_intent(&self) -> Option<&Intent> {
        self.last_intent.as_ref()
    }

    pub fn last_status(&self) -> Option<&PodStatusReport> {
        self.last_status.as_ref()
    }

    pub fn last_logs(&self) -> Option<&str> {
        self.last_logs.as_deref()
    }

    pub fn last_description(&self) -> Option<&str> {
        self.last_description.as_deref()
    }

    pub fn origin_prompt(&self) -> Option<&str> {
        self.origin_prompt.as_deref()
    }

    /// Scale confirmation, or the inline error when the mutation failed.
    pub fn scale_result(&self) -> Option<Result<&str, &str>> {
        self.scale_result
            .as_ref()
            .map(|result| result.as_ref().map(String::as_str).map_err(String::as_str))
    }

    pub fn scale_message(&self) -> Option<&str> {
        self.scale_result().map(|result| result.unwrap_or_else(|error| error))
    }

    pub fn pending_followup_prompt(&self) -> Option<&str> {
        self.pending_followup_prompt.as_deref()
    }

    pub fn followup(&self) -> Option<&FollowupOutcome> {
        self.followup.as_ref()
    }

    pub fn notice(&self) -> Option<&ParseError> {
        self.notice.as_ref()
    }

    /// Artifact text a follow-up question is asked against.
    pub fn artifact(&self) -> Option<&str> {
        match self.view {
            View::Logs => self.last_logs(),
            View::Description => self.last_description(),
            _ => None,
        }
    }

    pub(super) fn ensure_home(&self) -> Result<(), SessionError> {
        if self.view == View::Home {
            Ok(())
        } else {
            Err(SessionError::NotAtHome { current: self.view })
        }
    }

    pub(super) fn followup_subject(&self) -> Result<FollowupSubject, SessionError> {
        match self.view {
            View::Logs => Ok(FollowupSubject::Logs),
            View::Description => Ok(FollowupSubject::Description),
            current => Err(SessionError::FollowupUnavailable { current }),
        }
    }

    pub(super) fn reset(&mut self) {
        *self = Self::default();
    }

    /// Returns to home, keeping only the reason the dispatch stopped.
    pub(super) fn fail_dispatch(&mut self, error: ParseError) {
        *self = Self {
            notice: Some(error),
            ..Self::default()
        };
    }

    pub(super) fn show_status(&mut self, intent: Intent, report: PodStatusReport) {
        self.enter(View::Status, intent);
        self.last_status = Some(report);
    }

    pub(super) fn show_logs(&mut self, intent: Intent, logs: String) {
        self.enter(View::Logs, intent);
        self.last_logs = Some(logs);
    }

    pub(super) fn show_description(&mut self, intent: Intent, prompt: &str, description: String) {
        self.enter(View::Description, intent);
        self.last_description = Some(description);
        self.origin_prompt = Some(prompt.to_string());
    }

    pub(super) fn show_scale(&mut self, intent: Intent, result: Result<String, String>) {
        self.enter(View::Scale, intent);
        self.scale_result = Some(result);
    }

    pub(super) fn show_help(&mut self, intent: Intent) {
        self.enter(View::Help, intent);
    }

    pub(super) fn show_irrelevant(&mut self, intent: Intent) {
        self.enter(View::Irrelevant, intent);
    }

    pub(super) fn record_followup(&mut self, question: &str, outcome: FollowupOutcome) {
        self.pending_followup_prompt = Some(question.to_string());
        self.followup = Some(outcome);
    }

    fn enter(&mut self, view: View, intent: Intent) {
        // Help and irrelevant ignore any service the model named.
        let (active_service, active_namespace) = if intent.action.requires_service() {
            (intent.service.clone(), intent.namespace.clone())
        } else {
            (String::new(), String::new())
        };
        *self = Self {
            view,
            active_service,
            active_namespace,
            last_intent: Some(intent),
            ..Self::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::{FollowupOutcome, Session, SessionError};
    use crate::adapters::FollowupSubject;
    use crate::intent::{Intent, IntentAction, ParseError};
    use crate::model::{PodStatusReport, View};
    use pretty_assertions::assert_eq;

    fn session_in(view: View) -> Session {
        let mut session = Session::new();
        let intent = Intent::new(IntentAction::Logs, "cartservice");
        match view {
            View::Home => {}
            View::Logs => session.show_logs(intent, "line".to_string()),
            View::Scale => session.show_scale(intent, Ok("Scaled".to_string())),
            View::Status => session.show_status(intent, PodStatusReport::not_found("cart")),
            View::Description => session.show_description(intent, "describe", "d".to_string()),
            View::Help => session.show_help(intent),
            View::Irrelevant => session.show_irrelevant(intent),
        }
        session
    }

    #[test]
    fn new_session_starts_home_and_empty() {
        let session = Session::new();
        assert_eq!(session.view(), View::Home);
        assert_eq!(session.active_service(), "");
        assert!(session.last_intent().is_none());
        assert!(session.notice().is_none());
        assert!(session.artifact().is_none());
    }

    #[test]
    fn reset_from_every_view_restores_initial_state() {
        for view in View::ALL {
            let mut session = session_in(view);
            session.record_followup("why?", FollowupOutcome::Answered("because".to_string()));
            assert_eq!(session.view(), view);
            session.reset();
            assert_eq!(session, Session::default(), "{view}");
        }
    }

    #[test]
    fn failed_dispatch_keeps_only_the_notice() {
        let mut session = Session::new();
        session.fail_dispatch(ParseError::ServiceUnavailable("quota".to_string()));
        assert_eq!(session.view(), View::Home);
        assert_eq!(
            session.notice(),
            Some(&ParseError::ServiceUnavailable("quota".to_string()))
        );
        assert!(session.last_intent().is_none());
    }

    #[test]
    fn entering_a_view_clears_previous_artifacts() {
        let mut session = session_in(View::Logs);
        session.reset();
        session.show_status(
            Intent::new(IntentAction::Status, "frontend").with_namespace("shop"),
            PodStatusReport::not_found("frontend"),
        );
        assert!(session.last_logs().is_none());
        assert_eq!(session.active_namespace(), "shop");
    }

    #[test]
    fn help_and_irrelevant_views_carry_no_active_service() {
        let mut session = Session::new();
        session.show_help(Intent::new(IntentAction::Help, "frontend").with_namespace("shop"));
        assert_eq!(session.view(), View::Help);
        assert_eq!(session.active_service(), "");
        assert_eq!(session.active_namespace(), "");

        session.reset();
        session.show_irrelevant(Intent::new(IntentAction::Irrelevant, "frontend"));
        assert_eq!(session.active_service(), "");
        assert_eq!(
            session.last_intent().map(|intent| intent.service.as_str()),
            Some("frontend")
        );
    }

    #[test]
    fn scale_outcome_keeps_success_and_failure_apart() {
        let intent = Intent::new(IntentAction::Scale, "cartservice").with_replicas(2);
        let mut session = Session::new();
        session.show_scale(intent.clone(), Ok("Scaled cartservice to 2 replicas.".to_string()));
        assert_eq!(
            session.scale_result(),
            Some(Ok("Scaled cartservice to 2 replicas."))
        );

        session.reset();
        session.show_scale(intent, Err("Error scaling cartservice: forbidden".to_string()));
        assert_eq!(
            session.scale_result(),
            Some(Err("Error scaling cartservice: forbidden"))
        );
        assert_eq!(
            session.scale_message(),
            Some("Error scaling cartservice: forbidden")
        );
    }

    #[test]
    fn only_non_home_views_block_new_prompts() {
        assert!(session_in(View::Home).ensure_home().is_ok());
        assert_eq!(
            session_in(View::Scale).ensure_home(),
            Err(SessionError::NotAtHome {
                current: View::Scale
            })
        );
    }

    #[test]
    fn followup_subject_matches_artifact_views() {
        assert_eq!(
            session_in(View::Logs).followup_subject(),
            Ok(FollowupSubject::Logs)
        );
        assert_eq!(
            session_in(View::Description).followup_subject(),
            Ok(FollowupSubject::Description)
        );
        assert_eq!(
            session_in(View::Status).followup_subject(),
            Err(SessionError::FollowupUnavailable {
                current: View::Status
            })
        );
        assert_eq!(session_in(View::Description).artifact(), Some("d"));
    }
}
