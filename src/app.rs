use crate::input::Action;
use crate::model::{OverviewTable, PodStatusReport, View};
use crate::router::{FollowupOutcome, Session, SessionError};
use chrono::Local;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum InputMode {
    Normal,
    Prompt,
    Followup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    None,
    SubmitPrompt(String),
    SubmitFollowup(String),
    Reset,
    RefreshOverview,
}

/// Terminal state around the session: input buffer, scrolling, status line.
///
/// The session itself is owned by the event loop; `App` only reads it.
#[derive(Debug, Clone)]
pub struct App {
    running: bool,
    mode: InputMode,
    input: String,
    status: String,
    show_help: bool,
    cluster: String,
    context: String,
    model: String,
    overview_namespace: String,
    services: Vec<String>,
    overview: OverviewTable,
    scroll: u16,
    max_scroll: u16,
    page_size: u16,
    busy: bool,
}

impl App {
    pub fn new(
        cluster: String,
        context: String,
        model: String,
        overview_namespace: String,
        services: Vec<String>,
    ) -> Self {
        Self {
            running: true,
            mode: InputMode::Normal,
            input: String::new(),
            status: "Press i to ask about the cluster, ? for keys".to_string(),
            show_help: false,
            cluster,
            context,
            model,
            overview_namespace,
            services,
            overview: OverviewTable::default(),
            scroll: 0,
            max_scroll: u16::MAX,
            page_size: 10,
            busy: false,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn overview_namespace(&self) -> &str {
        &self.overview_namespace
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    pub fn overview(&self) -> &OverviewTable {
        &self.overview
    }

    pub fn scroll(&self) -> u16 {
        self.scroll
    }

    pub fn busy(&self) -> bool {
        self.busy
    }

    /// Called by the renderer with the visible height and the artifact length.
    pub fn set_viewport(&mut self, visible_lines: u16, content_lines: usize) {
        self.page_size = visible_lines.max(1);
        let content = u16::try_from(content_lines).unwrap_or(u16::MAX);
        self.max_scroll = content.saturating_sub(self.page_size);
        self.scroll = self.scroll.min(self.max_scroll);
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn apply_action(&mut self, action: Action, session: &Session) -> AppCommand {
        if self.show_help && !matches!(action, Action::ToggleHelp | Action::Quit) {
            self.show_help = false;
            if matches!(action, Action::ClearNotice) {
                return AppCommand::None;
            }
        }

        match action {
            Action::Quit => {
                self.running = false;
                self.status = "Exit requested".to_string();
                AppCommand::None
            }
            Action::Down => {
                self.move_cursor(session, 1);
                AppCommand::None
            }
            Action::Up => {
                self.move_cursor(session, -1);
                AppCommand::None
            }
            Action::PageDown => {
                self.move_cursor(session, i32::from(self.page_size));
                AppCommand::None
            }
            Action::PageUp => {
                self.move_cursor(session, -i32::from(self.page_size));
                AppCommand::None
            }
            Action::Top => {
                self.move_cursor(session, i32::MIN / 2);
                AppCommand::None
            }
            Action::Bottom => {
                self.move_cursor(session, i32::MAX / 2);
                AppCommand::None
            }
            Action::ToggleHelp => {
                self.show_help = !self.show_help;
                AppCommand::None
            }
            Action::StartInput => self.start_input(session),
            Action::Refresh => {
                self.status = format!("Refreshing services in {}", self.overview_namespace);
                AppCommand::RefreshOverview
            }
            Action::ResetHome => {
                if session.view() == View::Home && session.notice().is_none() {
                    self.status = "Already home".to_string();
                    AppCommand::None
                } else {
                    AppCommand::Reset
                }
            }
            Action::ClearNotice => {
                if session.view() == View::Home && session.notice().is_some() {
                    AppCommand::Reset
                } else {
                    AppCommand::None
                }
            }
            Action::SubmitInput => self.submit_input(),
            Action::CancelInput => {
                self.mode = InputMode::Normal;
                self.input.clear();
                self.status = "Input cancelled".to_string();
                AppCommand::None
            }
            Action::Backspace => {
                self.input.pop();
                AppCommand::None
            }
            Action::ClearInput => {
                self.input.clear();
                AppCommand::None
            }
            Action::InputChar(c) => {
                self.input.push(c);
                AppCommand::None
            }
        }
    }

    pub fn on_dispatch_finished(&mut self, result: Result<View, SessionError>, session: &Session) {
        self.busy = false;
        match result {
            Ok(View::Home) => {
                self.status = match session.notice() {
                    Some(notice) => format!("Request not executed: {}", notice.kind_label()),
                    None => "Back home".to_string(),
                };
            }
            Ok(view) => {
                self.reset_scroll();
                self.status = match view {
                    View::Logs | View::Description => format!(
                        "{}: i to ask a follow-up, h to go home",
                        view.title()
                    ),
                    _ => format!("{}: h to go home", view.title()),
                };
            }
            Err(error) => self.status = error.to_string(),
        }
    }

    pub fn on_followup_finished(&mut self, result: Result<(), SessionError>, session: &Session) {
        self.busy = false;
        self.status = match (result, session.followup()) {
            (Err(error), _) => error.to_string(),
            (Ok(()), Some(FollowupOutcome::Failed(_))) => "Follow-up failed".to_string(),
            (Ok(()), _) => "Answer received".to_string(),
        };
    }

    pub fn on_reset(&mut self) {
        self.reset_scroll();
        self.mode = InputMode::Normal;
        self.input.clear();
        self.status = "Back home".to_string();
    }

    pub fn set_overview(&mut self, rows: Result<Vec<PodStatusReport>, String>) {
        match rows {
            Ok(rows) => self.overview.set_rows(rows, Local::now()),
            Err(error) => self.overview.set_error(error, Local::now()),
        }
    }

    fn start_input(&mut self, session: &Session) -> AppCommand {
        let view = session.view();
        if view == View::Home {
            self.mode = InputMode::Prompt;
            self.status = "Describe what you need, Enter to send".to_string();
        } else if view.accepts_followup() {
            self.mode = InputMode::Followup;
            self.status = format!("Ask about the {}", view.title().to_lowercase());
        } else {
            self.status = format!(
                "{} takes no input: press h to go home first",
                view.title()
            );
        }
        self.input.clear();
        AppCommand::None
    }

    fn submit_input(&mut self) -> AppCommand {
        let text = self.input.trim().to_string();
        let mode = self.mode;
        self.mode = InputMode::Normal;
        self.input.clear();

        if text.is_empty() {
            self.status = "Nothing to send".to_string();
            return AppCommand::None;
        }

        self.busy = true;
        match mode {
            InputMode::Prompt => {
                self.status = format!("Asking {}…", self.model);
                AppCommand::SubmitPrompt(text)
            }
            InputMode::Followup => {
                self.status = format!("Asking {} about it…", self.model);
                AppCommand::SubmitFollowup(text)
            }
            InputMode::Normal => {
                self.busy = false;
                AppCommand::None
            }
        }
    }

    fn move_cursor(&mut self, session: &Session, delta: i32) {
        if session.view() == View::Home {
            let rows = self.overview.rows.len();
            if rows == 0 {
                return;
            }
            let current = i64::try_from(self.overview.selected).unwrap_or(0);
            let next = (current + i64::from(delta)).clamp(0, rows as i64 - 1);
            self.overview.selected = usize::try_from(next).unwrap_or(0);
        } else {
            let next = (i32::from(self.scroll) + delta).clamp(0, i32::from(self.max_scroll));
            self.scroll = u16::try_from(next).unwrap_or(0);
        }
    }

    fn reset_scroll(&mut self) {
        self.scroll = 0;
        self.max_scroll = u16::MAX;
    }
}

#[cfg(test)]
mod tests {
    use super::{App, AppCommand, InputMode};
    use crate::adapters::mock::{MockCluster, ScriptedAdvisor, ScriptedExtractor};
    use crate::input::Action;
    use crate::model::{PodStatusReport, View};
    use crate::router::{Router, Session};
    use std::sync::Arc;

    fn app() -> App {
        App::new(
            "https://127.0.0.1:6443".to_string(),
            "kind-shop".to_string(),
            "gemini-2.5-flash".to_string(),
            "default".to_string(),
            vec!["cartservice".to_string(), "frontend".to_string()],
        )
    }

    fn router(extractor: ScriptedExtractor, advisor: ScriptedAdvisor) -> Router {
        let cluster = MockCluster::new()
            .with_pod("default", "cartservice-5f8d", "Running")
            .with_logs("cartservice-5f8d", "line 1\nline 2");
        Router::new(
            Arc::new(cluster),
            Arc::new(extractor),
            Arc::new(advisor),
            vec!["cartservice".to_string(), "frontend".to_string()],
        )
    }

    fn type_text(app: &mut App, session: &Session, text: &str) {
        for c in text.chars() {
            app.apply_action(Action::InputChar(c), session);
        }
    }

    #[test]
    fn prompt_input_submits_trimmed_text() {
        let mut app = app();
        let session = Session::new();

        app.apply_action(Action::StartInput, &session);
        assert_eq!(app.mode(), InputMode::Prompt);
        type_text(&mut app, &session, "  logs for cartservice ");

        let cmd = app.apply_action(Action::SubmitInput, &session);
        assert_eq!(cmd, AppCommand::SubmitPrompt("logs for cartservice".to_string()));
        assert_eq!(app.mode(), InputMode::Normal);
        assert!(app.busy());
        assert_eq!(app.input(), "");
    }

    #[test]
    fn blank_submission_sends_nothing() {
        let mut app = app();
        let session = Session::new();
        app.apply_action(Action::StartInput, &session);
        type_text(&mut app, &session, "   ");
        assert_eq!(app.apply_action(Action::SubmitInput, &session), AppCommand::None);
        assert!(!app.busy());
    }

    #[tokio::test]
    async fn logs_view_accepts_followups_and_home_resets() {
        let mut app = app();
        let mut session = Session::new();
        let router = router(
            ScriptedExtractor::replying(r#"{"action":"logs","service":"cartservice"}"#),
            ScriptedAdvisor::answering("All good."),
        );

        app.apply_action(Action::StartInput, &session);
        type_text(&mut app, &session, "cart logs");
        let AppCommand::SubmitPrompt(prompt) = app.apply_action(Action::SubmitInput, &session)
        else {
            panic!("expected a prompt submission");
        };
        let result = router.dispatch(&mut session, &prompt).await;
        app.on_dispatch_finished(result, &session);
        assert_eq!(session.view(), View::Logs);
        assert!(!app.busy());

        app.apply_action(Action::StartInput, &session);
        assert_eq!(app.mode(), InputMode::Followup);
        type_text(&mut app, &session, "anything wrong?");
        let AppCommand::SubmitFollowup(question) =
            app.apply_action(Action::SubmitInput, &session)
        else {
            panic!("expected a follow-up submission");
        };
        let result = router.ask_followup(&mut session, &question).await;
        app.on_followup_finished(result, &session);
        assert_eq!(app.status(), "Answer received");
        assert_eq!(session.view(), View::Logs);

        assert_eq!(app.apply_action(Action::ResetHome, &session), AppCommand::Reset);
        router.reset(&mut session);
        app.on_reset();
        assert_eq!(session, Session::default());
    }

    #[tokio::test]
    async fn status_view_refuses_input() {
        let mut app = app();
        let mut session = Session::new();
        let router = router(
            ScriptedExtractor::replying(r#"{"action":"status","service":"cartservice"}"#),
            ScriptedAdvisor::default(),
        );
        let result = router.dispatch(&mut session, "cart status").await;
        app.on_dispatch_finished(result, &session);

        app.apply_action(Action::StartInput, &session);
        assert_eq!(app.mode(), InputMode::Normal);
        assert!(app.status().contains("go home first"));
    }

    #[tokio::test]
    async fn rejected_prompt_reports_notice_kind_and_escape_clears_it() {
        let mut app = app();
        let mut session = Session::new();
        let router = router(
            ScriptedExtractor::replying("Sorry, I can't help with that."),
            ScriptedAdvisor::default(),
        );
        let result = router.dispatch(&mut session, "hmm").await;
        app.on_dispatch_finished(result, &session);

        assert_eq!(app.status(), "Request not executed: malformed");
        assert_eq!(app.apply_action(Action::ClearNotice, &session), AppCommand::Reset);
    }

    #[test]
    fn home_cursor_moves_over_overview_rows() {
        let mut app = app();
        let session = Session::new();
        app.set_overview(Ok(vec![
            PodStatusReport::not_found("cartservice"),
            PodStatusReport::not_found("frontend"),
        ]));

        app.apply_action(Action::Bottom, &session);
        assert_eq!(app.overview().selected, 1);
        app.apply_action(Action::Down, &session);
        assert_eq!(app.overview().selected, 1);
        app.apply_action(Action::Top, &session);
        assert_eq!(app.overview().selected, 0);
    }

    #[test]
    fn overview_error_is_kept_with_refresh_time() {
        let mut app = app();
        app.set_overview(Err("connection refused".to_string()));
        assert_eq!(app.overview().error.as_deref(), Some("connection refused"));
        assert!(app.overview().last_refreshed.is_some());
    }

    #[test]
    fn help_toggle_is_dismissed_by_next_key() {
        let mut app = app();
        let session = Session::new();
        app.apply_action(Action::ToggleHelp, &session);
        assert!(app.show_help());
        app.apply_action(Action::ClearNotice, &session);
        assert!(!app.show_help());
    }

    #[test]
    fn viewport_clamps_artifact_scroll() {
        let mut app = app();
        app.set_viewport(10, 15);
        app.scroll = 40;
        app.set_viewport(10, 15);
        assert_eq!(app.scroll(), 5);
    }
}
