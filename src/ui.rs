use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};
use serde_json::Value;

use crate::app::{App, InputMode};
use crate::intent::{IntentAction, ParseError};
use crate::model::{OverviewTable, PodStatusReport, StatusTone, View};
use crate::router::{FollowupOutcome, Session};

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);
const ORANGE: Color = Color::Rgb(251, 146, 60);
const PL_A: Color = Color::Rgb(17, 94, 89);
const PL_B: Color = Color::Rgb(30, 64, 175);
const PL_C: Color = Color::Rgb(55, 48, 163);

pub fn render(frame: &mut Frame, app: &mut App, session: &Session) {
    frame.render_widget(Block::default().style(Style::default().bg(BG)), frame.area());
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, root[0], app, session);
    render_body(frame, root[1], app, session);
    render_footer(frame, root[2], app);

    if app.show_help() {
        render_help_modal(frame, app);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App, session: &Session) {
    let mut spans = Vec::new();
    push_powerline_segment(&mut spans, " kubeprompt ", Color::White, PL_A, PL_B);
    push_powerline_segment(
        &mut spans,
        format!(" {} ", app.context()),
        Color::White,
        PL_B,
        PL_C,
    );
    push_powerline_segment(
        &mut spans,
        format!(" {} ", session.view().title()),
        Color::White,
        PL_C,
        BG,
    );
    if !session.active_service().is_empty() {
        spans.push(Span::styled(
            format!(" {}/{}", session.active_namespace(), session.active_service()),
            Style::default().fg(ACCENT),
        ));
    }
    spans.push(Span::styled(
        format!("  {}  {}", app.model(), app.cluster()),
        Style::default().fg(MUTED),
    ));

    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn render_body(frame: &mut Frame, area: Rect, app: &mut App, session: &Session) {
    match session.view() {
        View::Home => render_home(frame, area, app, session),
        View::Logs | View::Description => render_artifact(frame, area, app, session),
        View::Status => render_status(frame, area, app, session),
        View::Scale => render_scale(frame, area, app, session),
        View::Help => {
            let lines = help_lines(app.services());
            app.set_viewport(area.height.saturating_sub(2), lines.len());
            render_text_panel(frame, area, "Help", lines.join("\n"), app.scroll(), ACCENT);
        }
        View::Irrelevant => render_text_panel(
            frame,
            area,
            View::Irrelevant.title(),
            irrelevant_lines().join("\n"),
            0,
            WARN,
        ),
    }
}

fn render_home(frame: &mut Frame, area: Rect, app: &App, session: &Session) {
    let notice = session.notice().map(notice_lines);
    let notice_height = notice
        .as_ref()
        .map(|lines| (lines.len() as u16 + 2).min(area.height / 3))
        .unwrap_or(0);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(notice_height),
            Constraint::Min(4),
            Constraint::Length(3),
        ])
        .split(area);

    if let Some(lines) = notice {
        render_text_panel(frame, chunks[0], "Request not executed", lines.join("\n"), 0, ERROR);
    }
    render_overview(frame, chunks[1], app.overview(), app.overview_namespace());
    render_input(
        frame,
        chunks[2],
        app,
        InputMode::Prompt,
        "Ask about your services (i)",
    );
}

fn render_overview(frame: &mut Frame, area: Rect, overview: &OverviewTable, namespace: &str) {
    let refreshed = overview
        .last_refreshed
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());
    let title = format!(
        "Services in {namespace} ({}/{} healthy, refreshed {refreshed})",
        overview.healthy_count(),
        overview.rows.len()
    );

    if let Some(error) = overview.error.as_deref() {
        render_text_panel(frame, area, &title, format!("Refresh failed: {error}"), 0, ERROR);
        return;
    }

    let header_row = Row::new(OverviewTable::HEADERS.iter().map(|header| {
        Cell::from(*header).style(Style::default().add_modifier(Modifier::BOLD))
    }))
    .height(1)
    .style(Style::default().fg(ACCENT));
    let rows = overview.rows.iter().map(status_row);

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(40),
            Constraint::Percentage(20),
            Constraint::Percentage(28),
            Constraint::Percentage(12),
        ],
    )
    .header(header_row)
    .block(panel_block(title, ACCENT))
    .column_spacing(1)
    .row_highlight_style(
        Style::default()
            .bg(Color::Rgb(24, 36, 58))
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

    let mut state = TableState::default();
    if !overview.rows.is_empty() {
        state.select(Some(overview.selected));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

fn status_row(report: &PodStatusReport) -> Row<'static> {
    let status_style = Style::default().fg(tone_color(report.tone()));
    Row::new(report.cells().into_iter().enumerate().map(|(index, cell)| {
        let style = if index == 1 {
            status_style
        } else {
            Style::default().fg(Color::White)
        };
        Cell::from(cell.to_string()).style(style)
    }))
}

fn render_artifact(frame: &mut Frame, area: Rect, app: &mut App, session: &Session) {
    let view = session.view();
    let followup_height = if session.followup().is_some() {
        area.height / 3
    } else {
        0
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(4),
            Constraint::Length(followup_height),
            Constraint::Length(3),
        ])
        .split(area);

    let text = session.artifact().unwrap_or_default();
    let inner_width = chunks[0].width.saturating_sub(2);
    app.set_viewport(
        chunks[0].height.saturating_sub(2),
        wrapped_line_count(text, inner_width),
    );
    let title = format!(
        "{} for {} ({}/{} j/k scroll)",
        view.title(),
        session.active_service(),
        app.scroll(),
        text.lines().count()
    );
    render_text_panel(frame, chunks[0], &title, text.to_string(), app.scroll(), ACCENT);

    if let Some(outcome) = session.followup() {
        let question = session.pending_followup_prompt().unwrap_or_default();
        let (body, color) = match outcome {
            FollowupOutcome::Answered(answer) => (answer.clone(), ACCENT),
            FollowupOutcome::Failed(message) => (message.clone(), ERROR),
        };
        render_text_panel(frame, chunks[1], &format!("Q: {question}"), body, 0, color);
    }

    render_input(
        frame,
        chunks[2],
        app,
        InputMode::Followup,
        &format!("Ask about these {} (i)", view.title().to_lowercase()),
    );
}

fn render_status(frame: &mut Frame, area: Rect, app: &App, session: &Session) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(3)])
        .split(area);

    let header_row = Row::new(OverviewTable::HEADERS.iter().map(|header| {
        Cell::from(*header).style(Style::default().add_modifier(Modifier::BOLD))
    }))
    .style(Style::default().fg(ACCENT));
    let rows = session.last_status().map(status_row).into_iter();
    let table = Table::new(
        rows,
        [
            Constraint::Percentage(40),
            Constraint::Percentage(20),
            Constraint::Percentage(28),
            Constraint::Percentage(12),
        ],
    )
    .header(header_row)
    .block(panel_block(
        format!("Status of {}", session.active_service()),
        ACCENT,
    ));
    frame.render_widget(table, chunks[0]);

    render_intent(frame, chunks[1], app, session);
}

fn render_scale(frame: &mut Frame, area: Rect, app: &App, session: &Session) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    let (message, color) = match session.scale_result() {
        Some(Ok(message)) => (message, ACCENT),
        Some(Err(message)) => (message, ERROR),
        None => ("", ACCENT),
    };
    render_text_panel(
        frame,
        chunks[0],
        View::Scale.title(),
        message.to_string(),
        0,
        color,
    );
    render_intent(frame, chunks[1], app, session);
}

fn render_intent(frame: &mut Frame, area: Rect, app: &App, session: &Session) {
    let json = intent_json(session).unwrap_or_else(|| "{}".to_string());
    let paragraph = Paragraph::new(highlight_json_text(&json))
        .wrap(Wrap { trim: false })
        .scroll((app.scroll(), 0))
        .block(panel_block("Intent", MUTED));
    frame.render_widget(paragraph, area);
}

fn render_input(frame: &mut Frame, area: Rect, app: &App, mode: InputMode, hint: &str) {
    let active = app.mode() == mode;
    let (text, style) = if active {
        (
            format!("> {}█", app.input()),
            Style::default().fg(Color::White),
        )
    } else if app.busy() {
        (app.status().to_string(), Style::default().fg(WARN))
    } else {
        (hint.to_string(), Style::default().fg(MUTED))
    };

    let paragraph = Paragraph::new(text).style(style).block(panel_block(
        if active { "Prompt (Enter send, Esc cancel)" } else { "Prompt" },
        if active { ACCENT } else { MUTED },
    ));
    frame.render_widget(paragraph, area);
}

fn render_text_panel(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    body: String,
    scroll: u16,
    border: Color,
) {
    if area.height == 0 {
        return;
    }
    let paragraph = Paragraph::new(Text::from(body))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0))
        .block(panel_block(title.to_string(), border))
        .style(Style::default().fg(Color::White));
    frame.render_widget(paragraph, area);
}

fn panel_block<'a>(title: impl Into<Line<'a>>, border: Color) -> Block<'a> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(PANEL))
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let (label, bg) = match app.mode() {
        InputMode::Normal if app.busy() => (" wait ", WARN),
        InputMode::Normal => (" nrm ", PL_A),
        InputMode::Prompt => (" ask ", PL_B),
        InputMode::Followup => (" follow-up ", PL_C),
    };
    let status_color = if app.status().starts_with("Request not executed") {
        ERROR
    } else {
        Color::White
    };

    let mut spans = Vec::new();
    push_powerline_segment(&mut spans, label, Color::White, bg, BG);
    spans.push(Span::styled(
        format!(" {}", app.status()),
        Style::default().fg(status_color),
    ));
    spans.push(Span::styled(
        "  ? keys  q quit",
        Style::default().fg(MUTED),
    ));
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn render_help_modal(frame: &mut Frame, app: &App) {
    let area = centered_rect(70, 60, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(format!(
            "kubeprompt keys  mode:{}",
            help_mode_label(app.mode())
        )),
        Line::from(""),
    ];
    for line in [
        "i / Enter   ask a question (home) or a follow-up (logs, description)",
        "Esc         cancel input, or dismiss a rejected request",
        "h / Bksp    back to home",
        "j / k       move selection or scroll",
        "PgUp/PgDn   scroll a page",
        "g / G       top / bottom",
        "r           refresh the service table",
        "?           toggle this help",
        "q / Ctrl+C  quit",
    ] {
        lines.push(Line::from(line));
    }

    let modal = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(panel_block("Help", ACCENT))
        .style(Style::default().fg(Color::White));
    frame.render_widget(modal, area);
}

fn help_mode_label(mode: InputMode) -> &'static str {
    match mode {
        InputMode::Normal => "normal",
        InputMode::Prompt => "prompt",
        InputMode::Followup => "follow-up",
    }
}

/// Plain rendering of the session, used when running a single prompt.
pub fn plain_text(session: &Session, known_services: &[String]) -> String {
    let mut lines = vec![format!("== {} ==", session.view().title())];

    match session.view() {
        View::Home => match session.notice() {
            Some(notice) => lines.extend(notice_lines(notice)),
            None => lines.push("Nothing was requested.".to_string()),
        },
        View::Status => {
            if let Some(report) = session.last_status() {
                let widths = [32usize, 14, 24, 8];
                let render = |cells: [&str; 4]| {
                    cells
                        .iter()
                        .zip(widths)
                        .map(|(cell, width)| format!("{cell:<width$}"))
                        .collect::<Vec<_>>()
                        .join(" ")
                        .trim_end()
                        .to_string()
                };
                lines.push(render(OverviewTable::HEADERS));
                lines.push(render(report.cells()));
            }
        }
        View::Logs | View::Description => {
            lines.push(format!(
                "{}/{}",
                session.active_namespace(),
                session.active_service()
            ));
            lines.push(String::new());
            lines.push(session.artifact().unwrap_or_default().to_string());
        }
        View::Scale => lines.push(session.scale_message().unwrap_or_default().to_string()),
        View::Help => lines.extend(help_lines(known_services)),
        View::Irrelevant => lines.extend(irrelevant_lines()),
    }

    if matches!(session.view(), View::Status | View::Scale)
        && let Some(json) = intent_json(session)
    {
        lines.push(String::new());
        lines.push(json);
    }

    lines.join("\n")
}

fn notice_lines(notice: &ParseError) -> Vec<String> {
    let mut lines = vec![format!("[{}] {notice}", notice.kind_label())];
    match notice {
        ParseError::IncompleteForAction { field, .. } => {
            lines.push(format!("Mention the {field} explicitly and try again."));
        }
        ParseError::UnknownAction { .. } => {
            lines.push("Ask for status, logs, a description or scaling.".to_string());
        }
        _ => {}
    }
    if let Some(raw) = notice.raw() {
        lines.push(format!("Model output: {raw}"));
    }
    lines
}

fn help_lines(services: &[String]) -> Vec<String> {
    let mut lines = vec!["You can ask for:".to_string()];
    lines.extend(
        IntentAction::ALL
            .iter()
            .filter(|action| **action != IntentAction::Irrelevant)
            .map(|action| format!("  {:<12} {}", action.as_str(), action.summary())),
    );
    lines.push(String::new());
    lines.push("Known services:".to_string());
    lines.extend(services.iter().map(|service| format!("  {service}")));
    lines.push(String::new());
    lines.push("Example: \"scale checkoutservice to 3 replicas\"".to_string());
    lines
}

fn irrelevant_lines() -> Vec<String> {
    vec![
        "That request is not about the cluster's services.".to_string(),
        "Ask about status, logs, descriptions or scaling, or ask for help.".to_string(),
    ]
}

fn intent_json(session: &Session) -> Option<String> {
    session
        .last_intent()
        .and_then(|intent| serde_json::to_string_pretty(intent).ok())
}

fn tone_color(tone: StatusTone) -> Color {
    match tone {
        StatusTone::Healthy => ACCENT,
        StatusTone::Pending => ORANGE,
        StatusTone::Missing | StatusTone::Failing => ERROR,
        StatusTone::Neutral => Color::White,
    }
}

fn wrapped_line_count(text: &str, width: u16) -> usize {
    let width = usize::from(width.max(1));
    text.lines()
        .map(|line| line.chars().count().div_ceil(width).max(1))
        .sum()
}

fn highlight_json_text(input: &str) -> Text<'static> {
    let pretty = serde_json::from_str::<Value>(input)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| input.to_string());
    Text::from(
        pretty
            .lines()
            .map(highlight_json_line)
            .collect::<Vec<Line<'static>>>(),
    )
}

fn highlight_json_line(line: &str) -> Line<'static> {
    let Some((key, value)) = line.split_once("\": ") else {
        return Line::styled(line.to_string(), Style::default().fg(MUTED));
    };
    let value_color = match value.trim_end_matches(',') {
        "null" => MUTED,
        "true" | "false" => WARN,
        number if number.parse::<f64>().is_ok() => ORANGE,
        _ => Color::Rgb(125, 211, 252),
    };
    Line::from(vec![
        Span::styled(format!("{key}\""), Style::default().fg(Color::Rgb(103, 232, 249))),
        Span::styled(": ", Style::default().fg(MUTED)),
        Span::styled(value.to_string(), Style::default().fg(value_color)),
    ])
}

fn push_powerline_segment(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{plain_text, render, wrapped_line_count};
    use crate::adapters::mock::{MockCluster, ScriptedAdvisor, ScriptedExtractor};
    use crate::app::App;
    use crate::model::PodStatusReport;
    use crate::router::{Router, Session};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use std::sync::Arc;

    fn services() -> Vec<String> {
        vec!["cartservice".to_string(), "frontend".to_string()]
    }

    async fn session_after(raw: &str, prompt: &str) -> Session {
        let cluster = MockCluster::new()
            .with_pod("default", "cartservice-5f8d", "Running")
            .with_logs("cartservice-5f8d", "GET /cart 200");
        let router = Router::new(
            Arc::new(cluster),
            Arc::new(ScriptedExtractor::replying(raw)),
            Arc::new(ScriptedAdvisor::default()),
            services(),
        );
        let mut session = Session::new();
        router
            .dispatch(&mut session, prompt)
            .await
            .expect("dispatch from home");
        session
    }

    #[tokio::test]
    async fn plain_status_has_table_and_intent() {
        let session =
            session_after(r#"{"action":"status","service":"cartservice"}"#, "cart?").await;
        let text = plain_text(&session, &services());
        assert!(text.starts_with("== Service Status =="));
        assert!(text.contains("Pod"));
        assert!(text.contains("cartservice-5f8d"));
        assert!(text.contains("Running"));
        assert!(text.contains("\"action\": \"status\""));
        assert!(text.contains("\"namespace\": \"default\""));
    }

    #[tokio::test]
    async fn plain_logs_show_the_artifact() {
        let session = session_after(r#"{"action":"logs","service":"cartservice"}"#, "logs").await;
        let text = plain_text(&session, &services());
        assert!(text.contains("default/cartservice"));
        assert!(text.ends_with("GET /cart 200"));
    }

    #[tokio::test]
    async fn plain_home_shows_rejection_with_raw_output() {
        let session = session_after("I am not sure.", "???").await;
        let text = plain_text(&session, &services());
        assert!(text.starts_with("== Home =="));
        assert!(text.contains("[malformed]"));
        assert!(text.contains("Model output: I am not sure."));
    }

    #[tokio::test]
    async fn plain_help_lists_services_but_not_irrelevant() {
        let session = session_after(r#"{"action":"help"}"#, "help").await;
        let text = plain_text(&session, &services());
        assert!(text.contains("  frontend"));
        assert!(text.contains("scale"));
        assert!(!text.contains("irrelevant"));
    }

    #[test]
    fn wrapped_lines_account_for_width() {
        assert_eq!(wrapped_line_count("abcdef\n\nxy", 4), 4);
        assert_eq!(wrapped_line_count("", 10), 0);
    }

    #[tokio::test]
    async fn every_view_renders_without_panicking() {
        for (raw, prompt) in [
            (r#"{"action":"status","service":"cartservice"}"#, "status"),
            (r#"{"action":"logs","service":"cartservice"}"#, "logs"),
            (r#"{"action":"description","service":"cartservice"}"#, "describe"),
            (r#"{"action":"scale","service":"cartservice","replicas":2}"#, "scale"),
            (r#"{"action":"help"}"#, "help"),
            (r#"{"action":"irrelevant"}"#, "weather"),
            ("not json", "garbage"),
        ] {
            let session = session_after(raw, prompt).await;
            let mut app = App::new(
                "https://127.0.0.1:6443".to_string(),
                "kind".to_string(),
                "gemini-2.5-flash".to_string(),
                "default".to_string(),
                services(),
            );
            app.set_overview(Ok(vec![PodStatusReport::not_found("frontend")]));
            let mut terminal = Terminal::new(TestBackend::new(100, 30)).expect("test terminal");
            terminal
                .draw(|frame| render(frame, &mut app, &session))
                .expect("frame renders");
        }
    }
}
