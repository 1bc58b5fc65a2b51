use chrono::{DateTime, Local};
use std::fmt::{Display, Formatter};

pub const NOT_FOUND_STATUS: &str = "NOT FOUND";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum View {
    #[default]
    Home,
    Logs,
    Scale,
    Status,
    Description,
    Help,
    Irrelevant,
}

impl View {
    #[cfg(test)]
    pub const ALL: [Self; 7] = [
        Self::Home,
        Self::Logs,
        Self::Scale,
        Self::Status,
        Self::Description,
        Self::Help,
        Self::Irrelevant,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Home => "Home",
            Self::Logs => "Logs",
            Self::Scale => "Scaling Deployment",
            Self::Status => "Service Status",
            Self::Description => "Pod Description",
            Self::Help => "Help",
            Self::Irrelevant => "Irrelevant Prompt",
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Logs => "logs",
            Self::Scale => "scale",
            Self::Status => "status",
            Self::Description => "description",
            Self::Help => "help",
            Self::Irrelevant => "irrelevant",
        }
    }

    /// Views that hold a text artifact the operator can ask questions about.
    pub fn accepts_followup(self) -> bool {
        matches!(self, Self::Logs | Self::Description)
    }
}

impl Display for View {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Live state of the first pod matching a workload name.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PodStatus {
    pub pod_name: String,
    pub phase: String,
    pub node: String,
    pub restart_count: i32,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StatusTone {
    Healthy,
    Pending,
    Missing,
    Failing,
    Neutral,
}

/// Display row for a workload, shaped for both the status view and the home table.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PodStatusReport {
    pub pod: String,
    pub status: String,
    pub node: String,
    pub restarts: String,
}

impl PodStatusReport {
    pub fn not_found(service: &str) -> Self {
        Self {
            pod: service.to_string(),
            status: NOT_FOUND_STATUS.to_string(),
            node: "-".to_string(),
            restarts: "-".to_string(),
        }
    }

    pub fn error(service: &str, reason: &str) -> Self {
        Self {
            pod: service.to_string(),
            status: format!("ERROR: {reason}"),
            node: "-".to_string(),
            restarts: "-".to_string(),
        }
    }

    pub fn tone(&self) -> StatusTone {
        match self.status.as_str() {
            "Running" | "Succeeded" => StatusTone::Healthy,
            "Pending" => StatusTone::Pending,
            NOT_FOUND_STATUS => StatusTone::Missing,
            "Failed" => StatusTone::Failing,
            status if status.starts_with("ERROR:") => StatusTone::Failing,
            _ => StatusTone::Neutral,
        }
    }

    pub fn cells(&self) -> [&str; 4] {
        [&self.pod, &self.status, &self.node, &self.restarts]
    }
}

impl From<PodStatus> for PodStatusReport {
    fn from(status: PodStatus) -> Self {
        Self {
            pod: status.pod_name,
            status: status.phase,
            node: status.node,
            restarts: status.restart_count.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OverviewTable {
    pub rows: Vec<PodStatusReport>,
    pub selected: usize,
    pub last_refreshed: Option<DateTime<Local>>,
    pub error: Option<String>,
}

impl OverviewTable {
    pub const HEADERS: [&'static str; 4] = ["Pod", "Status", "Node", "Restarts"];

    pub fn set_rows(&mut self, rows: Vec<PodStatusReport>, refreshed_at: DateTime<Local>) {
        self.rows = rows;
        self.last_refreshed = Some(refreshed_at);
        self.error = None;
        self.selected = self.selected.min(self.rows.len().saturating_sub(1));
    }

    pub fn set_error(&mut self, error: impl Into<String>, refreshed_at: DateTime<Local>) {
        self.error = Some(error.into());
        self.last_refreshed = Some(refreshed_at);
    }

    pub fn healthy_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| row.tone() == StatusTone::Healthy)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::{OverviewTable, PodStatus, PodStatusReport, StatusTone, View};
    use chrono::Local;

    #[test]
    fn only_artifact_views_accept_followups() {
        let accepting = View::ALL
            .into_iter()
            .filter(|view| view.accepts_followup())
            .collect::<Vec<_>>();
        assert_eq!(accepting, vec![View::Logs, View::Description]);
    }

    #[test]
    fn report_from_live_status_keeps_restart_count() {
        let report = PodStatusReport::from(PodStatus {
            pod_name: "cartservice-7d9c-x2".to_string(),
            phase: "Running".to_string(),
            node: "node-a".to_string(),
            restart_count: 3,
        });
        assert_eq!(report.restarts, "3");
        assert_eq!(report.tone(), StatusTone::Healthy);
    }

    #[test]
    fn status_tones_follow_phase_labels() {
        assert_eq!(
            PodStatusReport::not_found("adservice").tone(),
            StatusTone::Missing
        );
        assert_eq!(
            PodStatusReport::error("adservice", "Forbidden").tone(),
            StatusTone::Failing
        );
        let pending = PodStatusReport {
            status: "Pending".to_string(),
            ..PodStatusReport::not_found("adservice")
        };
        assert_eq!(pending.tone(), StatusTone::Pending);
    }

    #[test]
    fn overview_selection_is_clamped_on_refresh() {
        let mut table = OverviewTable {
            selected: 7,
            ..OverviewTable::default()
        };
        table.set_rows(
            vec![
                PodStatusReport::not_found("a"),
                PodStatusReport::not_found("b"),
            ],
            Local::now(),
        );
        assert_eq!(table.selected, 1);
        assert!(table.error.is_none());
        assert_eq!(table.healthy_count(), 0);
    }
}
