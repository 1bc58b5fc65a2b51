use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ContainerStatus, Event, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::{ListParams, LogParams, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, ResourceExt};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::adapters::{ClusterAdapter, ClusterError};
use crate::model::{PodStatus, PodStatusReport};

const DESCRIBE_EVENT_LIMIT: usize = 20;

#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    context: String,
    cluster: String,
    request_timeout: Duration,
}

impl KubeGateway {
    pub async fn connect(
        kubeconfig_path: Option<&Path>,
        context: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let kubeconfig = match kubeconfig_path {
            Some(path) => Some(
                Kubeconfig::read_from(path)
                    .with_context(|| format!("failed to read kubeconfig {}", path.display()))?,
            ),
            None => Kubeconfig::read().ok(),
        };

        let config = if let Some(kubeconfig_value) = kubeconfig.clone() {
            let options = KubeConfigOptions {
                context: context.clone(),
                cluster: None,
                user: None,
            };
            Config::from_custom_kubeconfig(kubeconfig_value, &options)
                .await
                .context("failed to infer Kubernetes configuration")?
        } else {
            if context.is_some() {
                anyhow::bail!("kubeconfig not found; --context cannot be used in this environment");
            }
            Config::infer()
                .await
                .context("failed to infer Kubernetes configuration")?
        };

        let cluster = config.cluster_url.to_string();
        let client = Client::try_from(config).context("failed to initialize Kubernetes client")?;
        let context = context
            .or_else(|| kubeconfig.and_then(|cfg| cfg.current_context))
            .unwrap_or_else(|| "in-cluster".to_string());
        info!("connected to {cluster} (context {context})");

        Ok(Self {
            client,
            context,
            cluster,
            request_timeout,
        })
    }

    pub fn client(&self) -> Client {
        self.client.clone()
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// One row per catalog service, all resolved from a single pod listing.
    pub async fn overview(
        &self,
        services: &[String],
        namespace: &str,
    ) -> Result<Vec<PodStatusReport>, ClusterError> {
        let pods = self.list_pods(namespace).await?;
        Ok(services
            .iter()
            .map(|service| match first_matching_pod(&pods, service) {
                Some(pod) => PodStatusReport::from(pod_status(pod)),
                None => PodStatusReport::not_found(service),
            })
            .collect())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, ClusterError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = self.bounded(pods.list(&list_params())).await?;
        Ok(list.items)
    }

    async fn find_pod(&self, service: &str, namespace: &str) -> Result<Pod, ClusterError> {
        let pods = self.list_pods(namespace).await?;
        let pod = first_matching_pod(&pods, service).ok_or_else(|| ClusterError::NotFound {
            service: service.to_string(),
            namespace: namespace.to_string(),
        })?;
        debug!("'{service}' resolved to pod {namespace}/{}", pod.name_any());
        Ok(pod.clone())
    }

    async fn pod_events(&self, namespace: &str, pod_name: &str) -> Result<Vec<Event>, ClusterError> {
        let events: Api<Event> = Api::namespaced(self.client.clone(), namespace);
        let params = list_params().fields(&format!("involvedObject.name={pod_name}"));
        let list = self.bounded(events.list(&params)).await?;
        Ok(list
            .items
            .into_iter()
            .filter(|event| event.involved_object.kind.as_deref() == Some("Pod"))
            .collect())
    }

    async fn bounded<T, F>(&self, request: F) -> Result<T, ClusterError>
    where
        F: Future<Output = Result<T, kube::Error>>,
    {
        match timeout(self.request_timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(ClusterError::Api(error.to_string())),
            Err(_) => Err(ClusterError::Timeout(self.request_timeout.as_secs())),
        }
    }
}

#[async_trait]
impl ClusterAdapter for KubeGateway {
    async fn get_status(&self, service: &str, namespace: &str) -> Result<PodStatus, ClusterError> {
        let pod = self.find_pod(service, namespace).await?;
        Ok(pod_status(&pod))
    }

    async fn get_logs(
        &self,
        service: &str,
        namespace: &str,
        tail_lines: i64,
    ) -> Result<String, ClusterError> {
        let pod = self.find_pod(service, namespace).await?;
        let pod_name = pod.name_any();
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            tail_lines: Some(tail_lines),
            ..LogParams::default()
        };
        self.bounded(pods.logs(&pod_name, &params)).await
    }

    async fn describe(&self, service: &str, namespace: &str) -> Result<String, ClusterError> {
        let pod = self.find_pod(service, namespace).await?;
        let events = self.pod_events(namespace, &pod.name_any()).await?;
        Ok(render_pod_description(&pod, &events))
    }

    async fn scale(
        &self,
        service: &str,
        namespace: &str,
        replicas: i32,
    ) -> Result<String, ClusterError> {
        let patch = serde_json::json!({ "spec": { "replicas": replicas } });
        let params = PatchParams::default();
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        self.bounded(api.patch(service, &params, &Patch::Merge(&patch)))
            .await?;
        info!("scaled deployment {namespace}/{service} to {replicas}");
        Ok(format!("Scaled {service} to {replicas} replicas."))
    }
}

/// First pod, in listing order, whose name contains `service`.
pub fn first_matching_pod<'a>(pods: &'a [Pod], service: &str) -> Option<&'a Pod> {
    if service.is_empty() {
        return None;
    }
    pods.iter()
        .find(|pod| pod.metadata.name.as_deref().is_some_and(|name| name.contains(service)))
}

pub fn pod_status(pod: &Pod) -> PodStatus {
    let phase = pod
        .status
        .as_ref()
        .and_then(|status| status.phase.clone())
        .unwrap_or_else(|| "Unknown".to_string());
    let node = pod
        .spec
        .as_ref()
        .and_then(|spec| spec.node_name.clone())
        .unwrap_or_else(|| "-".to_string());
    let (_, _, restart_count) = pod.status.as_ref().map(pod_readiness).unwrap_or((0, 0, 0));

    PodStatus {
        pod_name: pod.name_any(),
        phase,
        node,
        restart_count,
    }
}

pub fn render_pod_description(pod: &Pod, events: &[Event]) -> String {
    let status = pod.status.as_ref();
    let spec = pod.spec.as_ref();
    let field = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());

    let (ready, total, restarts) = status.map(pod_readiness).unwrap_or((0, 0, 0));
    let labels = pod
        .metadata
        .labels
        .as_ref()
        .filter(|labels| !labels.is_empty())
        .map(|labels| {
            labels
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join(", ")
        });
    let controlled_by = pod
        .metadata
        .owner_references
        .as_ref()
        .and_then(|owners| owners.first())
        .map(|owner| format!("{}/{}", owner.kind, owner.name));

    let mut lines = vec![
        format!("Name:           {}", pod.name_any()),
        format!("Namespace:      {}", field(pod.namespace())),
        format!("Node:           {}", field(spec.and_then(|spec| spec.node_name.clone()))),
        format!(
            "Start Time:     {}",
            field(
                status
                    .and_then(|status| status.start_time.as_ref())
                    .map(|time| format!("{} ({} ago)", time.0, human_age(Some(time))))
            )
        ),
        format!("Labels:         {}", field(labels)),
        format!(
            "Status:         {}",
            field(status.and_then(|status| status.phase.clone()))
        ),
        format!("IP:             {}", field(status.and_then(|status| status.pod_ip.clone()))),
        format!("Controlled By:  {}", field(controlled_by)),
        format!("Ready:          {ready}/{total}"),
        format!("Restarts:       {restarts}"),
        "Containers:".to_string(),
    ];

    let container_statuses = status
        .and_then(|status| status.container_statuses.as_deref())
        .unwrap_or(&[]);
    let containers = spec.map(|spec| spec.containers.as_slice()).unwrap_or(&[]);
    if containers.is_empty() {
        lines.push("  -".to_string());
    }
    for container in containers {
        let live = container_statuses
            .iter()
            .find(|status| status.name == container.name);
        lines.push(format!("  {}:", container.name));
        lines.push(format!(
            "    Image:      {}",
            field(container.image.clone())
        ));
        match live {
            Some(live) => {
                lines.push(format!("    State:      {}", container_state(live)));
                lines.push(format!("    Ready:      {}", live.ready));
                lines.push(format!("    Restarts:   {}", live.restart_count));
            }
            None => lines.push("    State:      Unknown".to_string()),
        }
    }

    lines.push("Conditions:".to_string());
    let conditions = status
        .and_then(|status| status.conditions.as_deref())
        .unwrap_or(&[]);
    if conditions.is_empty() {
        lines.push("  -".to_string());
    }
    for condition in conditions {
        lines.push(format!("  {:<26}{}", condition.type_, condition.status));
    }

    lines.push("Events:".to_string());
    if events.is_empty() {
        lines.push("  <none>".to_string());
    } else {
        let mut ordered = events.iter().collect::<Vec<_>>();
        ordered.sort_by_key(|event| event_timestamp_seconds(event));
        let skip = ordered.len().saturating_sub(DESCRIBE_EVENT_LIMIT);
        lines.push(format!("  {:<9}{:<20}{:<7}{}", "Type", "Reason", "Age", "Message"));
        for event in ordered.into_iter().skip(skip) {
            lines.push(format!(
                "  {:<9}{:<20}{:<7}{}",
                field(event.type_.clone()),
                field(event.reason.clone()),
                event_age(event),
                truncate(&field(event.message.clone()), 160)
            ));
        }
    }

    lines.join("\n")
}

fn list_params() -> ListParams {
    ListParams::default().limit(500)
}

fn pod_readiness(status: &k8s_openapi::api::core::v1::PodStatus) -> (usize, usize, i32) {
    let container_statuses = status.container_statuses.as_deref().unwrap_or(&[]);
    let total = container_statuses.len();
    let ready = container_statuses
        .iter()
        .filter(|container| container.ready)
        .count();
    let restarts = container_statuses
        .iter()
        .map(|container| container.restart_count)
        .sum();

    (ready, total, restarts)
}

fn container_state(container: &ContainerStatus) -> String {
    let Some(state) = container.state.as_ref() else {
        return "Unknown".to_string();
    };
    if let Some(running) = state.running.as_ref() {
        return match running.started_at.as_ref() {
            Some(started) => format!("Running (since {})", started.0),
            None => "Running".to_string(),
        };
    }
    if let Some(waiting) = state.waiting.as_ref() {
        return waiting
            .reason
            .clone()
            .filter(|value| !value.is_empty())
            .map(|reason| format!("Waiting ({reason})"))
            .unwrap_or_else(|| "Waiting".to_string());
    }
    if let Some(terminated) = state.terminated.as_ref() {
        let reason = terminated
            .reason
            .clone()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "Exited".to_string());
        return format!("Terminated ({reason}, exit {})", terminated.exit_code);
    }
    "Unknown".to_string()
}

fn event_age(event: &Event) -> String {
    if let Some(event_time) = event.event_time.as_ref() {
        return human_age_timestamp(event_time.0);
    }
    if let Some(last_timestamp) = event.last_timestamp.as_ref() {
        return human_age(Some(last_timestamp));
    }
    if let Some(first_timestamp) = event.first_timestamp.as_ref() {
        return human_age(Some(first_timestamp));
    }
    human_age(event.metadata.creation_timestamp.as_ref())
}

fn event_timestamp_seconds(event: &Event) -> i64 {
    event
        .event_time
        .as_ref()
        .map(|time| time.0.as_second())
        .or_else(|| event.last_timestamp.as_ref().map(|time| time.0.as_second()))
        .or_else(|| event.first_timestamp.as_ref().map(|time| time.0.as_second()))
        .or_else(|| {
            event
                .metadata
                .creation_timestamp
                .as_ref()
                .map(|time| time.0.as_second())
        })
        .unwrap_or(0)
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }

    let mut out = value
        .chars()
        .take(max.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}

fn human_age(timestamp: Option<&Time>) -> String {
    let Some(timestamp) = timestamp else {
        return "-".to_string();
    };

    human_age_timestamp(timestamp.0)
}

fn human_age_timestamp(ts: k8s_openapi::jiff::Timestamp) -> String {
    let elapsed_seconds = (k8s_openapi::jiff::Timestamp::now().as_second() - ts.as_second()).max(0);
    format_elapsed_seconds(elapsed_seconds)
}

fn format_elapsed_seconds(seconds: i64) -> String {
    if seconds >= 86_400 {
        return format!("{}d", seconds / 86_400);
    }
    if seconds >= 3_600 {
        return format!("{}h", seconds / 3_600);
    }
    if seconds >= 60 {
        return format!("{}m", seconds / 60);
    }
    format!("{seconds}s")
}
