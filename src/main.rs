mod adapters;
mod app;
mod cli;
mod config;
mod gemini;
mod input;
mod intent;
mod k8s;
mod model;
mod router;
mod ui;

use anyhow::{Context, Result};
use app::{App, AppCommand};
use clap::Parser;
use cli::CliArgs;
use config::RuntimeConfig;
use crossterm::event::{
    Event, EventStream, KeyEventKind, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use futures::{StreamExt, TryStreamExt};
use gemini::GeminiClient;
use k8s::KubeGateway;
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::watcher::{Config as WatchConfig, watcher};
use kube::{Api, Client};
use model::View;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use router::{Router, Session};
use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;
const WATCH_EVENT_MIN_INTERVAL: Duration = Duration::from_millis(350);

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = CliArgs::parse();
    init_tracing(&args)?;

    let mut config = RuntimeConfig::load(args.config.as_deref())?;
    config.apply_cli(&args);
    match config.source.as_deref() {
        Some(source) => info!("loaded runtime config from {source}"),
        None => info!("no runtime config found, using defaults"),
    }

    let api_key = config.resolve_api_key(|name| std::env::var(name).ok())?;
    let gateway = KubeGateway::connect(
        args.kubeconfig.as_deref(),
        args.context.clone(),
        config.request_timeout,
    )
    .await?;
    let gemini = Arc::new(GeminiClient::new(
        api_key,
        config.model.clone(),
        config.request_timeout,
    )?);
    let router = Router::new(
        Arc::new(gateway.clone()),
        gemini.clone(),
        gemini,
        config.services.clone(),
    )
    .with_log_tail_lines(config.log_tail_lines);

    if let Some(prompt) = args.prompt.as_deref() {
        return run_once(&router, prompt).await;
    }

    let mut app = App::new(
        gateway.cluster().to_string(),
        gateway.context().to_string(),
        config.model.clone(),
        config.overview_namespace.clone(),
        config.services.clone(),
    );
    run(&mut app, &router, &gateway, args.refresh_interval_ms()).await?;
    Ok(ExitCode::SUCCESS)
}

fn init_tracing(args: &CliArgs) -> Result<()> {
    let filter = EnvFilter::try_new(&args.log_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    // The terminal UI owns stdout, so logs only leave the process through a file.
    let writer = match (&args.log_file, args.prompt.is_some()) {
        (Some(path), _) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        (None, true) => BoxMakeWriter::new(io::stderr),
        (None, false) => BoxMakeWriter::new(io::sink),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(writer)
        .try_init();

    Ok(())
}

async fn run_once(router: &Router, prompt: &str) -> Result<ExitCode> {
    let mut session = Session::new();
    router.dispatch(&mut session, prompt).await?;
    println!("{}", ui::plain_text(&session, router.known_services()));

    if session.view() == View::Home && session.notice().is_some() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn run(app: &mut App, router: &Router, gateway: &KubeGateway, refresh_ms: u64) -> Result<()> {
    let (mut terminal, keyboard_enhanced) = init_terminal()?;
    let run_result = run_loop(&mut terminal, app, router, gateway, refresh_ms).await;
    let restore_result = restore_terminal(&mut terminal, keyboard_enhanced);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<(TuiTerminal, bool)> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    let keyboard_enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if keyboard_enhanced {
        execute!(
            stdout,
            EnterAlternateScreen,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES)
        )
        .context("failed to enter alternate screen with keyboard enhancement")?;
    } else {
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok((terminal, keyboard_enhanced))
}

fn restore_terminal(terminal: &mut TuiTerminal, keyboard_enhanced: bool) -> Result<()> {
    if keyboard_enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)
            .context("failed to pop keyboard enhancement flags")?;
    }
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

async fn run_loop(
    terminal: &mut TuiTerminal,
    app: &mut App,
    router: &Router,
    gateway: &KubeGateway,
    refresh_ms: u64,
) -> Result<()> {
    let mut session = Session::new();
    app.set_status(format!("Loading services in {}…", app.overview_namespace()));
    terminal
        .draw(|frame| ui::render(frame, app, &session))
        .context("failed to render terminal frame")?;
    refresh_overview(app, gateway).await;

    let mut reader = EventStream::new();
    let mut ticker = interval(Duration::from_millis(refresh_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let (watch_tx, mut watch_rx) = mpsc::unbounded_channel::<()>();
    let watch_task = spawn_pod_watch_task(
        gateway.client(),
        app.overview_namespace().to_string(),
        watch_tx,
    );
    let mut last_watch_refresh: Option<Instant> = None;

    let result = loop {
        if let Err(error) = terminal.draw(|frame| ui::render(frame, app, &session)) {
            break Err(error).context("failed to render terminal frame");
        }

        if !app.running() {
            break Ok(());
        }

        tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if let Some(action) = input::map_key(app.mode(), key) {
                            debug!("action={action:?}");
                            let command = app.apply_action(action, &session);
                            if let Err(error) = terminal.draw(|frame| ui::render(frame, app, &session)) {
                                break Err(error).context("failed to render terminal frame");
                            }
                            execute_app_command(app, router, gateway, &mut session, command).await;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        app.set_status(format!("terminal event error: {error}"));
                    }
                    None => {
                        app.set_status("terminal event stream closed");
                        break Ok(());
                    }
                }
            }
            _ = ticker.tick() => {
                if session.view() == View::Home {
                    refresh_overview(app, gateway).await;
                }
            }
            maybe_event = watch_rx.recv() => {
                if maybe_event.is_some()
                    && session.view() == View::Home
                    && should_process_watch_event(&mut last_watch_refresh)
                {
                    refresh_overview(app, gateway).await;
                }
            }
        }
    };

    watch_task.abort();
    result
}

async fn execute_app_command(
    app: &mut App,
    router: &Router,
    gateway: &KubeGateway,
    session: &mut Session,
    command: AppCommand,
) {
    match command {
        AppCommand::None => {}
        AppCommand::SubmitPrompt(prompt) => {
            let result = router.dispatch(session, &prompt).await;
            app.on_dispatch_finished(result, session);
        }
        AppCommand::SubmitFollowup(question) => {
            let result = router.ask_followup(session, &question).await;
            app.on_followup_finished(result, session);
        }
        AppCommand::Reset => {
            router.reset(session);
            app.on_reset();
            refresh_overview(app, gateway).await;
        }
        AppCommand::RefreshOverview => {
            refresh_overview(app, gateway).await;
            if app.overview().error.is_none() {
                app.set_status("Services refreshed");
            }
        }
    }
}

async fn refresh_overview(app: &mut App, gateway: &KubeGateway) {
    let namespace = app.overview_namespace().to_string();
    let rows = gateway
        .overview(app.services(), &namespace)
        .await
        .map_err(|error| error.to_string());
    if let Err(error) = &rows {
        warn!("overview refresh failed for {namespace}: {error}");
    }
    app.set_overview(rows);
}

fn should_process_watch_event(last: &mut Option<Instant>) -> bool {
    let now = Instant::now();
    match last {
        Some(previous) if now.duration_since(*previous) < WATCH_EVENT_MIN_INTERVAL => false,
        _ => {
            *last = Some(now);
            true
        }
    }
}

fn spawn_pod_watch_task(
    client: Client,
    namespace: String,
    tx: mpsc::UnboundedSender<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let api: Api<Pod> = Api::namespaced(client.clone(), &namespace);
            let mut events = watcher(api, WatchConfig::default()).boxed();
            loop {
                match events.try_next().await {
                    Ok(Some(_)) => {
                        if tx.send(()).is_err() {
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(error) => {
                        warn!("pod watch error in {namespace}: {error}");
                        break;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(900)).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::should_process_watch_event;
    use std::time::Instant;

    #[test]
    fn watch_events_are_throttled() {
        let mut last = None;
        assert!(should_process_watch_event(&mut last));
        assert!(!should_process_watch_event(&mut last));

        last = Some(Instant::now() - std::time::Duration::from_secs(1));
        assert!(should_process_watch_event(&mut last));
    }
}
