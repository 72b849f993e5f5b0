use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::{Instant, MissedTickBehavior};

use fleet_core::{config, FleetConfig};
use fleet_sync::{
    lookup,
    pipeline::{self, CycleReport, SyncOptions, SyncScope},
    ActionExecutor, LocalProviders, WriteResult,
};

use crate::error::{io_err, DaemonError};
use crate::paths::{pid_path, run_dir, socket_path};
use crate::protocol::{DaemonRequest, DaemonResponse};

/// Everything a request handler needs, shared across tasks.
struct DaemonState {
    home: PathBuf,
    config: FleetConfig,
    providers: LocalProviders,
    started_at_unix: u64,
    history: RwLock<CycleHistory>,
}

#[derive(Debug, Default, Clone)]
struct CycleHistory {
    /// Unix seconds of the last successful non-dry-run cycle, 0 if none.
    last_sync_at_unix: u64,
    completed: u64,
    failed: u64,
    last_error: Option<String>,
}

struct SyncJob {
    scope: SyncScope,
    dry_run: bool,
    source: &'static str,
    respond_to: oneshot::Sender<Result<SyncSummary, SyncFailure>>,
}

/// Why a queued cycle did not produce a summary.
#[derive(Debug, Clone)]
struct SyncFailure {
    code: &'static str,
    message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub scope: String,
    pub source: String,
    pub domains: Vec<String>,
    pub dry_run: bool,
    pub merged: usize,
    pub written: usize,
    pub unchanged: usize,
    pub dropped: usize,
    pub duplicates: usize,
    pub sheet: WriteResult,
    pub duration_ms: u128,
}

/// Load the config under `home`, start the runtime and block the current
/// thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let config = config::load_at(home)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), config))
}

/// Run the daemon runtime.
pub async fn run(home: PathBuf, config: FleetConfig) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;

    let state = Arc::new(DaemonState {
        providers: LocalProviders::open(&config, &home),
        home: home.clone(),
        started_at_unix: unix_seconds_now(),
        history: RwLock::new(CycleHistory::default()),
        config,
    });
    tracing::info!(
        domains = state.config.domains.len(),
        interval_secs = state.config.sync_interval_secs,
        data_dir = %state.config.data_dir_at(&home).display(),
        "fleet daemon starting",
    );

    let (sync_tx, sync_rx) = mpsc::channel::<SyncJob>(64);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let scheduler_handle = {
        let shutdown = shutdown_tx.clone();
        let sync_tx = sync_tx.clone();
        let interval_secs = state.config.sync_interval_secs;
        tokio::spawn(async move {
            let result = scheduler_task(interval_secs, sync_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let result = sync_processor_task(state, sync_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let state = state.clone();
        let sync_tx = sync_tx.clone();
        tokio::spawn(async move {
            let result =
                socket_server_task(state, sync_tx, shutdown.clone(), shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };
    drop(sync_tx);

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (scheduler_result, processor_result, socket_result, signal_result) = tokio::join!(
        scheduler_handle,
        processor_handle,
        socket_handle,
        signal_handle
    );

    let pid = pid_path(&home);
    if pid.exists() {
        let _ = fs::remove_file(&pid);
    }

    handle_join("scheduler", scheduler_result)?;
    handle_join("sync_processor", processor_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("fleet daemon stopped");
    Ok(())
}

/// Queue a full cycle every `interval_secs`; `0` disables the schedule.
async fn scheduler_task(
    interval_secs: u64,
    sync_tx: mpsc::Sender<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    if interval_secs == 0 {
        tracing::info!("scheduled sync disabled");
        let _ = shutdown_rx.recv().await;
        return Ok(());
    }

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                match enqueue_sync(&sync_tx, SyncScope::All, false, "scheduler").await {
                    Ok(summary) => {
                        tracing::info!(
                            scope = %summary.scope,
                            written = summary.written,
                            unchanged = summary.unchanged,
                            dropped = summary.dropped,
                            duration_ms = summary.duration_ms,
                            "scheduled sync completed",
                        );
                    }
                    Err(DaemonError::ChannelClosed(_)) => break,
                    Err(err) => {
                        tracing::error!(error = %err, "scheduled sync failed");
                    }
                }
            }
        }
    }

    Ok(())
}

/// Single consumer of the sync queue: cycles never overlap.
async fn sync_processor_task(
    state: Arc<DaemonState>,
    mut sync_rx: mpsc::Receiver<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = sync_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let started = Instant::now();
                let timeout = state.config.cycle_timeout();

                let scope = job.scope.clone();
                let dry_run = job.dry_run;
                let for_sync = state.clone();
                let mut handle = tokio::task::spawn_blocking(move || {
                    let options = SyncOptions::new(dry_run).with_timeout(timeout);
                    pipeline::run(&for_sync.config, for_sync.providers.providers(), scope, &options)
                });

                let outcome = match tokio::time::timeout(timeout, &mut handle).await {
                    Ok(joined) => {
                        let result = joined.map_err(|err| {
                            DaemonError::Protocol(format!("sync task join error: {err}"))
                        })?;
                        match result {
                            Ok(report) => Ok(build_sync_summary(
                                &report,
                                job.source,
                                started.elapsed(),
                            )),
                            Err(err) => Err(SyncFailure {
                                code: err.code(),
                                message: err.to_string(),
                            }),
                        }
                    }
                    Err(_) => {
                        let message = format!(
                            "sync {} exceeded its {}s deadline",
                            job.scope,
                            timeout.as_secs()
                        );
                        tracing::error!(scope = %job.scope, "{message}");
                        let _ = job.respond_to.send(Err(SyncFailure {
                            code: "PROVIDER_UNAVAILABLE",
                            message: message.clone(),
                        }));
                        record_cycle(&state, dry_run, Some(message)).await;
                        // The blocking cycle stops at its next deadline check;
                        // wait for it so the next cycle cannot overlap.
                        let _ = handle.await;
                        continue;
                    }
                };

                record_cycle(
                    &state,
                    dry_run,
                    outcome.as_ref().err().map(|f| f.message.clone()),
                )
                .await;
                let _ = job.respond_to.send(outcome);
            }
        }
    }

    Ok(())
}

async fn record_cycle(state: &DaemonState, dry_run: bool, error: Option<String>) {
    let mut history = state.history.write().await;
    match error {
        None => {
            history.completed += 1;
            if !dry_run {
                history.last_sync_at_unix = unix_seconds_now();
            }
        }
        Some(message) => {
            history.failed += 1;
            history.last_error = Some(message);
        }
    }
}

async fn socket_server_task(
    state: Arc<DaemonState>,
    sync_tx: mpsc::Sender<SyncJob>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&state.home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let state = state.clone();
                let sync_tx = sync_tx.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, state, sync_tx, shutdown_tx).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    state: Arc<DaemonState>,
    sync_tx: mpsc::Sender<SyncJob>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::failure("INVALID_REQUEST", format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let cmd = request.cmd.clone();
        let response = match cmd.as_str() {
            "status" => DaemonResponse::ok(build_status_payload(&state).await),
            "sync" => {
                let scope = SyncScope::from_filter(request.domain.as_deref());
                match enqueue_sync(&sync_tx, scope, request.dry_run, "socket").await {
                    Ok(summary) => DaemonResponse::ok(json!(summary)),
                    Err(DaemonError::Rejected { code, message }) => {
                        DaemonResponse::failure(&code, message)
                    }
                    Err(err) => DaemonResponse::error(err.to_string()),
                }
            }
            "search" => match request.search {
                Some(search) => {
                    run_blocking(state.clone(), move |state| {
                        lookup::search(&state.config, &state.providers.store, &search)
                            .map(|records| json!(records))
                            .map_err(|e| (e.code(), e.to_string()))
                    })
                    .await
                }
                None => DaemonResponse::failure("INVALID_REQUEST", "search requires a 'search' object"),
            },
            "directory" => match request.search {
                Some(search) => {
                    run_blocking(state.clone(), move |state| {
                        lookup::directory(&state.config, &state.providers.store, &search)
                            .map(|found| json!({ "entries": found.entries, "malformed": found.malformed }))
                            .map_err(|e| (e.code(), e.to_string()))
                    })
                    .await
                }
                None => DaemonResponse::failure("INVALID_REQUEST", "directory requires a 'search' object"),
            },
            "action" => match request.action {
                Some(action) => {
                    run_blocking(state.clone(), move |state| {
                        ActionExecutor::new(
                            &state.config,
                            &state.providers.store,
                            &state.providers.inventory,
                        )
                        .execute(&action)
                        .map(|outcome| json!(outcome))
                        .map_err(|e| (e.code(), e.to_string()))
                    })
                    .await
                }
                None => DaemonResponse::failure("INVALID_REQUEST", "action requires an 'action' object"),
            },
            "stop" => {
                let _ = shutdown_tx.send(());
                DaemonResponse::ok(json!({ "stopping": true }))
            }
            other => DaemonResponse::failure("INVALID_REQUEST", format!("unknown command '{other}'")),
        };

        write_response(&mut writer, &response).await?;
        if cmd == "stop" {
            break;
        }
    }

    Ok(())
}

/// Run a store-reading request off the runtime threads.
///
/// These never go through the sync queue, so they proceed while a cycle runs.
async fn run_blocking<F>(state: Arc<DaemonState>, f: F) -> DaemonResponse
where
    F: FnOnce(&DaemonState) -> Result<Value, (&'static str, String)> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || f(&state)).await {
        Ok(Ok(data)) => DaemonResponse::ok(data),
        Ok(Err((code, message))) => DaemonResponse::failure(code, message),
        Err(err) => DaemonResponse::error(format!("request task join error: {err}")),
    }
}

async fn build_status_payload(state: &DaemonState) -> Value {
    let history = state.history.read().await.clone();
    let domains: Vec<&str> = state.config.domains.iter().map(|d| d.name.as_str()).collect();

    json!({
        "running": true,
        "pid": std::process::id(),
        "label": crate::paths::DAEMON_LABEL,
        "started_at_unix": state.started_at_unix,
        "last_sync_at_unix": history.last_sync_at_unix,
        "cycles_completed": history.completed,
        "cycles_failed": history.failed,
        "last_error": history.last_error,
        "sync_interval_secs": state.config.sync_interval_secs,
        "domains": domains,
        "socket": socket_path(&state.home).display().to_string(),
        "data_dir": state.config.data_dir_at(&state.home).display().to_string(),
    })
}

async fn enqueue_sync(
    sync_tx: &mpsc::Sender<SyncJob>,
    scope: SyncScope,
    dry_run: bool,
    source: &'static str,
) -> Result<SyncSummary, DaemonError> {
    let (tx, rx) = oneshot::channel();
    sync_tx
        .send(SyncJob {
            scope,
            dry_run,
            source,
            respond_to: tx,
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync queue"))?;

    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("sync response"))?;
    outcome.map_err(|f| DaemonError::Rejected {
        code: f.code.to_string(),
        message: f.message,
    })
}

fn build_sync_summary(report: &CycleReport, source: &'static str, duration: Duration) -> SyncSummary {
    SyncSummary {
        scope: report.scope.clone(),
        source: source.to_string(),
        domains: report.domains.iter().map(|d| d.to_string()).collect(),
        dry_run: report.dry_run,
        merged: report.merged,
        written: report.store_changed(),
        unchanged: report.store_unchanged(),
        dropped: report.issues.len(),
        duplicates: report.duplicates,
        sheet: report.sheet_write.clone(),
        duration_ms: duration.as_millis(),
    }
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let run = run_dir(home);
    if !run.exists() {
        fs::create_dir_all(&run).map_err(|e| io_err(&run, e))?;
    }
    let pid = pid_path(home);
    fs::write(&pid, std::process::id().to_string()).map_err(|e| io_err(&pid, e))?;
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
