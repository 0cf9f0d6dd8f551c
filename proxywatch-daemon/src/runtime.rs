use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;

use proxywatch_core::{
    ChangeMonitor, Command, Config, Executor, MonitorState, Outcome, ProxySource,
};

use crate::error::{io_err, DaemonError};
use crate::log_rotation::{rotate_proxy_log, RotationPolicy};
use crate::paths::{config_path, endpoint, logs_dir, proxy_log_path, runtime_root};
use crate::proxy_log::ProxyLog;
use crate::singleton::ServerConfig;

const ROTATION_INTERVAL: Duration = Duration::from_secs(5);
const LISTENER_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Start the server runtime and block the current thread until it exits.
///
/// `initial` is the command the server process was launched with: quit exits
/// at once, stop starts disarmed, anything else starts armed.
pub fn start_blocking(server: ServerConfig, initial: Command) -> Result<(), DaemonError> {
    init_tracing();
    if initial == Command::Quit {
        tracing::info!("launched with quit; nothing to do");
        return Ok(());
    }
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(server, initial))
}

/// Run the server: command listener, proxy poll loop, log rotation.
///
/// Returns after a quit command, ctrl-c, or a fatal poll failure. The
/// singleton lock is released when `server` drops at the end.
pub async fn run(server: ServerConfig, initial: Command) -> Result<(), DaemonError> {
    let home = server.home().to_path_buf();
    ensure_runtime_dirs(&home)?;

    let config_file = config_path(&home);
    let config = Config::load(&config_file)?;
    let source = config.source.open(&runtime_root(&home))?;
    let proxy_log = ProxyLog::open(proxy_log_path(&home))?;
    tracing::info!(path = %proxy_log.path().display(), "logging proxy changes");

    let executor = Executor::new(Arc::new(MonitorState::new(initial != Command::Stop)));
    let state = executor.state().clone();
    if state.is_armed() {
        tracing::info!("now monitoring proxy changes");
    }

    // Each receiver is subscribed before its task is spawned.
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    // Bound before the poll loop starts so early clients find the endpoint.
    let endpoint = endpoint(&home);
    let listener = bind_endpoint(&endpoint)?;
    tracing::info!(endpoint = %endpoint.display(), "listening for commands");

    let server_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let executor = executor.clone();
        tokio::spawn(async move {
            let result =
                command_server_task(listener, endpoint, executor, shutdown.clone(), shutdown_rx)
                    .await;
            let _ = shutdown.send(());
            result
        })
    };

    let monitor_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let state = state.clone();
        let interval = config.poll_interval();
        tokio::spawn(async move {
            let result = monitor_task(source, state, proxy_log, interval, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let rotation_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let log_path = proxy_log_path(&home);
        let policy = RotationPolicy::from_config(&config);
        tokio::spawn(async move {
            let result = log_rotation_task(log_path, policy, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down monitor");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (server_result, monitor_result, rotation_result, signal_result) = tokio::join!(
        server_handle,
        monitor_handle,
        rotation_handle,
        signal_handle
    );

    handle_join("command_server", server_result)?;
    handle_join("proxy_monitor", monitor_result)?;
    handle_join("log_rotation", rotation_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("proxy monitor stopped");
    drop(server);
    Ok(())
}

async fn monitor_task(
    mut source: Box<dyn ProxySource>,
    state: Arc<MonitorState>,
    proxy_log: ProxyLog,
    poll_interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut monitor = ChangeMonitor::new();
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                let change = match monitor.tick(&state, &mut *source) {
                    Ok(change) => change,
                    Err(err) => {
                        tracing::error!(error = %err, "cannot read proxy settings, stopping monitor");
                        return Err(err.into());
                    }
                };
                let Some(change) = change else {
                    tracing::trace!(
                        enabled = monitor.last().enabled,
                        server = %monitor.last().server,
                        "no proxy change to log"
                    );
                    continue;
                };
                tracing::info!(change = %change, "proxy settings changed");
                if let Err(err) = proxy_log.append(&change, &chrono::Local::now()) {
                    tracing::warn!(error = %err, "failed to write proxy log");
                }
            }
        }
    }

    Ok(())
}

async fn log_rotation_task(
    log_path: PathBuf,
    policy: RotationPolicy,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut interval = tokio::time::interval(ROTATION_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval.tick().await; // consume the first immediate tick

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                let log_path = log_path.clone();
                tokio::task::spawn_blocking(move || rotate_proxy_log(&log_path, policy))
                    .await
                    .ok();
            }
        }
    }
    Ok(())
}

/// Serve one client: one request byte in, at most one response byte out.
///
/// Quit is answered with nothing; the shutdown signal goes out instead.
pub(crate) async fn handle_connection<S>(
    mut stream: S,
    executor: &Executor,
    shutdown_tx: &broadcast::Sender<()>,
) -> Result<Outcome, DaemonError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut request = [0u8; 1];
    match stream.read_exact(&mut request).await {
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
            tracing::debug!("client closed before sending a command");
            return Ok(Outcome::Rejected);
        }
        Err(err) => return Err(io_err("command read", err)),
    }

    let outcome = match Command::from_wire(request[0]) {
        Ok(command) => {
            let outcome = executor.execute(command);
            tracing::info!(
                command = %command,
                outcome = ?outcome,
                changed_state = outcome.is_applied(),
                "executed client command"
            );
            outcome
        }
        Err(err) => {
            tracing::warn!(error = %err, "rejecting client command");
            Outcome::Rejected
        }
    };

    let Some(response) = outcome.response_byte() else {
        let _ = shutdown_tx.send(());
        return Ok(outcome);
    };

    stream
        .write_all(&[response])
        .await
        .map_err(|e| io_err("command write", e))?;
    stream
        .flush()
        .await
        .map_err(|e| io_err("command flush", e))?;
    let _ = stream.shutdown().await;
    Ok(outcome)
}

fn spawn_connection<S>(stream: S, executor: &Executor, shutdown_tx: &broadcast::Sender<()>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let executor = executor.clone();
    let shutdown_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(err) = handle_connection(stream, &executor, &shutdown_tx).await {
            tracing::error!(error = %err, "client connection error");
        }
    });
}

#[cfg(unix)]
type Listener = tokio::net::UnixListener;

#[cfg(windows)]
type Listener = tokio::net::windows::named_pipe::NamedPipeServer;

#[cfg(unix)]
fn bind_endpoint(socket: &Path) -> Result<Listener, DaemonError> {
    prepare_socket_for_bind(socket)?;
    let listener = tokio::net::UnixListener::bind(socket).map_err(|e| io_err(socket, e))?;
    set_socket_permissions(socket)?;
    Ok(listener)
}

#[cfg(windows)]
fn bind_endpoint(pipe: &Path) -> Result<Listener, DaemonError> {
    create_pipe_instance(pipe, true)
}

#[cfg(windows)]
fn create_pipe_instance(pipe: &Path, first: bool) -> Result<Listener, DaemonError> {
    tokio::net::windows::named_pipe::ServerOptions::new()
        .first_pipe_instance(first)
        .create(pipe)
        .map_err(|e| io_err(pipe, e))
}

#[cfg(unix)]
async fn command_server_task(
    listener: Listener,
    socket: PathBuf,
    executor: Executor,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _)) => spawn_connection(stream, &executor, &shutdown_tx),
                    Err(err) => tracing::warn!(error = %err, "failed to accept client connection"),
                }
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

#[cfg(windows)]
async fn command_server_task(
    mut listener: Listener,
    pipe: PathBuf,
    executor: Executor,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            connected = listener.connect() => {
                // Each pipe instance serves one client; queue the next one first.
                let create = || create_pipe_instance(&pipe, false);
                let Some(next) = retry_until_shutdown(create, &mut shutdown_rx).await else {
                    break;
                };
                let client = std::mem::replace(&mut listener, next);
                match connected {
                    Ok(()) => spawn_connection(client, &executor, &shutdown_tx),
                    Err(err) => tracing::warn!(error = %err, "failed to accept client connection"),
                }
            }
        }
    }
    Ok(())
}

/// Call `create` until it succeeds, pausing between failures. `None` once
/// shutdown is signalled.
#[cfg_attr(not(windows), allow(dead_code))]
async fn retry_until_shutdown<T, F>(
    mut create: F,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> Option<T>
where
    F: FnMut() -> Result<T, DaemonError>,
{
    loop {
        match create() {
            Ok(value) => return Some(value),
            Err(err) => {
                tracing::warn!(error = %err, "failed to create listener instance, retrying")
            }
        }
        tokio::select! {
            _ = shutdown_rx.recv() => return None,
            _ = tokio::time::sleep(LISTENER_RETRY_DELAY) => {}
        }
    }
}

#[cfg(unix)]
fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match std::os::unix::net::UnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "monitor socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale monitor socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    for dir in [runtime_root(home), logs_dir(home)] {
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        }
    }
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

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
