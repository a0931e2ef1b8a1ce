use std::{fs, future, net::SocketAddr, path::PathBuf, time::Duration};

use admin_ipc::{run_server, AdminRequest, AdminResponse, AdminStatus, DEFAULT_SOCKET_PATH};
use anyhow::{anyhow, bail, Context};
use chrono::Utc;
use clap::Parser;
use extract::{ExportConfig, Exporter, DEFAULT_IDLE_MODEL};
use idle::{IdleWindow, DEFAULT_WINDOW_DAYS};
use metrics::ExportMetrics;
use refresh::{RefreshGate, RefreshStatus};
use storage::init_sqlite;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task;
use tracing::{info, warn, Level};
use uuid::Uuid;

mod database_url;
mod refresher;

use database_url::{ensure_database_parent_dir, validate_database_url};
use refresher::Refresher;

#[derive(Parser, Debug)]
#[command(about = "Rebuilds the vessel map extracts on a schedule")]
struct Args {
    #[arg(long, env = "SHIPMAP_DB", default_value = "sqlite://shipmap.db")]
    database_url: String,

    #[arg(long, env = "SHIPMAP_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    #[arg(long, env = "ADMIN_SOCKET", default_value = DEFAULT_SOCKET_PATH)]
    admin_socket: String,

    #[arg(long, env = "METRICS_ADDR", default_value = "127.0.0.1:9110")]
    metrics_addr: SocketAddr,

    /// Seconds between scheduled exports.
    #[arg(long, env = "SHIPMAP_REFRESH_SECS", default_value_t = 3600)]
    refresh_secs: u64,

    /// Trailing days searched for each vessel's idle streak.
    #[arg(long, env = "SHIPMAP_IDLE_WINDOW_DAYS", default_value_t = DEFAULT_WINDOW_DAYS)]
    idle_window_days: u32,

    #[arg(long, env = "SHIPMAP_IDLE_MODEL", default_value = DEFAULT_IDLE_MODEL)]
    idle_model: String,

    /// Run a single export and exit.
    #[arg(long)]
    once: bool,
}

impl Args {
    fn export_config(&self) -> anyhow::Result<ExportConfig> {
        let mut config = ExportConfig::new(&self.output_dir);
        config.idle_model = self.idle_model.clone();
        config.idle_window = IdleWindow::new(self.idle_window_days)?;
        Ok(config)
    }

    fn refresh_period(&self) -> anyhow::Result<Duration> {
        if self.refresh_secs == 0 {
            bail!("refresh interval must be at least one second");
        }
        Ok(Duration::from_secs(self.refresh_secs))
    }
}

fn log_startup(args: &Args, run_id: &str) {
    info!(url = %args.database_url, "database configured");
    info!(dir = %args.output_dir.display(), "output directory configured");
    info!(
        model = %args.idle_model,
        window_days = args.idle_window_days,
        "idle model configured"
    );
    if args.once {
        info!("single export requested");
    } else {
        info!(socket = %args.admin_socket, "admin socket bind planned");
        info!(addr = %args.metrics_addr, "metrics bind planned");
        info!(secs = args.refresh_secs, "refresh interval configured");
    }
    info!(%run_id, "run initialized");
}

fn admin_handler(
    run_id: String,
    gate: RefreshGate,
    status: RefreshStatus,
    manual: mpsc::Sender<()>,
) -> impl Fn(AdminRequest) -> anyhow::Result<AdminResponse> + Send + Sync + 'static {
    move |req: AdminRequest| -> anyhow::Result<AdminResponse> {
        match req {
            AdminRequest::Status => Ok(AdminResponse::Status(AdminStatus {
                run_id: run_id.clone(),
                refresh_state: gate.status(),
                last_refresh: status.last(),
            })),
            AdminRequest::Pause => {
                gate.pause();
                info!("scheduled refreshes paused");
                Ok(AdminResponse::Ack)
            }
            AdminRequest::Resume => {
                gate.resume();
                info!("scheduled refreshes resumed");
                Ok(AdminResponse::Ack)
            }
            AdminRequest::Refresh => match manual.try_send(()) {
                Ok(()) => Ok(AdminResponse::Ack),
                Err(TrySendError::Full(())) => Err(anyhow!("refresh already queued")),
                Err(TrySendError::Closed(())) => Err(anyhow!("refresh loop is not running")),
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    validate_database_url(&args.database_url)?;
    let config = args.export_config()?;
    let period = args.refresh_period()?;
    info!(
        database = %args.database_url,
        output = %args.output_dir.display(),
        "booting shipmapd"
    );

    ensure_database_parent_dir(&args.database_url)?;
    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("failed to create {}", args.output_dir.display()))?;

    let run_id = Uuid::new_v4().to_string();
    let store = init_sqlite(&args.database_url).await?;
    log_startup(&args, &run_id);

    let missing_tables = store.validate_required_tables().await?;
    if !missing_tables.is_empty() {
        warn!(tables = ?missing_tables, "database missing required tables");
        if let Err(err) = store
            .log_incident(
                &run_id,
                "warning",
                "db_schema_missing",
                &format!(
                    "database missing required tables: {}",
                    missing_tables.join(", ")
                ),
            )
            .await
        {
            warn!(error = ?err, "failed to log missing schema incident");
        }
    }

    let metrics = ExportMetrics::new()?;
    let status = RefreshStatus::new();
    let refresher = Refresher::new(
        store.clone(),
        Exporter::new(config),
        metrics.clone(),
        status.clone(),
        run_id.clone(),
    );

    if args.once {
        let summary = refresher.refresh(Utc::now().date_naive()).await?;
        info!(
            files = summary.files.len(),
            rows = summary.total_rows(),
            "single export finished"
        );
        return Ok(());
    }

    let gate = RefreshGate::new();
    let (manual_tx, manual_rx) = mpsc::channel(1);

    let handler = admin_handler(run_id.clone(), gate.clone(), status, manual_tx);
    let socket_path = args.admin_socket.clone();
    task::spawn(async move {
        if let Err(err) = run_server(&socket_path, handler).await {
            tracing::error!(error = ?err, "admin ipc server failed");
        }
    });

    let metrics_addr = args.metrics_addr;
    task::spawn(async move {
        if let Err(err) = metrics.serve(metrics_addr).await {
            tracing::error!(error = ?err, "metrics server error");
        }
    });

    task::spawn(refresher.run_loop(gate, period, manual_rx));

    info!(
        run_id = %run_id,
        admin_socket = %args.admin_socket,
        metrics_addr = %args.metrics_addr,
        "ready"
    );
    if let Err(err) = store
        .log_incident(&run_id, "info", "ready", "shipmapd booted and ready")
        .await
    {
        warn!(error = ?err, "failed to record ready incident");
    }

    future::pending::<()>().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct VecWriter(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for VecWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let mut guard = self.0.lock().unwrap();
            guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for VecWriter {
        type Writer = VecWriter;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture(f: impl FnOnce()) -> String {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_ansi(false)
            .with_writer(VecWriter(buffer.clone()))
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buffer.lock().unwrap().clone();
        String::from_utf8(bytes).expect("log output should be utf8")
    }

    #[test]
    fn startup_logs_include_configuration() {
        let args = Args::parse_from([
            "shipmapd",
            "--database-url",
            "sqlite:///tmp/shipmap-test.db",
            "--admin-socket",
            "/tmp/shipmap-test.sock",
            "--metrics-addr",
            "127.0.0.1:9000",
            "--idle-window-days",
            "10",
        ]);
        let run_id = Uuid::nil().to_string();

        let output = capture(|| log_startup(&args, &run_id));
        assert!(output.contains("database configured"));
        assert!(output.contains("admin socket bind planned"));
        assert!(output.contains("metrics bind planned"));
        assert!(output.contains("run initialized"));
        assert!(output.contains(&args.database_url));
        assert!(output.contains(&args.admin_socket));
        assert!(output.contains(&args.metrics_addr.to_string()));
        assert!(output.contains("window_days=10"));
        assert!(output.contains(&run_id));
    }

    #[test]
    fn single_export_skips_server_configuration() {
        let args = Args::parse_from(["shipmapd", "--once"]);
        let output = capture(|| log_startup(&args, "run-once"));
        assert!(output.contains("single export requested"));
        assert!(!output.contains("admin socket bind planned"));
    }

    #[test]
    fn export_config_follows_arguments() {
        let args = Args::parse_from([
            "shipmapd",
            "--output-dir",
            "/srv/shipmap",
            "--idle-model",
            "Max12-3",
            "--idle-window-days",
            "14",
        ]);
        let config = args.export_config().unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/srv/shipmap"));
        assert_eq!(config.idle_model, "Max12-3");
        assert_eq!(config.idle_window.days(), 14);
    }

    #[test]
    fn rejects_zero_window_and_interval() {
        let args = Args::parse_from(["shipmapd", "--idle-window-days", "0"]);
        assert!(args.export_config().is_err());

        let args = Args::parse_from(["shipmapd", "--refresh-secs", "0"]);
        assert!(args.refresh_period().is_err());
    }

    #[test]
    fn admin_refresh_queues_at_most_one_request() {
        let (tx, mut rx) = mpsc::channel(1);
        let gate = RefreshGate::new();
        let handler = admin_handler("run-1".into(), gate.clone(), RefreshStatus::new(), tx);

        assert_eq!(handler(AdminRequest::Refresh).unwrap(), AdminResponse::Ack);
        let err = handler(AdminRequest::Refresh).unwrap_err();
        assert_eq!(err.to_string(), "refresh already queued");
        assert!(rx.try_recv().is_ok());

        assert_eq!(handler(AdminRequest::Pause).unwrap(), AdminResponse::Ack);
        assert!(!gate.is_active());
        match handler(AdminRequest::Status).unwrap() {
            AdminResponse::Status(status) => {
                assert_eq!(status.run_id, "run-1");
                assert_eq!(status.refresh_state, refresh::RefreshState::Paused);
                assert!(status.last_refresh.is_none());
            }
            other => panic!("expected status response, got {other:?}"),
        }

        drop(rx);
        let err = handler(AdminRequest::Refresh).unwrap_err();
        assert_eq!(err.to_string(), "refresh loop is not running");
    }
}
