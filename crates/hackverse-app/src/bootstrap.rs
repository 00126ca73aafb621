//! Boot sequence: environment, logging, stale workspace sweep, HTTP server.

use std::sync::Arc;

use hackverse_api::{ApiServer, ApiState};
use hackverse_config::ServiceConfig;
use hackverse_scan::{CommandRunner, ComparisonService, SystemCommandRunner};
use hackverse_telemetry::{LogFormat, LoggingConfig, Metrics, build_sha};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// Dependencies required to bootstrap the service.
pub(crate) struct BootstrapDependencies {
    config: ServiceConfig,
    runner: Arc<dyn CommandRunner>,
    telemetry: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config =
            ServiceConfig::from_env().map_err(|err| AppError::config("config.from_env", err))?;
        let telemetry =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        Ok(Self {
            config,
            runner: Arc::new(SystemCommandRunner),
            telemetry,
        })
    }
}

/// Entry point for the service boot sequence.
///
/// # Errors
///
/// Returns an error if configuration is invalid, logging cannot be installed,
/// or the HTTP server fails to bind or run.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    run_app_with(dependencies).await
}

/// Boot sequence that relies entirely on injected dependencies.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    let logging = LoggingConfig {
        level: &dependencies.config.logging.level,
        format: LogFormat::from_name(dependencies.config.logging.format.as_deref()),
        build_sha: build_sha(),
    };
    hackverse_telemetry::init_logging(&logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;

    let addr = dependencies.config.socket_addr();
    let server = prepare(dependencies).await?;
    server
        .serve(addr)
        .await
        .map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("similarity service stopped");
    Ok(())
}

/// Build the comparison service, sweep leftovers from earlier runs, and
/// assemble the router.
pub(crate) async fn prepare(dependencies: BootstrapDependencies) -> AppResult<ApiServer> {
    let BootstrapDependencies {
        config,
        runner,
        telemetry,
    } = dependencies;

    info!(
        addr = %config.socket_addr(),
        auth_enabled = config.auth_enabled(),
        workspace_root = %config.workspace.root.display(),
        git = %config.fetch.git_bin,
        jscpd = %config.scan.jscpd_bin,
        parse_failure = %config.scan.parse_failure,
        flag_threshold = config.review.flag_threshold,
        build_sha = build_sha(),
        "similarity service starting"
    );
    if !config.auth_enabled() {
        warn!("no api key configured; /compare accepts unauthenticated requests");
    }

    let service = ComparisonService::new(&config, runner, telemetry.clone());
    service
        .workspaces()
        .sweep_stale(config.workspace.max_age)
        .await
        .map_err(|err| AppError::workspace("workspace.sweep_stale", err))?;

    let state = ApiState::new(Arc::new(service), config.api_key.clone(), telemetry);
    Ok(ApiServer::new(state))
}
