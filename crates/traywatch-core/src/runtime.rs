//! Wires the concrete collaborators together and owns the background tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api::{ApiClient, Identity};
use crate::config::Config;
use crate::constants::{REPORT_INITIAL_DELAY, REPORT_INTERVAL};
use crate::error::StartupError;
use crate::models::{Aggregate, StatusSink};
use crate::reporter::spawn_reporter;
use crate::store::{AggregateStore, SnapshotReconciler};
use crate::stream::WebSocketConnector;
use crate::supervisor::{ConnectionState, Supervisor};

#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    pub report_initial_delay: Duration,
    pub report_interval: Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            report_initial_delay: REPORT_INITIAL_DELAY,
            report_interval: REPORT_INTERVAL,
        }
    }
}

/// Look up the user and their teams. Failure here is fatal.
pub async fn fetch_identity(client: &ApiClient) -> Result<Identity, StartupError> {
    let user = client.get_me().await.map_err(StartupError::Identity)?;
    let teams = client
        .get_teams_for_user(&user.id)
        .await
        .map_err(StartupError::Teams)?;
    Ok(Identity { user, teams })
}

/// A running watcher: supervisor plus reporter.
pub struct TrayWatch {
    identity: Identity,
    store: AggregateStore,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    supervisor: JoinHandle<()>,
    reporter: JoinHandle<()>,
}

impl TrayWatch {
    pub async fn start(
        config: &Config,
        sink: Arc<dyn StatusSink>,
        options: RuntimeOptions,
    ) -> Result<Self, StartupError> {
        let client = ApiClient::new(&config.host, config.token.clone())
            .map_err(StartupError::Client)?;
        let identity = fetch_identity(&client).await?;
        info!(
            user = %identity.user.username,
            teams = identity.teams.len(),
            "Logged in"
        );

        let store = AggregateStore::new();
        let reconciler = SnapshotReconciler::new(
            Arc::new(client),
            identity.user.id.clone(),
            identity.teams.clone(),
        );
        let connector = WebSocketConnector::new(&config.host, config.token.clone());
        let supervisor = Supervisor::new(
            reconciler,
            connector,
            store.clone(),
            identity.user.id.clone(),
            sink,
        );
        let state = supervisor.subscribe_state();

        let cancel = CancellationToken::new();
        let supervisor = tokio::spawn(supervisor.run(cancel.clone()));
        let reporter = spawn_reporter(
            store.clone(),
            state.clone(),
            options.report_initial_delay,
            options.report_interval,
            cancel.child_token(),
        );

        Ok(Self {
            identity,
            store,
            state,
            cancel,
            supervisor,
            reporter,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn store(&self) -> &AggregateStore {
        &self.store
    }

    /// Copy of the current counters, for diagnostics only.
    pub fn diagnostic_snapshot(&self) -> Aggregate {
        self.store.snapshot()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Cancel everything and wait for the tasks to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.supervisor.await {
            error!(error = %e, "Supervisor task failed");
        }
        if let Err(e) = self.reporter.await {
            error!(error = %e, "Reporter task failed");
        }
        info!("Shut down");
    }
}
