//! The service lifecycle supervisor.

use std::future::Future;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{dispatcher, Dispatch, Instrument};

use super::error_slot::{error_slot, ErrorReporter, ErrorSlot};
use super::shutdown::ListenerSet;
use super::signals;
use super::startup::{bind_listeners, register, Bound, RegistrationHooks};
use super::state::{RunState, StateCell};
use crate::config::ServiceConfig;
use crate::error::{ErrorSource, ServiceError};
use crate::http::GatewayTranslator;
use crate::rpc::RpcListener;

/// Runs one service: registration, listeners, first-failure detection and
/// ordered shutdown.
///
/// Built with [`ServiceBuilder`](super::ServiceBuilder). A supervisor runs once;
/// `run` consumes it.
pub struct LifecycleSupervisor {
    config: ServiceConfig,
    hooks: RegistrationHooks,
    dispatch: Dispatch,
    state: StateCell,
}

impl std::fmt::Debug for LifecycleSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleSupervisor")
            .field("config", &self.config)
            .field("hooks", &self.hooks)
            .field("state", &self.state.current())
            .finish()
    }
}

impl LifecycleSupervisor {
    pub(crate) fn new(config: ServiceConfig, hooks: RegistrationHooks, dispatch: Dispatch) -> Self {
        Self {
            config,
            hooks,
            dispatch,
            state: StateCell::new(),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state.current()
    }

    /// Watch run state changes. The receiver outlives the run.
    pub fn subscribe_state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Run until a listener fails or the process is interrupted.
    pub async fn run(self) -> Result<(), ServiceError> {
        self.run_until(signals::interrupt()).await
    }

    /// Run until a listener fails or `interrupt` resolves.
    ///
    /// Returns the first listener error, or `Ok(())` when interrupted.
    pub async fn run_until<F>(self, interrupt: F) -> Result<(), ServiceError>
    where
        F: Future<Output = ()>,
    {
        let dispatch = self.dispatch.clone();
        let span = dispatcher::with_default(&dispatch, || {
            tracing::info_span!("service", name = %self.config.name)
        });

        self.execute(interrupt)
            .instrument(span)
            .with_subscriber(dispatch)
            .await
    }

    async fn execute<F>(self, interrupt: F) -> Result<(), ServiceError>
    where
        F: Future<Output = ()>,
    {
        let Self {
            config,
            hooks,
            state,
            ..
        } = self;

        state.transition(RunState::Registering);
        tracing::info!(
            env = %config.env,
            rpc_port = config.rpc_port,
            gateway = config.gateway_enabled,
            share_port = config.share_port,
            "Service starting"
        );

        let root = CancellationToken::new();
        let (reporter, slot) = error_slot();

        let listeners = match start(&config, hooks, &root, reporter).await {
            Ok(listeners) => listeners,
            Err(e) => {
                tracing::error!(error = %e, "Service failed to start");
                root.cancel();
                state.transition(RunState::Draining);
                state.transition(RunState::Stopped);
                return Err(e);
            }
        };

        supervise(listeners, slot, interrupt, &state).await
    }
}

/// Wait for the first listener error or the interrupt, then drain every listener.
async fn supervise<F>(
    listeners: ListenerSet,
    mut slot: ErrorSlot,
    interrupt: F,
    state: &StateCell,
) -> Result<(), ServiceError>
where
    F: Future<Output = ()>,
{
    state.transition(RunState::Running);
    tracing::info!(listeners = listeners.len(), "Service running");

    let trigger = tokio::select! {
        Some(record) = slot.recv() => Some(record),
        () = interrupt => None,
    };
    // Errors raised while draining are logged by their reporter.
    drop(slot);

    state.transition(RunState::Draining);
    match &trigger {
        Some(record) => record.log(),
        None => tracing::info!("Shutdown requested"),
    }

    listeners.shutdown().await;
    state.transition(RunState::Stopped);
    tracing::info!("Service stopped");

    match trigger {
        Some(record) => Err(record.error),
        None => Ok(()),
    }
}

/// Register, bind and spawn. Nothing is spawned unless every earlier step succeeded.
async fn start(
    config: &ServiceConfig,
    hooks: RegistrationHooks,
    root: &CancellationToken,
    reporter: ErrorReporter,
) -> Result<ListenerSet, ServiceError> {
    let registered = register(hooks, config, root.child_token())?;
    let bound = bind_listeners(config).await?;

    let mut listeners = ListenerSet::new(root.clone(), reporter);
    let gateway_drain = Some(config.shutdown.gateway_drain());

    match bound {
        Bound::Multiplexed(socket) => {
            let gateway = GatewayTranslator::new(registered.gateway.unwrap_or_default())
                .multiplexed(registered.routes);
            listeners.spawn(ErrorSource::Gateway, gateway_drain, move |token| {
                gateway.serve(socket, token)
            });
        }
        Bound::Separate { rpc, gateway } => {
            let server = RpcListener::new(rpc, registered.routes);
            listeners.spawn(ErrorSource::Rpc, config.shutdown.rpc_drain(), move |token| {
                server.serve(token)
            });

            if let (Some(socket), Some(router)) = (gateway, registered.gateway) {
                let translator = GatewayTranslator::new(router);
                listeners.spawn(ErrorSource::Gateway, gateway_drain, move |token| {
                    translator.serve(socket, token)
                });
            }
        }
    }

    Ok(listeners)
}
