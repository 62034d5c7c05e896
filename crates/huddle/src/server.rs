//! `HuddleServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → session → hub.

use std::sync::Arc;
use std::time::Duration;

use huddle_protocol::{Codec, JsonCodec};
use huddle_session::Authenticator;
use huddle_signal::CallConfig;
use huddle_store::MessageStore;
use huddle_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::HuddleError;
use crate::handler::handle_connection;
use crate::hub::Hub;

/// Per-connection timing settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// How long a new connection has to send its handshake frame.
    ///
    /// Default: 5 seconds.
    pub handshake_timeout: Duration,

    /// A connection that sends nothing for this long is closed. Clients
    /// keep quiet connections open with `ping`.
    ///
    /// Default: 60 seconds.
    pub idle_timeout: Duration,

    /// How often unanswered call requests are swept.
    ///
    /// Default: 1 second.
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(1),
        }
    }
}

/// State shared by every connection task.
pub(crate) struct ServerState<A: Authenticator, M: MessageStore, C: Codec> {
    pub(crate) hub: Mutex<Hub>,
    pub(crate) auth: A,
    pub(crate) store: Arc<M>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for a [`HuddleServer`].
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use huddle::prelude::*;
///
/// # async fn run() -> Result<(), HuddleError> {
/// let store = Arc::new(MemoryStore::new());
/// let server = HuddleServerBuilder::new()
///     .bind("0.0.0.0:9100")
///     .build(StoreAuthenticator::new(Arc::clone(&store)), store)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct HuddleServerBuilder {
    bind_addr: String,
    server_config: ServerConfig,
    call_config: CallConfig,
}

impl HuddleServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:9100".to_string(),
            server_config: ServerConfig::default(),
            call_config: CallConfig::default(),
        }
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn server_config(mut self, config: ServerConfig) -> Self {
        self.server_config = config;
        self
    }

    pub fn call_config(mut self, config: CallConfig) -> Self {
        self.call_config = config;
        self
    }

    /// Binds the listener and assembles the server.
    ///
    /// Uses `JsonCodec` over `WebSocketTransport`.
    ///
    /// # Errors
    /// [`HuddleError::Transport`] if the address can't be bound.
    pub async fn build<A, M>(
        self,
        auth: A,
        store: Arc<M>,
    ) -> Result<HuddleServer<A, M, JsonCodec>, HuddleError>
    where
        A: Authenticator,
        M: MessageStore,
    {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            hub: Mutex::new(Hub::new(self.call_config.clone())),
            auth,
            store,
            codec: JsonCodec,
            config: self.server_config,
        });

        Ok(HuddleServer {
            transport,
            state,
            sweep: self.call_config.request_timeout.is_some(),
        })
    }
}

impl Default for HuddleServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound relay server. Call [`run`](Self::run) to start serving.
pub struct HuddleServer<A: Authenticator, M: MessageStore, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, M, C>>,
    sweep: bool,
}

impl<A, M, C> HuddleServer<A, M, C>
where
    A: Authenticator,
    M: MessageStore,
    C: Codec,
{
    pub fn builder() -> HuddleServerBuilder {
        HuddleServerBuilder::new()
    }

    /// The address the listener is bound to.
    ///
    /// # Errors
    /// [`HuddleError::Transport`] if the socket can't report it.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, HuddleError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the accept loop, spawning one handler task per connection.
    ///
    /// Also starts the call request sweep when a request timeout is
    /// configured. Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), HuddleError> {
        tracing::info!("huddle relay running");

        if self.sweep {
            tokio::spawn(sweep_call_requests(Arc::clone(&self.state)));
        }

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

async fn sweep_call_requests<A, M, C>(state: Arc<ServerState<A, M, C>>)
where
    A: Authenticator,
    M: MessageStore,
    C: Codec,
{
    let period = state.config.sweep_interval.max(Duration::from_millis(10));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let expired = state.hub.lock().await.expire_call_requests();
        if expired > 0 {
            tracing::debug!(expired, "swept call requests");
        }
    }
}
