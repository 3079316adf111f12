//! Server assembly: builder, shared state, and the accept loop.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Mutex;

use hokm_protocol::JsonCodec;
use hokm_session::{
    ConnectionRegistry, MemoryStore, SessionConfig, SessionManager, Store,
};

use crate::error::ServerError;
use crate::handler::handle_connection;
use crate::registry::MatchRegistry;

/// Everything a connection handler needs, shared behind an `Arc`.
pub struct ServerState<S: Store> {
    pub sessions: SessionManager<S>,
    pub connections: ConnectionRegistry,
    pub matches: Mutex<MatchRegistry<S>>,
    pub codec: JsonCodec,
}

/// Builder for [`HokmServer`]. Defaults: loopback on port 8080, the
/// stock session windows, and an in-memory store.
pub struct HokmServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
}

impl Default for HokmServerBuilder {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_owned(),
            session_config: SessionConfig::default(),
        }
    }
}

impl HokmServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the address to listen on.
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Overrides the session TTL and heartbeat windows.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Binds the listener with an in-memory store.
    ///
    /// # Errors
    /// Returns [`ServerError::Io`] if the address cannot be bound.
    pub async fn build(self) -> Result<HokmServer<MemoryStore>, ServerError> {
        self.build_with_store(MemoryStore::new()).await
    }

    /// Binds the listener against the given store backend.
    ///
    /// # Errors
    /// Returns [`ServerError::Io`] if the address cannot be bound.
    pub async fn build_with_store<S: Store>(
        self,
        store: S,
    ) -> Result<HokmServer<S>, ServerError> {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        let connections = ConnectionRegistry::new();
        let state = Arc::new(ServerState {
            sessions: SessionManager::new(
                store.clone(),
                self.session_config,
            ),
            connections: connections.clone(),
            matches: Mutex::new(MatchRegistry::new(connections, store)),
            codec: JsonCodec,
        });
        Ok(HokmServer { listener, state })
    }
}

/// The websocket game server. Build one with [`HokmServer::builder`],
/// then call [`run`](HokmServer::run) to serve until the task is
/// cancelled.
pub struct HokmServer<S: Store> {
    listener: TcpListener,
    state: Arc<ServerState<S>>,
}

impl HokmServer<MemoryStore> {
    pub fn builder() -> HokmServerBuilder {
        HokmServerBuilder::new()
    }
}

impl<S: Store> HokmServer<S> {
    /// The address actually bound, useful when binding port 0.
    ///
    /// # Errors
    /// Returns [`ServerError::Io`] if the socket is gone.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections forever, one task per socket.
    ///
    /// # Errors
    /// Returns [`ServerError::Io`] if accepting fails outright.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.listener.local_addr()?;
        tracing::info!(%addr, "listening");

        loop {
            let (stream, peer) = self.listener.accept().await?;
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                tracing::debug!(%peer, "connection accepted");
                if let Err(error) = handle_connection(stream, state).await {
                    tracing::debug!(%peer, %error, "connection closed with error");
                }
            });
        }
    }
}
