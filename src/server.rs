//! TCP relay server.
//!
//! Sessions are served one at a time in accept order; while a session is
//! open, further connections queue in the listen backlog. A session ends
//! on EOF or an IO failure, never on a bad request.

use std::{net::SocketAddr, sync::Arc};

use tokio::{
    io::BufReader,
    net::{TcpListener, TcpStream},
};
use tracing::{info, warn};

use crate::{
    config::Config,
    dispatch::Dispatcher,
    error::{BridgeError, Result},
    executor::{self, HostSession},
    protocol::{self, Response},
    registry::Registry,
};

pub struct Server {
    listener: TcpListener,
    dispatcher: Dispatcher,
}

impl Server {
    /// Binds the listener and spins up the host executor. A port that is
    /// already taken is fatal at startup.
    pub async fn bind(config: &Config) -> Result<Self> {
        config.ensure_data_dir()?;
        let templates = crate::template::TemplateStore::open(config.templates_dir())?;
        let host = executor::spawn(HostSession::new(templates));
        let dispatcher = Dispatcher::new(Arc::new(Registry::standard()), host);

        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|err| BridgeError::Config(format!("failed to bind {addr}: {err}")))?;

        Ok(Self {
            listener,
            dispatcher,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> Result<()> {
        let addr = self.local_addr()?;
        info!(%addr, operations = self.dispatcher.registry().len(), "relay listening");

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown signal received");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            info!(%peer, "session opened");
                            match serve_session(stream, &self.dispatcher).await {
                                Ok(()) => info!(%peer, "session closed"),
                                Err(err) => warn!(%peer, error = %err, "session dropped"),
                            }
                        }
                        Err(err) => warn!(error = %err, "accept failed"),
                    }
                }
            }
        }
        Ok(())
    }
}

async fn serve_session(stream: TcpStream, dispatcher: &Dispatcher) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        match protocol::read_request(&mut reader).await {
            Ok(None) => return Ok(()),
            Ok(Some(request)) => {
                let command = request.command.clone();
                let response = dispatcher.dispatch(request).await;
                if response.is_error() {
                    warn!(command, "request failed");
                }
                protocol::write_response(&mut write_half, &response).await?;
            }
            // Malformed lines get an error response; the session stays up.
            Err(BridgeError::Protocol(message)) => {
                warn!(error = %message, "discarding malformed request");
                let response = Response::error(format!("invalid JSON: {message}"));
                protocol::write_response(&mut write_half, &response).await?;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(signal) => signal,
        Err(err) => {
            warn!(error = %err, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
