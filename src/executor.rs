//! Host executor actor.
//!
//! The relay and the host side are separate logical actors: the executor
//! owns the node-graph session and runs on its own task, and the
//! dispatcher reaches it only through a request/response channel. Nothing
//! outside this module touches the session directly.

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::{
    error::{BridgeError, Result},
    graph::Graph,
    ops,
    protocol::Request,
    template::TemplateStore,
};

/// Mutable state the executor owns for the lifetime of the process.
pub struct HostSession {
    pub graph: Graph,
    pub templates: TemplateStore,
}

impl HostSession {
    pub fn new(templates: TemplateStore) -> Self {
        Self {
            graph: Graph::default(),
            templates,
        }
    }
}

struct HostCall {
    request: Request,
    reply: oneshot::Sender<Result<Value>>,
}

/// Handle the dispatcher uses to talk to the executor actor.
#[derive(Clone)]
pub struct HostHandle {
    tx: mpsc::Sender<HostCall>,
}

impl HostHandle {
    pub async fn call(&self, request: Request) -> Result<Value> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HostCall { request, reply })
            .await
            .map_err(|_| BridgeError::Host("host executor is not running".to_string()))?;
        rx.await
            .map_err(|_| BridgeError::Host("host executor dropped the request".to_string()))?
    }
}

/// Spawns the executor actor and returns its handle. The actor processes
/// calls strictly in order and exits when the last handle is dropped.
pub fn spawn(session: HostSession) -> HostHandle {
    let (tx, mut rx) = mpsc::channel::<HostCall>(32);
    tokio::spawn(async move {
        let mut session = session;
        while let Some(call) = rx.recv().await {
            let result = ops::apply(&mut session, &call.request);
            if call.reply.send(result).is_err() {
                tracing::debug!("caller went away before the host reply was delivered");
            }
        }
    });
    HostHandle { tx }
}
