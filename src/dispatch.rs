//! Request dispatcher.
//!
//! Sits between the transport and the host executor: rejects unknown
//! operations and requests missing required parameters before anything
//! reaches the host, and folds every handler failure into an error
//! response so the relay itself never dies on a bad request.

use std::sync::Arc;

use crate::{executor::HostHandle, protocol::Request, protocol::Response, registry::Registry};

pub struct Dispatcher {
    registry: Arc<Registry>,
    host: HostHandle,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, host: HostHandle) -> Self {
        Self { registry, host }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub async fn dispatch(&self, request: Request) -> Response {
        let Some(spec) = self.registry.get(&request.command) else {
            return Response::error(format!("unknown operation: {}", request.command));
        };

        for name in spec.required_params() {
            match request.params.get(*name) {
                Some(value) if !value.is_null() => {}
                _ => return Response::error(format!("missing parameter: {name}")),
            }
        }

        match self.host.call(request).await {
            Ok(result) => Response::success(result),
            Err(err) => Response::error(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        executor::{self, HostSession},
        template::TemplateStore,
    };
    use serde_json::{json, Map, Value};
    use tempfile::tempdir;

    fn request(command: &str, params: Value) -> Request {
        let params: Map<String, Value> = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Request::new(command, params)
    }

    fn dispatcher(dir: &std::path::Path) -> Dispatcher {
        let store = TemplateStore::open(dir.join("templates")).unwrap();
        let host = executor::spawn(HostSession::new(store));
        Dispatcher::new(Arc::new(Registry::standard()), host)
    }

    #[tokio::test]
    async fn unknown_operation_is_rejected_without_side_effects() {
        let dir = tempdir().unwrap();
        let dispatcher = dispatcher(dir.path());

        let response = dispatcher
            .dispatch(request("paint_stroke", json!({"node_type": "Blur"})))
            .await;
        assert_eq!(
            response,
            Response::error("unknown operation: paint_stroke")
        );

        // The session saw no traffic: the script is still empty.
        let info = dispatcher
            .dispatch(request("get_script_info", json!({})))
            .await;
        match info {
            Response::Success { result } => assert_eq!(result["node_count"], json!(0)),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_required_parameter_names_the_parameter() {
        let dir = tempdir().unwrap();
        let dispatcher = dispatcher(dir.path());

        let response = dispatcher
            .dispatch(request("create_node", json!({"name": "Blur1"})))
            .await;
        assert_eq!(response, Response::error("missing parameter: node_type"));

        // A null value counts as absent.
        let response = dispatcher
            .dispatch(request("create_node", json!({"node_type": null})))
            .await;
        assert_eq!(response, Response::error("missing parameter: node_type"));

        let info = dispatcher
            .dispatch(request("get_script_info", json!({})))
            .await;
        match info {
            Response::Success { result } => assert_eq!(result["node_count"], json!(0)),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn valid_request_delegates_exactly_once() {
        let dir = tempdir().unwrap();
        let dispatcher = dispatcher(dir.path());

        let response = dispatcher
            .dispatch(request(
                "create_node",
                json!({"node_type": "Blur", "name": "Blur1"}),
            ))
            .await;
        match response {
            Response::Success { result } => assert_eq!(result["name"], json!("Blur1")),
            other => panic!("expected success, got {other:?}"),
        }

        let info = dispatcher
            .dispatch(request("get_script_info", json!({})))
            .await;
        match info {
            Response::Success { result } => assert_eq!(result["node_count"], json!(1)),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn handler_failures_become_error_responses() {
        let dir = tempdir().unwrap();
        let dispatcher = dispatcher(dir.path());

        let response = dispatcher
            .dispatch(request(
                "connect_nodes",
                json!({"output_node": "Missing", "input_node": "AlsoMissing"}),
            ))
            .await;
        assert!(response.is_error());
    }
}
