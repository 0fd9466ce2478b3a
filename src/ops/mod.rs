//! Host-side operation handlers.
//!
//! Every operation the relay exposes is implemented here as a plain
//! function over the executor's session state. `apply` routes a request
//! to its handler; the dispatcher has already verified the operation name
//! and required parameters, so handlers only validate types and values.

use serde_json::{Map, Value};

use crate::{
    error::{BridgeError, Result},
    executor::HostSession,
    protocol::Request,
};

mod comp;
mod nodes;
mod script;
mod templates;

pub(crate) type Params = Map<String, Value>;

pub fn apply(session: &mut HostSession, request: &Request) -> Result<Value> {
    let params = &request.params;
    match request.command.as_str() {
        "create_node" => nodes::create_node(&mut session.graph, params),
        "connect_nodes" => nodes::connect_nodes(&mut session.graph, params),
        "set_knob_value" => nodes::set_knob_value(&mut session.graph, params),
        "get_node_info" => nodes::get_node_info(&session.graph, params),
        "get_script_info" => nodes::get_script_info(&session.graph),
        "list_nodes" => nodes::list_nodes(&session.graph, params),
        "auto_layout_nodes" => nodes::auto_layout_nodes(&mut session.graph, params),
        "create_group" => nodes::create_group(&mut session.graph, params),
        "create_live_group" => nodes::create_live_group(&mut session.graph, params),
        "create_camera_tracker" => comp::create_camera_tracker(&mut session.graph, params),
        "solve_camera_track" => comp::solve_camera_track(&mut session.graph, params),
        "create_3d_scene" => comp::create_3d_scene(&mut session.graph, params),
        "setup_deep_pipeline" => comp::setup_deep_pipeline(&mut session.graph, params),
        "setup_keyer" => comp::setup_keyer(&mut session.graph, params),
        "setup_basic_comp" => comp::setup_basic_comp(&mut session.graph, params),
        "setup_motion_blur" => comp::setup_motion_blur(&mut session.graph, params),
        "setup_copycat" => comp::setup_copycat(&mut session.graph, params),
        "train_copycat_model" => comp::train_copycat_model(&mut session.graph, params),
        "set_project_settings" => script::set_project_settings(&mut session.graph, params),
        "load_script" => script::load_script(&mut session.graph, params),
        "save_script" => script::save_script(&mut session.graph, params),
        "batch_process" => script::batch_process(&mut session.graph, params),
        "render" => script::render(&mut session.graph, params),
        "viewer_playback" => script::viewer_playback(&mut session.graph, params),
        "save_template" => templates::save_template(session, params),
        "load_template" => templates::load_template(session, params),
        other => Err(BridgeError::UnknownOperation(other.to_string())),
    }
}

/// A `null` value counts as absent, matching how optional parameters
/// arrive over the wire.
fn param<'a>(params: &'a Params, name: &str) -> Option<&'a Value> {
    params.get(name).filter(|value| !value.is_null())
}

fn require_str<'a>(params: &'a Params, name: &str) -> Result<&'a str> {
    match param(params, name) {
        None => Err(BridgeError::MissingParameter(name.to_string())),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(BridgeError::invalid_parameter(name, "expected a string")),
    }
}

fn opt_str<'a>(params: &'a Params, name: &str) -> Result<Option<&'a str>> {
    match param(params, name) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(BridgeError::invalid_parameter(name, "expected a string")),
    }
}

fn opt_bool(params: &Params, name: &str, default: bool) -> Result<bool> {
    match param(params, name) {
        None => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(BridgeError::invalid_parameter(name, "expected a boolean")),
    }
}

fn opt_i64(params: &Params, name: &str, default: i64) -> Result<i64> {
    match param(params, name) {
        None => Ok(default),
        Some(value) => value
            .as_i64()
            .ok_or_else(|| BridgeError::invalid_parameter(name, "expected an integer")),
    }
}

fn opt_f64(params: &Params, name: &str, default: f64) -> Result<f64> {
    match param(params, name) {
        None => Ok(default),
        Some(value) => value
            .as_f64()
            .ok_or_else(|| BridgeError::invalid_parameter(name, "expected a number")),
    }
}

fn require_str_list(params: &Params, name: &str) -> Result<Vec<String>> {
    match param(params, name) {
        None => Err(BridgeError::MissingParameter(name.to_string())),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                _ => Err(BridgeError::invalid_parameter(
                    name,
                    "expected a list of strings",
                )),
            })
            .collect(),
        Some(_) => Err(BridgeError::invalid_parameter(
            name,
            "expected a list of strings",
        )),
    }
}

fn opt_str_list(params: &Params, name: &str) -> Result<Vec<String>> {
    if param(params, name).is_none() {
        return Ok(Vec::new());
    }
    require_str_list(params, name)
}

fn opt_object<'a>(params: &'a Params, name: &str) -> Result<Option<&'a Map<String, Value>>> {
    match param(params, name) {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(BridgeError::invalid_parameter(name, "expected an object")),
    }
}

/// Parses a `[x, y]` position, tolerating extra trailing entries.
fn opt_position(params: &Params, name: &str) -> Result<Option<(i64, i64)>> {
    match param(params, name) {
        None => Ok(None),
        Some(Value::Array(items)) if items.len() >= 2 => {
            let x = items[0].as_i64();
            let y = items[1].as_i64();
            match (x, y) {
                (Some(x), Some(y)) => Ok(Some((x, y))),
                _ => Err(BridgeError::invalid_parameter(
                    name,
                    "expected [x, y] integers",
                )),
            }
        }
        Some(_) => Err(BridgeError::invalid_parameter(
            name,
            "expected [x, y] integers",
        )),
    }
}
