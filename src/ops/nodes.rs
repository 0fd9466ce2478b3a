//! Basic node operations: creation, wiring, knob access, introspection,
//! layout and grouping.

use std::{collections::BTreeMap, fs, path::Path};

use serde_json::{json, Value};

use super::{
    opt_bool, opt_i64, opt_object, opt_position, opt_str, param, require_str, require_str_list,
    Params,
};
use crate::{
    error::{BridgeError, Result},
    graph::{max_inputs, Graph, SPACING_X, SPACING_Y},
};

pub fn create_node(graph: &mut Graph, params: &Params) -> Result<Value> {
    let node_type = require_str(params, "node_type")?;
    let name = opt_str(params, "name")?;
    let position = opt_position(params, "position")?;
    let inputs = super::opt_str_list(params, "inputs")?;
    let parameters = opt_object(params, "parameters")?.cloned();

    let created = {
        let node = graph.create(node_type, name)?;
        if let Some((x, y)) = position {
            node.xpos = x;
            node.ypos = y;
        }
        if let Some(map) = &parameters {
            for (knob, value) in map {
                node.set_knob(knob, value.clone());
            }
        }
        node.name.clone()
    };

    // Missing upstream nodes are skipped rather than failing the whole
    // creation; slots beyond the class arity are ignored.
    let limit = max_inputs(node_type);
    for (index, input) in inputs.iter().enumerate() {
        if index >= limit {
            break;
        }
        if graph.contains(input) {
            graph.connect(input, &created, index)?;
        }
    }

    let node = graph.require(&created)?;
    Ok(json!({
        "name": node.name,
        "class": node.class,
        "xpos": node.xpos,
        "ypos": node.ypos,
    }))
}

pub fn connect_nodes(graph: &mut Graph, params: &Params) -> Result<Value> {
    let output = require_str(params, "output_node")?;
    let input = require_str(params, "input_node")?;
    let index = opt_i64(params, "input_index", 0)?;
    if index < 0 {
        return Err(BridgeError::invalid_parameter(
            "input_index",
            "must not be negative",
        ));
    }
    graph.connect(output, input, index as usize)?;
    Ok(json!({
        "output_node": output,
        "input_node": input,
        "input_index": index,
    }))
}

pub fn set_knob_value(graph: &mut Graph, params: &Params) -> Result<Value> {
    let node_name = require_str(params, "node_name")?;
    let knob_name = require_str(params, "knob_name")?;
    let value = param(params, "value")
        .cloned()
        .ok_or_else(|| BridgeError::MissingParameter("value".to_string()))?;
    let node = graph.require_mut(node_name)?;
    node.set_knob(knob_name, value.clone());
    Ok(json!({
        "node_name": node_name,
        "knob_name": knob_name,
        "value": value,
    }))
}

pub fn get_node_info(graph: &Graph, params: &Params) -> Result<Value> {
    let node = graph.require(require_str(params, "node_name")?)?;
    Ok(json!({
        "name": node.name,
        "class": node.class,
        "xpos": node.xpos,
        "ypos": node.ypos,
        "selected": node.selected,
        "inputs": node.inputs,
        "knobs": node.knobs,
    }))
}

pub fn get_script_info(graph: &Graph) -> Result<Value> {
    Ok(json!({
        "script_name": graph.script_name,
        "node_count": graph.len(),
        "first_frame": graph.settings.first_frame,
        "last_frame": graph.settings.last_frame,
        "current_frame": graph.current_frame,
        "fps": graph.settings.fps,
        "width": graph.settings.width,
        "height": graph.settings.height,
        "pixel_aspect": graph.settings.pixel_aspect,
        "modified": graph.is_modified(),
    }))
}

pub fn list_nodes(graph: &Graph, params: &Params) -> Result<Value> {
    let filter_type = opt_str(params, "filter_type")?;
    let selected_only = opt_bool(params, "selected_only", false)?;

    let nodes: Vec<Value> = graph
        .nodes()
        .iter()
        .filter(|node| !selected_only || node.selected)
        .filter(|node| filter_type.map_or(true, |class| node.class == class))
        .map(|node| {
            json!({
                "name": node.name,
                "class": node.class,
                "xpos": node.xpos,
                "ypos": node.ypos,
                "selected": node.selected,
            })
        })
        .collect();

    Ok(json!({"count": nodes.len(), "nodes": nodes}))
}

pub fn auto_layout_nodes(graph: &mut Graph, params: &Params) -> Result<Value> {
    let selected_only = opt_bool(params, "selected_only", false)?;
    let layout_type = opt_str(params, "layout_type")?.unwrap_or("vertical");

    let names: Vec<String> = graph
        .nodes()
        .iter()
        .filter(|node| !selected_only || node.selected)
        .map(|node| node.name.clone())
        .collect();
    if names.is_empty() {
        return Err(BridgeError::Host("no nodes to layout".to_string()));
    }

    match layout_type {
        "vertical" => {
            for (row, name) in names.iter().enumerate() {
                if let Some(node) = graph.node_mut(name) {
                    node.xpos = 0;
                    node.ypos = row as i64 * SPACING_Y;
                }
            }
        }
        "horizontal" => {
            for (col, name) in names.iter().enumerate() {
                if let Some(node) = graph.node_mut(name) {
                    node.xpos = col as i64 * SPACING_X;
                    node.ypos = 0;
                }
            }
        }
        "grid" => {
            let columns = (names.len() as f64).sqrt().ceil().max(1.0) as usize;
            for (index, name) in names.iter().enumerate() {
                if let Some(node) = graph.node_mut(name) {
                    node.xpos = (index % columns) as i64 * SPACING_X;
                    node.ypos = (index / columns) as i64 * SPACING_Y;
                }
            }
        }
        "tree" => layout_tree(graph, &names),
        other => {
            return Err(BridgeError::invalid_parameter(
                "layout_type",
                format!("'{other}' is not one of vertical, horizontal, grid, tree"),
            ))
        }
    }

    Ok(json!({"layout_type": layout_type, "nodes_arranged": names.len()}))
}

/// Ranks each node by its longest upstream chain within the set, then
/// places each rank on its own row.
fn layout_tree(graph: &mut Graph, names: &[String]) {
    let mut depths: BTreeMap<String, usize> = names.iter().map(|n| (n.clone(), 0)).collect();
    // Fixed-point over the small set; the pass cap breaks cycles.
    for _ in 0..names.len() {
        let mut changed = false;
        for name in names {
            let Some(node) = graph.node(name) else { continue };
            let depth = node
                .inputs
                .iter()
                .flatten()
                .filter_map(|input| depths.get(input.as_str()))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            if depths.get(name) != Some(&depth) {
                depths.insert(name.clone(), depth);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let mut columns: BTreeMap<usize, i64> = BTreeMap::new();
    for name in names {
        let depth = depths.get(name).copied().unwrap_or(0);
        let column = columns.entry(depth).or_insert(0);
        if let Some(node) = graph.node_mut(name) {
            node.xpos = *column * SPACING_X;
            node.ypos = depth as i64 * SPACING_Y;
        }
        *column += 1;
    }
}

pub fn create_group(graph: &mut Graph, params: &Params) -> Result<Value> {
    let name = require_str(params, "name")?;
    let node_names = require_str_list(params, "node_names")?;
    let color = opt_i64(params, "color", -1)?;

    let members: Vec<String> = node_names
        .into_iter()
        .filter(|name| graph.contains(name))
        .collect();
    if members.is_empty() {
        return Err(BridgeError::Host(
            "no valid nodes found to group".to_string(),
        ));
    }

    // Members move inside the group: they leave the top-level graph and
    // are carried on the group node itself.
    let fragment = graph.fragment(&members)?;
    for member in &members {
        graph.remove(member)?;
    }

    let group = graph.create("Group", Some(name))?;
    group.set_knob("members", serde_json::to_value(&fragment)?);
    if color >= 0 {
        group.set_knob("tile_color", json!(color));
    }

    Ok(json!({"group_name": name, "nodes_grouped": members.len()}))
}

pub fn create_live_group(graph: &mut Graph, params: &Params) -> Result<Value> {
    let name = require_str(params, "name")?;
    let node_names = require_str_list(params, "node_names")?;
    let file_path = require_str(params, "file_path")?;
    let auto_publish = opt_bool(params, "auto_publish", false)?;

    let members: Vec<String> = node_names
        .into_iter()
        .filter(|name| graph.contains(name))
        .collect();
    if members.is_empty() {
        return Err(BridgeError::Host(
            "no valid nodes found for live group".to_string(),
        ));
    }

    let fragment = graph.fragment(&members)?;
    let path = Path::new(file_path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string_pretty(&fragment)?)?;

    for member in &members {
        graph.remove(member)?;
    }

    let group = graph.create("LiveGroup", Some(name))?;
    group.set_knob("file", json!(file_path));
    group.set_knob("auto_publish", json!(auto_publish));
    group.set_knob("members", serde_json::to_value(&fragment)?);

    Ok(json!({
        "livegroup_name": name,
        "file_path": file_path,
        "nodes_included": members.len(),
    }))
}
