//! Project settings, script persistence, batch processing, rendering and
//! viewer playback.

use std::{fs, path::Path};

use serde_json::{json, Value};

use super::{opt_bool, opt_i64, opt_object, opt_str, param, require_str, Params};
use crate::{
    error::{BridgeError, Result},
    graph::Graph,
};

pub fn set_project_settings(graph: &mut Graph, params: &Params) -> Result<Value> {
    let mut applied = Vec::new();

    if let Some(range) = opt_object(params, "frame_range")? {
        let first = opt_i64(range, "first", graph.settings.first_frame)?;
        let last = opt_i64(range, "last", graph.settings.last_frame)?;
        graph.settings.first_frame = first;
        graph.settings.last_frame = last;
        applied.push(format!("Frame range: {first}-{last}"));
    }

    if let Some(resolution) = opt_object(params, "resolution")? {
        let width = opt_i64(resolution, "width", graph.settings.width)?;
        let height = opt_i64(resolution, "height", graph.settings.height)?;
        graph.settings.width = width;
        graph.settings.height = height;
        if let Some(aspect) = param(resolution, "pixel_aspect") {
            graph.settings.pixel_aspect = aspect.as_f64().ok_or_else(|| {
                BridgeError::invalid_parameter("pixel_aspect", "expected a number")
            })?;
        }
        applied.push(format!("Resolution: {width}x{height}"));
    }

    if let Some(fps) = param(params, "fps") {
        let fps = fps
            .as_f64()
            .ok_or_else(|| BridgeError::invalid_parameter("fps", "expected a number"))?;
        graph.settings.fps = fps;
        applied.push(format!("FPS: {fps}"));
    }

    if let Some(color) = opt_object(params, "color_management")? {
        for (key, value) in color {
            let value = value.as_str().ok_or_else(|| {
                BridgeError::invalid_parameter("color_management", "expected string values")
            })?;
            graph
                .settings
                .color_management
                .insert(key.clone(), value.to_string());
            applied.push(format!("Color: {key}={value}"));
        }
    }

    Ok(json!({"settings_applied": applied}))
}

pub fn load_script(graph: &mut Graph, params: &Params) -> Result<Value> {
    let file_path = require_str(params, "file_path")?;
    let path = Path::new(file_path);
    if !path.is_file() {
        return Err(BridgeError::Host(format!(
            "script file not found: {file_path}"
        )));
    }
    let contents = fs::read_to_string(path)?;
    let mut loaded = Graph::from_json(&contents)?;
    loaded.script_name = file_path.to_string();
    let node_count = loaded.len();
    *graph = loaded;
    graph.mark_saved();

    Ok(json!({"loaded_nodes": node_count, "script_path": file_path}))
}

pub fn save_script(graph: &mut Graph, params: &Params) -> Result<Value> {
    let file_path = require_str(params, "file_path")?;
    let selected_only = opt_bool(params, "selected_only", false)?;
    let path = Path::new(file_path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let saved_nodes = if selected_only {
        let names: Vec<String> = graph
            .selected_nodes()
            .iter()
            .map(|node| node.name.clone())
            .collect();
        if names.is_empty() {
            return Err(BridgeError::Host("no nodes selected".to_string()));
        }
        let fragment = graph.fragment(&names)?;
        fs::write(path, serde_json::to_string_pretty(&fragment)?)?;
        names.len()
    } else {
        fs::write(path, graph.to_json()?)?;
        graph.script_name = file_path.to_string();
        graph.mark_saved();
        graph.len()
    };

    Ok(json!({"saved_nodes": saved_nodes, "script_path": file_path}))
}

pub fn batch_process(graph: &mut Graph, params: &Params) -> Result<Value> {
    let input_directory = require_str(params, "input_directory")?;
    let output_directory = require_str(params, "output_directory")?;
    let file_pattern = opt_str(params, "file_pattern")?.unwrap_or("*.exr");
    let frame_range = opt_str(params, "frame_range")?;

    let input_dir = Path::new(input_directory);
    if !input_dir.is_dir() {
        return Err(BridgeError::Host(format!(
            "input directory not found: {input_directory}"
        )));
    }
    fs::create_dir_all(output_directory)?;

    let mut files = Vec::new();
    for entry in fs::read_dir(input_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if matches_pattern(name, file_pattern) {
                files.push(name.to_string());
            }
        }
    }
    files.sort();
    if files.is_empty() {
        return Err(BridgeError::Host(format!(
            "no files found matching pattern: {file_pattern}"
        )));
    }

    let frames = match frame_range {
        Some(spec) => parse_frame_range(spec)?,
        None => (graph.settings.first_frame, graph.settings.last_frame),
    };

    let mut processed = 0usize;
    let mut failed = 0usize;
    for file in &files {
        match process_one(graph, input_dir, output_directory, file, frames) {
            Ok(()) => processed += 1,
            Err(err) => {
                tracing::warn!(file, error = %err, "batch item failed");
                failed += 1;
            }
        }
    }

    Ok(json!({
        "processed_files": processed,
        "failed_files": failed,
        "total_files": files.len(),
    }))
}

/// Builds a transient Read/Write pair for one file and tears it down
/// again, leaving the script as it was.
fn process_one(
    graph: &mut Graph,
    input_dir: &Path,
    output_directory: &str,
    file: &str,
    frames: (i64, i64),
) -> Result<()> {
    let read = {
        let node = graph.create("Read", None)?;
        node.set_knob(
            "file",
            json!(input_dir.join(file).to_string_lossy().into_owned()),
        );
        node.set_knob("first", json!(frames.0));
        node.set_knob("last", json!(frames.1));
        node.name.clone()
    };
    let write = {
        let node = graph.create("Write", None)?;
        node.set_knob(
            "file",
            json!(Path::new(output_directory)
                .join(file)
                .to_string_lossy()
                .into_owned()),
        );
        node.name.clone()
    };
    let result = graph.connect(&read, &write, 0);
    graph.remove(&write)?;
    graph.remove(&read)?;
    result
}

fn matches_pattern(name: &str, pattern: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.split_once('*') {
        Some((prefix, suffix)) => {
            name.len() >= prefix.len() + suffix.len()
                && name.starts_with(prefix)
                && name.ends_with(suffix)
        }
        None => name == pattern,
    }
}

/// Accepts `"first-last"`, a comma list of frames, or a single frame.
fn parse_frame_range(spec: &str) -> Result<(i64, i64)> {
    let invalid = || {
        BridgeError::invalid_parameter(
            "frame_range",
            format!("'{spec}' is not a frame range"),
        )
    };
    let spec = spec.trim();
    if let Some((first, last)) = spec.split_once('-') {
        let first = first.trim().parse::<i64>().map_err(|_| invalid())?;
        let last = last.trim().parse::<i64>().map_err(|_| invalid())?;
        if last < first {
            return Err(invalid());
        }
        return Ok((first, last));
    }
    if spec.contains(',') {
        let mut frames = Vec::new();
        for part in spec.split(',') {
            frames.push(part.trim().parse::<i64>().map_err(|_| invalid())?);
        }
        let first = frames.iter().min().copied().ok_or_else(invalid)?;
        let last = frames.iter().max().copied().ok_or_else(invalid)?;
        return Ok((first, last));
    }
    let frame = spec.parse::<i64>().map_err(|_| invalid())?;
    Ok((frame, frame))
}

pub fn render(graph: &mut Graph, params: &Params) -> Result<Value> {
    let write_node = require_str(params, "write_node_name")?;
    let frame_range = opt_str(params, "frame_range")?;
    let proxy_mode = opt_bool(params, "proxy_mode", graph.settings.proxy)?;
    let use_gpu = opt_bool(params, "use_gpu", true)?;

    let frames = match frame_range {
        Some(spec) => parse_frame_range(spec)?,
        None => (graph.settings.first_frame, graph.settings.last_frame),
    };

    let node = graph.require_mut(write_node)?;
    node.set_knob("proxy", json!(proxy_mode));
    node.set_knob("use_gpu", json!(use_gpu));
    let output_path = node
        .knob("file")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(json!({
        "write_node": write_node,
        "frame_range": format!("{}-{}", frames.0, frames.1),
        "frames_rendered": frames.1 - frames.0 + 1,
        "output_path": output_path,
        "proxy_mode": proxy_mode,
    }))
}

pub fn viewer_playback(graph: &mut Graph, params: &Params) -> Result<Value> {
    let action = require_str(params, "action")?;
    if let Some(start) = param(params, "start_frame").and_then(Value::as_i64) {
        graph.settings.first_frame = start;
    }
    if let Some(end) = param(params, "end_frame").and_then(Value::as_i64) {
        graph.settings.last_frame = end;
    }
    if let Some(fps) = param(params, "fps").and_then(Value::as_f64) {
        graph.settings.fps = fps;
    }

    match action {
        "play" => graph.playing = true,
        "stop" | "pause" => graph.playing = false,
        "step_forward" => graph.current_frame += 1,
        "step_back" => graph.current_frame -= 1,
        "goto" => {
            graph.current_frame = opt_i64(params, "goto_frame", graph.current_frame)?;
        }
        other => {
            return Err(BridgeError::invalid_parameter(
                "action",
                format!("'{other}' is not a playback action"),
            ))
        }
    }

    Ok(json!({
        "action": action,
        "current_frame": graph.current_frame,
        "playback_state": if graph.playing { "playing" } else { "stopped" },
    }))
}
