//! In-memory model of the host application's node graph.
//!
//! The executor mutates this model in place of the host's scripting API:
//! nodes carry a class, a unique name, a position, a selection flag, a
//! knob map and input slots. The whole graph serializes to JSON for
//! `save_script`/`load_script` and for template fragments.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BridgeError, Result};

/// Horizontal spacing used by layout operations.
pub const SPACING_X: i64 = 120;
/// Vertical spacing used by layout operations.
pub const SPACING_Y: i64 = 80;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub name: String,
    pub class: String,
    #[serde(default)]
    pub xpos: i64,
    #[serde(default)]
    pub ypos: i64,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub knobs: BTreeMap<String, Value>,
    /// Input slots by index; `None` marks a disconnected slot.
    #[serde(default)]
    pub inputs: Vec<Option<String>>,
}

impl Node {
    fn new(class: &str, name: String) -> Self {
        Self {
            name,
            class: class.to_string(),
            xpos: 0,
            ypos: 0,
            selected: false,
            knobs: BTreeMap::new(),
            inputs: Vec::new(),
        }
    }

    pub fn set_knob(&mut self, knob: &str, value: Value) {
        self.knobs.insert(knob.to_string(), value);
    }

    pub fn knob(&self, knob: &str) -> Option<&Value> {
        self.knobs.get(knob)
    }

    pub fn connected_inputs(&self) -> usize {
        self.inputs.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Input arity per node class, mirroring the host's node definitions for
/// the classes the relay arranges.
pub fn max_inputs(class: &str) -> usize {
    match class {
        "Read" | "Constant" | "CheckerBoard" | "Camera3" | "Axis3" => 0,
        "Merge2" => 3,
        "Scene" => 8,
        "ScanlineRender" => 3,
        "DeepMerge2" | "CopyCat" | "VectorBlur2" => 2,
        "Viewer" => 10,
        _ => 1,
    }
}

fn default_first_frame() -> i64 {
    1
}

fn default_last_frame() -> i64 {
    100
}

fn default_fps() -> f64 {
    24.0
}

fn default_width() -> i64 {
    1920
}

fn default_height() -> i64 {
    1080
}

fn default_pixel_aspect() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectSettings {
    #[serde(default = "default_first_frame")]
    pub first_frame: i64,
    #[serde(default = "default_last_frame")]
    pub last_frame: i64,
    #[serde(default = "default_fps")]
    pub fps: f64,
    #[serde(default = "default_width")]
    pub width: i64,
    #[serde(default = "default_height")]
    pub height: i64,
    #[serde(default = "default_pixel_aspect")]
    pub pixel_aspect: f64,
    #[serde(default)]
    pub proxy: bool,
    #[serde(default)]
    pub color_management: BTreeMap<String, String>,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            first_frame: default_first_frame(),
            last_frame: default_last_frame(),
            fps: default_fps(),
            width: default_width(),
            height: default_height(),
            pixel_aspect: default_pixel_aspect(),
            proxy: false,
            color_management: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default = "Graph::default_script_name")]
    pub script_name: String,
    #[serde(default)]
    pub settings: ProjectSettings,
    #[serde(default = "default_first_frame")]
    pub current_frame: i64,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(skip)]
    modified: bool,
    #[serde(skip)]
    pub playing: bool,
}

impl Default for Graph {
    fn default() -> Self {
        Self {
            script_name: Self::default_script_name(),
            settings: ProjectSettings::default(),
            current_frame: default_first_frame(),
            nodes: Vec::new(),
            modified: false,
            playing: false,
        }
    }
}

impl Graph {
    fn default_script_name() -> String {
        "Untitled".to_string()
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.modified = true;
        self.nodes.iter_mut().find(|node| node.name == name)
    }

    pub fn require(&self, name: &str) -> Result<&Node> {
        self.node(name)
            .ok_or_else(|| BridgeError::NodeNotFound(name.to_string()))
    }

    pub fn require_mut(&mut self, name: &str) -> Result<&mut Node> {
        self.node_mut(name)
            .ok_or_else(|| BridgeError::NodeNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.node(name).is_some()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_saved(&mut self) {
        self.modified = false;
    }

    /// Creates a node, allocating a `Class1`-style name when none is given.
    /// An explicit name that collides with an existing node is an error.
    pub fn create(&mut self, class: &str, name: Option<&str>) -> Result<&mut Node> {
        let name = match name {
            Some(explicit) => {
                if self.contains(explicit) {
                    return Err(BridgeError::Host(format!(
                        "node '{explicit}' already exists"
                    )));
                }
                explicit.to_string()
            }
            None => self.unique_name(class),
        };
        self.nodes.push(Node::new(class, name));
        self.modified = true;
        let index = self.nodes.len() - 1;
        Ok(&mut self.nodes[index])
    }

    pub fn unique_name(&self, class: &str) -> String {
        let mut counter = 1;
        loop {
            let candidate = format!("{class}{counter}");
            if !self.contains(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Wires `output` into input slot `index` of `input`.
    pub fn connect(&mut self, output: &str, input: &str, index: usize) -> Result<()> {
        self.require(output)?;
        let class = self.require(input)?.class.clone();
        let limit = max_inputs(&class);
        if index >= limit {
            return Err(BridgeError::invalid_parameter(
                "input_index",
                format!("{class} accepts at most {limit} inputs"),
            ));
        }
        let output = output.to_string();
        let node = self.require_mut(input)?;
        if node.inputs.len() <= index {
            node.inputs.resize(index + 1, None);
        }
        node.inputs[index] = Some(output);
        Ok(())
    }

    /// Renames a node and rewires every input slot that referenced it.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        if from == to {
            return Ok(());
        }
        if self.contains(to) {
            return Err(BridgeError::Host(format!("node '{to}' already exists")));
        }
        self.require_mut(from)?.name = to.to_string();
        for node in &mut self.nodes {
            for slot in &mut node.inputs {
                if slot.as_deref() == Some(from) {
                    *slot = Some(to.to_string());
                }
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Node> {
        let position = self
            .nodes
            .iter()
            .position(|node| node.name == name)
            .ok_or_else(|| BridgeError::NodeNotFound(name.to_string()))?;
        let removed = self.nodes.remove(position);
        // Drop dangling input references to the removed node.
        for node in &mut self.nodes {
            for slot in &mut node.inputs {
                if slot.as_deref() == Some(name) {
                    *slot = None;
                }
            }
        }
        self.modified = true;
        Ok(removed)
    }

    pub fn selected_nodes(&self) -> Vec<&Node> {
        self.nodes.iter().filter(|node| node.selected).collect()
    }

    pub fn clear_selection(&mut self) {
        for node in &mut self.nodes {
            node.selected = false;
        }
    }

    pub fn select(&mut self, names: &[String]) -> Result<()> {
        for name in names {
            self.require(name)?;
        }
        self.clear_selection();
        for node in &mut self.nodes {
            if names.iter().any(|name| *name == node.name) {
                node.selected = true;
            }
        }
        Ok(())
    }

    /// Clones the named nodes as a standalone fragment, dropping input
    /// references that point outside the set.
    pub fn fragment(&self, names: &[String]) -> Result<Vec<Node>> {
        let set: BTreeSet<&str> = names.iter().map(String::as_str).collect();
        let mut nodes = Vec::with_capacity(names.len());
        for name in names {
            let mut node = self.require(name)?.clone();
            for slot in &mut node.inputs {
                if let Some(input) = slot.as_deref() {
                    if !set.contains(input) {
                        *slot = None;
                    }
                }
            }
            node.selected = false;
            nodes.push(node);
        }
        Ok(nodes)
    }

    /// Pastes a fragment, renaming nodes whose names are taken and keeping
    /// intra-fragment connections intact. Positions shift so the top-left
    /// corner of the fragment lands at `(x, y)`.
    pub fn paste(&mut self, fragment: Vec<Node>, x: i64, y: i64) -> Result<Vec<String>> {
        if fragment.is_empty() {
            return Ok(Vec::new());
        }
        let min_x = fragment.iter().map(|node| node.xpos).min().unwrap_or(0);
        let min_y = fragment.iter().map(|node| node.ypos).min().unwrap_or(0);

        let mut renames: BTreeMap<String, String> = BTreeMap::new();
        for node in &fragment {
            let target = if self.contains(&node.name) || renames.values().any(|n| *n == node.name) {
                self.unique_name(&node.class)
            } else {
                node.name.clone()
            };
            renames.insert(node.name.clone(), target);
        }

        let mut pasted = Vec::with_capacity(fragment.len());
        for mut node in fragment {
            let new_name = renames
                .get(&node.name)
                .cloned()
                .unwrap_or_else(|| node.name.clone());
            node.name = new_name.clone();
            node.xpos = node.xpos - min_x + x;
            node.ypos = node.ypos - min_y + y;
            for slot in &mut node.inputs {
                if let Some(input) = slot.clone() {
                    *slot = Some(renames.get(&input).cloned().unwrap_or(input));
                }
            }
            self.nodes.push(node);
            pasted.push(new_name);
        }
        self.modified = true;
        Ok(pasted)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_allocates_sequential_names() {
        let mut graph = Graph::default();
        assert_eq!(graph.create("Blur", None).unwrap().name, "Blur1");
        assert_eq!(graph.create("Blur", None).unwrap().name, "Blur2");
        assert_eq!(graph.create("Grade", None).unwrap().name, "Grade1");
    }

    #[test]
    fn create_rejects_duplicate_explicit_name() {
        let mut graph = Graph::default();
        graph.create("Blur", Some("Soften")).unwrap();
        assert!(graph.create("Grade", Some("Soften")).is_err());
    }

    #[test]
    fn connect_respects_input_arity() {
        let mut graph = Graph::default();
        graph.create("Read", Some("Plate")).unwrap();
        graph.create("Blur", Some("Soften")).unwrap();
        graph.connect("Plate", "Soften", 0).unwrap();
        assert_eq!(
            graph.node("Soften").unwrap().inputs,
            vec![Some("Plate".to_string())]
        );
        assert!(graph.connect("Plate", "Soften", 1).is_err());
    }

    #[test]
    fn remove_clears_dangling_inputs() {
        let mut graph = Graph::default();
        graph.create("Read", Some("Plate")).unwrap();
        graph.create("Blur", Some("Soften")).unwrap();
        graph.connect("Plate", "Soften", 0).unwrap();
        graph.remove("Plate").unwrap();
        assert_eq!(graph.node("Soften").unwrap().inputs, vec![None]);
    }

    #[test]
    fn fragment_strips_external_inputs() {
        let mut graph = Graph::default();
        graph.create("Read", Some("Plate")).unwrap();
        graph.create("Blur", Some("Soften")).unwrap();
        graph.create("Grade", Some("Lift")).unwrap();
        graph.connect("Plate", "Soften", 0).unwrap();
        graph.connect("Soften", "Lift", 0).unwrap();

        let fragment = graph
            .fragment(&["Soften".to_string(), "Lift".to_string()])
            .unwrap();
        assert_eq!(fragment[0].inputs, vec![None]);
        assert_eq!(fragment[1].inputs, vec![Some("Soften".to_string())]);
    }

    #[test]
    fn paste_renames_collisions_and_remaps_inputs() {
        let mut graph = Graph::default();
        graph.create("Blur", Some("Blur1")).unwrap();

        let mut first = Node::new("Blur", "Blur1".to_string());
        first.xpos = 10;
        first.ypos = 20;
        let mut second = Node::new("Grade", "Grade1".to_string());
        second.xpos = 10;
        second.ypos = 100;
        second.inputs = vec![Some("Blur1".to_string())];

        let pasted = graph.paste(vec![first, second], 0, 0).unwrap();
        assert_eq!(pasted, vec!["Blur2".to_string(), "Grade1".to_string()]);
        assert_eq!(
            graph.node("Grade1").unwrap().inputs,
            vec![Some("Blur2".to_string())]
        );
        assert_eq!(graph.node("Blur2").unwrap().xpos, 0);
        assert_eq!(graph.node("Grade1").unwrap().ypos, 80);
    }

    #[test]
    fn script_round_trips_through_json() {
        let mut graph = Graph::default();
        let node = graph.create("Blur", Some("Soften")).unwrap();
        node.set_knob("size", json!(4.5));
        graph.settings.fps = 25.0;

        let encoded = graph.to_json().unwrap();
        let decoded = Graph::from_json(&encoded).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded.node("Soften").unwrap().knob("size"), Some(&json!(4.5)));
        assert_eq!(decoded.settings.fps, 25.0);
    }
}
