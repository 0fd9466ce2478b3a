//! Immutable operation registry.
//!
//! The registry is built once at startup and shared by reference with the
//! dispatcher. Each entry names an operation and the parameters a request
//! must carry before the host executor is invoked; everything else a
//! handler accepts is optional and defaulted host-side.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy)]
pub struct OperationSpec {
    name: &'static str,
    required: &'static [&'static str],
}

impl OperationSpec {
    const fn new(name: &'static str, required: &'static [&'static str]) -> Self {
        Self { name, required }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn required_params(&self) -> &'static [&'static str] {
        self.required
    }
}

#[derive(Debug)]
pub struct Registry {
    entries: BTreeMap<&'static str, OperationSpec>,
}

const OPERATIONS: &[OperationSpec] = &[
    // Basic node operations
    OperationSpec::new("create_node", &["node_type"]),
    OperationSpec::new("connect_nodes", &["output_node", "input_node"]),
    OperationSpec::new("set_knob_value", &["node_name", "knob_name", "value"]),
    OperationSpec::new("get_node_info", &["node_name"]),
    OperationSpec::new("get_script_info", &[]),
    OperationSpec::new("list_nodes", &[]),
    // Camera tracking
    OperationSpec::new("create_camera_tracker", &["source_name"]),
    OperationSpec::new("solve_camera_track", &["camera_tracker_node"]),
    OperationSpec::new("create_3d_scene", &[]),
    // Deep compositing
    OperationSpec::new("setup_deep_pipeline", &["input_nodes"]),
    // Keying and compositing
    OperationSpec::new("setup_keyer", &["input_node_name"]),
    OperationSpec::new("setup_basic_comp", &["plate_node"]),
    OperationSpec::new("setup_motion_blur", &["input_node_name"]),
    // Machine learning
    OperationSpec::new("setup_copycat", &["training_input_node", "training_output_node"]),
    OperationSpec::new("train_copycat_model", &["copycat_node_name"]),
    // Templates
    OperationSpec::new("load_template", &["template_name"]),
    OperationSpec::new("save_template", &["template_name", "node_names"]),
    // Project and script management
    OperationSpec::new("set_project_settings", &[]),
    OperationSpec::new("load_script", &["file_path"]),
    OperationSpec::new("save_script", &["file_path"]),
    OperationSpec::new("batch_process", &["input_directory", "output_directory"]),
    // Rendering and playback
    OperationSpec::new("render", &["write_node_name"]),
    OperationSpec::new("viewer_playback", &["action"]),
    // Utilities
    OperationSpec::new("auto_layout_nodes", &[]),
    OperationSpec::new("create_group", &["name", "node_names"]),
    OperationSpec::new("create_live_group", &["name", "node_names", "file_path"]),
];

impl Registry {
    /// Builds the full operation table the relay exposes.
    pub fn standard() -> Self {
        let mut entries = BTreeMap::new();
        for spec in OPERATIONS {
            entries.insert(spec.name, *spec);
        }
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&OperationSpec> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_core_operations() {
        let registry = Registry::standard();
        for name in ["create_node", "connect_nodes", "load_template", "render"] {
            assert!(registry.contains(name), "missing operation {name}");
        }
        assert!(!registry.contains("run_python_script"));
    }

    #[test]
    fn required_params_are_exposed() {
        let registry = Registry::standard();
        let spec = registry.get("set_knob_value").unwrap();
        assert_eq!(spec.required_params(), &["node_name", "knob_name", "value"]);
    }

    #[test]
    fn operation_names_are_unique() {
        assert_eq!(Registry::standard().len(), OPERATIONS.len());
    }
}
