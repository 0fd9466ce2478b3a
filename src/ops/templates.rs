//! Template operations: snapshotting graph fragments to the template
//! store and pasting them back.

use chrono::Utc;
use serde_json::{json, Value};

use super::{opt_i64, opt_object, opt_str, require_str, require_str_list, Params};
use crate::{
    error::Result,
    executor::HostSession,
    template::{TemplateFile, DEFAULT_CATEGORY},
};

pub fn save_template(session: &mut HostSession, params: &Params) -> Result<Value> {
    let template_name = require_str(params, "template_name")?;
    let node_names = require_str_list(params, "node_names")?;
    let category = opt_str(params, "category")?.unwrap_or(DEFAULT_CATEGORY);
    let description = opt_str(params, "description")?.map(str::to_string);

    let nodes = session.graph.fragment(&node_names)?;
    let template = TemplateFile {
        name: template_name.to_string(),
        category: category.to_string(),
        description,
        saved_at: Utc::now(),
        nodes,
    };
    let path = session.templates.save(&template)?;

    Ok(json!({
        "template_name": template_name,
        "category": category,
        "nodes_saved": template.nodes.len(),
        "template_path": path.to_string_lossy(),
    }))
}

pub fn load_template(session: &mut HostSession, params: &Params) -> Result<Value> {
    let template_name = require_str(params, "template_name")?;
    let position = opt_object(params, "position")?.cloned().unwrap_or_default();
    let x = opt_i64(&position, "x", 0)?;
    let y = opt_i64(&position, "y", 0)?;
    let overrides = opt_object(params, "parameters")?.cloned();

    let template = session.templates.load(template_name)?;
    let pasted = session.graph.paste(template.nodes, x, y)?;

    // Per-node knob overrides are keyed by the pasted node names.
    if let Some(overrides) = overrides {
        for name in &pasted {
            let Some(Value::Object(knobs)) = overrides.get(name) else {
                continue;
            };
            if let Some(node) = session.graph.node_mut(name) {
                for (knob, value) in knobs {
                    node.set_knob(knob, value.clone());
                }
            }
        }
    }

    Ok(json!({
        "template_name": template_name,
        "loaded_nodes": pasted,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateStore;
    use serde_json::json;
    use tempfile::tempdir;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => Params::new(),
        }
    }

    fn session(dir: &std::path::Path) -> HostSession {
        HostSession::new(TemplateStore::open(dir.join("templates")).unwrap())
    }

    #[test]
    fn save_then_load_pastes_the_fragment() {
        let dir = tempdir().unwrap();
        let mut session = session(dir.path());
        session.graph.create("Blur", Some("Soften")).unwrap();
        session.graph.create("Grade", Some("Lift")).unwrap();
        session.graph.connect("Soften", "Lift", 0).unwrap();

        let saved = save_template(
            &mut session,
            &params(json!({
                "template_name": "glow",
                "node_names": ["Soften", "Lift"],
                "category": "Looks",
            })),
        )
        .unwrap();
        assert_eq!(saved["nodes_saved"], json!(2));

        let loaded = load_template(
            &mut session,
            &params(json!({
                "template_name": "glow",
                "position": {"x": 400, "y": 0},
                "parameters": {"Blur1": {"size": 12}},
            })),
        )
        .unwrap();

        // Original names were taken, so the paste renamed both nodes.
        let pasted = loaded["loaded_nodes"].as_array().unwrap();
        assert_eq!(pasted.len(), 2);
        assert_eq!(session.graph.len(), 4);
        assert_eq!(
            session.graph.node("Blur1").unwrap().knob("size"),
            Some(&json!(12))
        );
    }

    #[test]
    fn loading_an_unknown_template_is_an_error() {
        let dir = tempdir().unwrap();
        let mut session = session(dir.path());
        let err = load_template(&mut session, &params(json!({"template_name": "ghost"})))
            .unwrap_err();
        assert!(err.to_string().contains("template 'ghost' not found"));
    }
}
