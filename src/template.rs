//! Flat-file store for named node-graph fragments.
//!
//! Templates live under `<data_dir>/templates/<category>/<name>.json` and
//! carry the fragment nodes plus category, description and saved-at
//! metadata.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{BridgeError, Result},
    graph::Node,
};

pub const DEFAULT_CATEGORY: &str = "Custom";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateFile {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    pub saved_at: DateTime<Utc>,
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateSummary {
    pub name: String,
    pub category: String,
    pub node_count: usize,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, template: &TemplateFile) -> Result<PathBuf> {
        validate_name(&template.name)?;
        validate_name(&template.category)?;
        let category_dir = self.dir.join(&template.category);
        fs::create_dir_all(&category_dir)?;
        let path = category_dir.join(format!("{}.json", template.name));
        let contents = serde_json::to_string_pretty(template)?;
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Looks a template up by name across all categories.
    pub fn load(&self, name: &str) -> Result<TemplateFile> {
        validate_name(name)?;
        let path = self
            .find(name)?
            .ok_or_else(|| BridgeError::TemplateNotFound(name.to_string()))?;
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let path = self
            .find(name)?
            .ok_or_else(|| BridgeError::TemplateNotFound(name.to_string()))?;
        fs::remove_file(path)?;
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<TemplateSummary>> {
        let mut summaries = Vec::new();
        for path in self.template_paths()? {
            let contents = fs::read_to_string(&path)?;
            let template: TemplateFile = serde_json::from_str(&contents)?;
            summaries.push(TemplateSummary {
                name: template.name,
                category: template.category,
                node_count: template.nodes.len(),
                saved_at: template.saved_at,
            });
        }
        summaries.sort_by(|a, b| (&a.category, &a.name).cmp(&(&b.category, &b.name)));
        Ok(summaries)
    }

    fn find(&self, name: &str) -> Result<Option<PathBuf>> {
        let file_name = format!("{name}.json");
        for path in self.template_paths()? {
            if path.file_name().and_then(|n| n.to_str()) == Some(file_name.as_str()) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    fn template_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let category = entry?.path();
            if !category.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&category)? {
                let path = entry?.path();
                if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                    paths.push(path);
                }
            }
        }
        Ok(paths)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(BridgeError::invalid_parameter(
            "template_name",
            format!("'{name}' is not a valid template name"),
        ));
    }
    Ok(())
}
