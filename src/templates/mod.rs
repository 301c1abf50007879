//! Page templates
//!
//! Templates are compiled into the binary from `templates/`. A directory
//! configured as `templates.path` may override any of them by file name;
//! overrides are read once at startup.

use rust_embed::RustEmbed;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera};

mod error;

pub use error::TemplateError;

#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Default avatar size in pixels for the `gravatar` filter
const GRAVATAR_SIZE: u64 = 40;

pub struct TemplateEngine {
    tera: Tera,
    override_path: Option<PathBuf>,
}

impl TemplateEngine {
    /// Load the embedded templates, then any overrides from `override_path`
    pub fn new(override_path: Option<&Path>) -> Result<Self, TemplateError> {
        let mut templates: BTreeMap<String, String> = BTreeMap::new();

        for name in EmbeddedTemplates::iter() {
            let Some(file) = EmbeddedTemplates::get(&name) else {
                continue;
            };
            let content = String::from_utf8(file.data.into_owned())
                .map_err(|_| TemplateError::Encoding(name.to_string()))?;
            templates.insert(name.to_string(), content);
        }

        if let Some(dir) = override_path {
            if dir.is_dir() {
                let mut overrides = Vec::new();
                collect_templates(dir, dir, &mut overrides)?;
                for (name, content) in overrides {
                    tracing::info!("Template '{}' overridden from {}", name, dir.display());
                    templates.insert(name, content);
                }
            } else {
                tracing::warn!(
                    "Template override directory {} does not exist, using built-in templates",
                    dir.display()
                );
            }
        }

        let mut tera = Tera::default();
        tera.register_filter("gravatar", gravatar_filter);
        tera.add_raw_templates(templates.into_iter().collect::<Vec<_>>())
            .map_err(|e| TemplateError::TemplateError(describe(&e)))?;

        Ok(Self {
            tera,
            override_path: override_path.map(Path::to_path_buf),
        })
    }

    pub fn override_path(&self) -> Option<&Path> {
        self.override_path.as_deref()
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tera.get_template_names().map(str::to_string).collect();
        names.sort();
        names
    }

    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String, TemplateError> {
        if !self.has_template(template) {
            return Err(TemplateError::NotFound(template.to_string()));
        }
        self.tera.render(template, context).map_err(|e| {
            TemplateError::TemplateError(format!("Failed to render '{}': {}", template, describe(&e)))
        })
    }

    /// Render `template`, falling back to `error.html` and then to a bare page
    pub fn render_with_fallback(&self, template: &str, context: &TeraContext) -> String {
        match self.render(template, context) {
            Ok(html) => html,
            Err(e) => {
                tracing::error!("{}", e);
                let mut error_context = context.clone();
                error_context.insert("error_message", "The page could not be displayed.");
                match self.render("error.html", &error_context) {
                    Ok(html) => html,
                    Err(_) => simple_error_page("The page could not be displayed."),
                }
            }
        }
    }
}

/// Minimal page used when no template can render
pub fn simple_error_page(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>The News Harbor</title></head>
<body>
    <h1>Something went wrong</h1>
    <p>{}</p>
    <p><a href="/">Back to the front page</a></p>
</body>
</html>"#,
        escape_html(message)
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Error message with its source chain
fn describe(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

fn collect_templates(
    base: &Path,
    current: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<(), TemplateError> {
    for entry in fs::read_dir(current)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_templates(base, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative = path
                .strip_prefix(base)
                .map_err(|_| TemplateError::TemplateError("Failed to get relative path".to_string()))?;
            let name = relative.to_string_lossy().replace('\\', "/");
            templates.push((name, fs::read_to_string(&path)?));
        }
    }
    Ok(())
}

/// `{{ email | gravatar(size=80) }}`
fn gravatar_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let email = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("gravatar filter expects a string"))?;
    let size = args.get("size").and_then(Value::as_u64).unwrap_or(GRAVATAR_SIZE);
    let digest = md5::compute(email.trim().to_lowercase().as_bytes());
    Ok(Value::String(format!(
        "https://www.gravatar.com/avatar/{:x}?s={}&d=identicon",
        digest, size
    )))
}

#[cfg(test)]
mod tests;
