//! Template lookup and rendering for HTML auto-render.
//!
//! Templates live at `<root>/<views>/<controller>/<action>.<format>.<ext>`,
//! where `<ext>` is one of the renderer's extensions, tried in order.

use anyhow::Context;
use minijinja::Environment;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::controller::Controller;

/// Renders a template file against a controller instance.
pub trait TemplateRenderer: Send + Sync {
    /// File extensions this renderer handles, most preferred first.
    fn extensions(&self) -> &[&'static str];

    /// Render `path`; the controller supplies the template variables.
    ///
    /// # Errors
    ///
    /// Any failure to read or render the template.
    fn render(&self, path: &Path, controller: &Controller) -> anyhow::Result<String>;
}

/// Default renderer. Context: every assign by name, plus `params`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MiniJinjaRenderer;

impl MiniJinjaRenderer {
    const EXTENSIONS: [&'static str; 2] = ["jinja", "j2"];
}

impl TemplateRenderer for MiniJinjaRenderer {
    fn extensions(&self) -> &[&'static str] {
        &Self::EXTENSIONS
    }

    fn render(&self, path: &Path, controller: &Controller) -> anyhow::Result<String> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("reading template {}", path.display()))?;
        let mut env = Environment::new();
        env.add_template("view", &source)
            .with_context(|| format!("compiling template {}", path.display()))?;
        let tmpl = env.get_template("view")?;
        let rendered = tmpl
            .render(template_context(controller))
            .with_context(|| format!("rendering template {}", path.display()))?;
        Ok(rendered)
    }
}

/// Assigns merged with `params` (an assign named `params` wins).
#[must_use]
pub fn template_context(controller: &Controller) -> Value {
    let mut ctx = serde_json::Map::new();
    ctx.insert("params".to_string(), controller.params.to_json());
    for (k, v) in controller.assigns() {
        ctx.insert(k.clone(), v.clone());
    }
    Value::Object(ctx)
}

/// First readable template for `controller#action` in `format`.
#[must_use]
pub fn find_template(
    views_dir: &Path,
    controller: &str,
    action: &str,
    format: &str,
    extensions: &[&str],
) -> Option<PathBuf> {
    let dir = views_dir.join(controller);
    extensions
        .iter()
        .map(|ext| dir.join(format!("{action}.{format}.{ext}")))
        .find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::params::Params;
    use crate::request::Request;
    use http::Method;
    use std::sync::Arc;

    #[test]
    fn test_find_template_in_extension_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("post")).unwrap();
        fs::write(dir.path().join("post/index.html.j2"), "b").unwrap();
        let found = find_template(dir.path(), "post", "index", "html", &["jinja", "j2"]);
        assert_eq!(found, Some(dir.path().join("post/index.html.j2")));
        fs::write(dir.path().join("post/index.html.jinja"), "a").unwrap();
        let found = find_template(dir.path(), "post", "index", "html", &["jinja", "j2"]);
        assert_eq!(found, Some(dir.path().join("post/index.html.jinja")));
        assert!(find_template(dir.path(), "post", "show", "html", &["jinja"]).is_none());
    }

    #[test]
    fn test_render_with_assigns_and_params() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("show.html.jinja");
        fs::write(&path, "<h1>{{ title }} #{{ params.id }}</h1>").unwrap();

        let mut c = Controller::new(
            "post",
            Request::new(Method::GET, "/post/show/7"),
            Params::from_pairs([("id", "7")]),
            Arc::new(Settings::default()),
        );
        c.assign("title", "Hello");
        let html = MiniJinjaRenderer.render(&path, &c).unwrap();
        assert_eq!(html, "<h1>Hello #7</h1>");
    }
}
