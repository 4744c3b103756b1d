//! HTML templates rendered with minijinja.
//!
//! `render("home/index", data)` loads `<root>/home/index.html`. Layouts use
//! template inheritance (`{% extends "layouts/app.html" %}`) and output is
//! HTML-escaped unless marked safe.

use minijinja::{Environment, ErrorKind};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Rendering failure.
#[derive(Debug)]
pub enum ViewError {
    /// The template (or one it extends or includes) does not exist.
    NotFound { template: String },
    /// The template failed to compile or render.
    Render(minijinja::Error),
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { template } => write!(f, "View template not found: {template}"),
            Self::Render(e) => write!(f, "View render failed: {e}"),
        }
    }
}

impl std::error::Error for ViewError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NotFound { .. } => None,
            Self::Render(e) => Some(e),
        }
    }
}

fn load_template(root: &Path, name: &str) -> Result<Option<String>, minijinja::Error> {
    let mut path = root.to_path_buf();
    for comp in Path::new(name).components() {
        match comp {
            Component::Normal(s) => path.push(s),
            Component::CurDir => {}
            _ => return Ok(None),
        }
    }
    match fs::read_to_string(&path) {
        Ok(source) => Ok(Some(source)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("could not read template {name}"),
        )
        .with_source(e)),
    }
}

/// Template renderer rooted at the views directory.
pub struct View {
    root: PathBuf,
    cache: bool,
    env: Environment<'static>,
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("root", &self.root)
            .field("cache", &self.cache)
            .finish()
    }
}

impl View {
    /// With `cache` off, templates are re-read from disk on every render.
    pub fn new(root: impl Into<PathBuf>, cache: bool) -> Self {
        let root = root.into();
        let env = Self::environment(&root);
        Self { root, cache, env }
    }

    fn environment(root: &Path) -> Environment<'static> {
        let mut env = Environment::new();
        let root = root.to_path_buf();
        env.set_loader(move |name| load_template(&root, name));
        env
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `name` resolves to an existing template file.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        matches!(load_template(&self.root, &format!("{name}.html")), Ok(Some(_)))
    }

    /// Render `name` (without the `.html` extension) with `data`.
    ///
    /// # Errors
    ///
    /// [`ViewError::NotFound`] if the template is missing,
    /// [`ViewError::Render`] for syntax or evaluation errors.
    pub fn render<S: Serialize>(&self, name: &str, data: S) -> Result<String, ViewError> {
        let fresh;
        let env = if self.cache {
            &self.env
        } else {
            fresh = Self::environment(&self.root);
            &fresh
        };
        let file = format!("{name}.html");
        let template = env.get_template(&file).map_err(|e| match e.kind() {
            ErrorKind::TemplateNotFound => ViewError::NotFound {
                template: name.to_string(),
            },
            _ => ViewError::Render(e),
        })?;
        template.render(data).map_err(|e| match e.kind() {
            ErrorKind::TemplateNotFound => ViewError::NotFound {
                template: name.to_string(),
            },
            _ => ViewError::Render(e),
        })
    }

    /// HTML-escape `value` for direct interpolation.
    #[must_use]
    pub fn escape(value: &str) -> String {
        super::html_escape(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn views() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("layouts")).unwrap();
        fs::create_dir_all(dir.path().join("home")).unwrap();
        fs::write(
            dir.path().join("layouts/app.html"),
            "<title>{% block title %}{% endblock %}</title><main>{% block content %}{% endblock %}</main>",
        )
        .unwrap();
        fs::write(
            dir.path().join("home/index.html"),
            r#"{% extends "layouts/app.html" %}{% block title %}{{ title }}{% endblock %}{% block content %}Hi {{ name }}{% endblock %}"#,
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_render_with_layout() {
        let dir = views();
        let view = View::new(dir.path(), true);
        let html = view
            .render("home/index", json!({"title": "Home", "name": "Ada"}))
            .unwrap();
        assert_eq!(html, "<title>Home</title><main>Hi Ada</main>");
    }

    #[test]
    fn test_output_is_escaped() {
        let dir = views();
        let view = View::new(dir.path(), true);
        let html = view
            .render("home/index", json!({"title": "T", "name": "<script>"}))
            .unwrap();
        assert!(html.contains("Hi &lt;script&gt;"));
    }

    #[test]
    fn test_missing_template() {
        let dir = views();
        let view = View::new(dir.path(), true);
        assert!(matches!(
            view.render("home/missing", json!({})),
            Err(ViewError::NotFound { template }) if template == "home/missing"
        ));
        assert!(matches!(
            view.render("../secrets", json!({})),
            Err(ViewError::NotFound { .. })
        ));
        assert!(!view.exists("home/missing"));
        assert!(view.exists("home/index"));
    }

    #[test]
    fn test_uncached_sees_edits() {
        let dir = views();
        fs::write(dir.path().join("plain.html"), "one").unwrap();
        let view = View::new(dir.path(), false);
        assert_eq!(view.render("plain", json!({})).unwrap(), "one");
        fs::write(dir.path().join("plain.html"), "two").unwrap();
        assert_eq!(view.render("plain", json!({})).unwrap(), "two");
    }

    #[test]
    fn test_escape() {
        assert_eq!(View::escape(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#039;&amp;&#039;&lt;/a&gt;");
    }
}
