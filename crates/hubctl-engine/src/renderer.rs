//! Template renderer
//!
//! Templates are looked up first in an optional override directory, then in
//! the set compiled into the binary. Rendering is strict: a variable the
//! template references but the parameters do not supply fails with
//! [`EngineError::MissingParameter`] instead of rendering as empty text.

use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};
use crate::filters;
use crate::templates;

/// Builder for [`Renderer`]
#[derive(Debug, Default)]
pub struct RendererBuilder {
    override_dir: Option<PathBuf>,
}

impl RendererBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory whose files shadow embedded templates of the same name
    pub fn override_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.override_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> Renderer {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        filters::register(&mut env);

        let override_dir = self.override_dir.clone();
        env.set_loader(move |name| load(override_dir.as_deref(), name));

        Renderer {
            env,
            override_dir: self.override_dir,
        }
    }
}

/// Stateless renderer: the same template and parameters always give the same text
pub struct Renderer {
    env: Environment<'static>,
    override_dir: Option<PathBuf>,
}

impl Renderer {
    pub fn builder() -> RendererBuilder {
        RendererBuilder::new()
    }

    /// Renderer over the embedded templates only
    pub fn embedded() -> Self {
        RendererBuilder::new().build()
    }

    pub fn override_dir(&self) -> Option<&Path> {
        self.override_dir.as_deref()
    }

    /// Fill `template_name` with `parameters`
    ///
    /// `parameters` must serialize to a mapping. Every top-level variable the
    /// template reads must be one of its keys.
    pub fn render<P: Serialize>(&self, template_name: &str, parameters: &P) -> Result<String> {
        let params = serde_json::to_value(parameters).map_err(|e| EngineError::Render {
            template: template_name.to_string(),
            message: e.to_string(),
        })?;
        let Some(supplied) = params.as_object() else {
            return Err(EngineError::InvalidParameters {
                template: template_name.to_string(),
            });
        };

        let template = self
            .env
            .get_template(template_name)
            .map_err(|e| EngineError::from_minijinja(template_name, e))?;

        let mut required: Vec<String> = template
            .undeclared_variables(false)
            .into_iter()
            .collect();
        required.sort();
        if let Some(missing) = required.into_iter().find(|v| !supplied.contains_key(v)) {
            return Err(EngineError::MissingParameter {
                template: template_name.to_string(),
                parameter: missing,
            });
        }

        tracing::debug!("rendering template {}", template_name);
        template
            .render(&params)
            .map_err(|e| EngineError::from_minijinja(template_name, e))
    }

    /// Raw, unrendered text of a template
    pub fn source(&self, template_name: &str) -> Result<String> {
        self.env
            .get_template(template_name)
            .map(|t| t.source().to_string())
            .map_err(|e| EngineError::from_minijinja(template_name, e))
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("override_dir", &self.override_dir)
            .finish()
    }
}

fn load(override_dir: Option<&Path>, name: &str) -> std::result::Result<Option<String>, Error> {
    if name.split('/').any(|segment| segment == "..") {
        return Ok(None);
    }

    if let Some(dir) = override_dir {
        let path = dir.join(name);
        if path.is_file() {
            return std::fs::read_to_string(&path).map(Some).map_err(|e| {
                Error::new(
                    ErrorKind::InvalidOperation,
                    format!("cannot read {}: {}", path.display(), e),
                )
            });
        }
    }

    Ok(templates::embedded(name).map(str::to_string))
}
