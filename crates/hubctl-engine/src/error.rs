//! Engine error types

use miette::Diagnostic;
use thiserror::Error;

/// Result type for template rendering
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised while loading or rendering a template
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error("template '{name}' not found")]
    #[diagnostic(
        code(hubctl::template::not_found),
        help("embedded templates: {available}")
    )]
    TemplateNotFound { name: String, available: String },

    #[error("template '{template}' requires parameter '{parameter}'")]
    #[diagnostic(code(hubctl::template::missing_parameter))]
    MissingParameter { template: String, parameter: String },

    #[error("parameters for '{template}' must be a mapping")]
    #[diagnostic(code(hubctl::template::parameters))]
    InvalidParameters { template: String },

    #[error("failed to render '{template}': {message}")]
    #[diagnostic(code(hubctl::template::render))]
    Render { template: String, message: String },
}

impl EngineError {
    pub(crate) fn from_minijinja(template: &str, err: minijinja::Error) -> Self {
        match err.kind() {
            minijinja::ErrorKind::TemplateNotFound => EngineError::TemplateNotFound {
                name: template.to_string(),
                available: crate::templates::names().join(", "),
            },
            minijinja::ErrorKind::UndefinedError => EngineError::MissingParameter {
                template: template.to_string(),
                parameter: err.detail().unwrap_or("unknown").to_string(),
            },
            _ => EngineError::Render {
                template: template.to_string(),
                message: err.to_string(),
            },
        }
    }
}
