use thiserror::Error;

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("template rendering failed: {0}")]
    TemplateRender(String),

    #[error("template parse error: {0}")]
    TemplateParse(String),

    #[error("no phrase table for locale: {0}")]
    UnsupportedLocale(String),
}

impl From<tera::Error> for NoteError {
    fn from(e: tera::Error) -> Self {
        NoteError::TemplateRender(e.to_string())
    }
}
