use serde::Serialize;
use tera::{Context, Tera};

use crate::error::NoteError;
use crate::phrases::Phrases;

pub const SEGMENT_TEMPLATE: &str = "segment.md";
pub const NOTE_TEMPLATE: &str = "note.md";

const DEFAULT_SEGMENT: &str = "### {{ title }}\n{% for line in lines %}- {{ line }}\n{% endfor %}";

const DEFAULT_NOTE: &str = "# {{ heading }}: {{ template_name }}\n\
{% for bucket in buckets %}\n## {{ bucket.heading }}\n\
{% if bucket.segments %}{% for segment in bucket.segments %}{{ segment }}{% endfor %}\
{% else %}{{ nothing_recorded }}\n{% endif %}\
{% endfor %}\
{% if caveats %}\n## {{ caveats_heading }}\n{% for caveat in caveats %}- {{ caveat }}\n{% endfor %}{% endif %}";

#[derive(Debug, Serialize)]
pub(crate) struct SegmentContext<'a> {
    pub title: &'a str,
    pub lines: &'a [String],
}

#[derive(Debug, Serialize)]
pub(crate) struct BucketContext<'a> {
    pub heading: &'a str,
    pub segments: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NoteContext<'a> {
    pub heading: &'a str,
    pub template_name: &'a str,
    pub buckets: Vec<BucketContext<'a>>,
    pub nothing_recorded: &'a str,
    pub caveats_heading: &'a str,
    pub caveats: &'a [String],
}

/// Renders clinical notes in a primary and a secondary locale.
///
/// Both locales share one pair of Tera templates; only the phrase tables
/// differ. Templates are parsed once at construction.
pub struct NoteGenerator {
    tera: Tera,
    pub(crate) primary: Phrases,
    pub(crate) secondary: Phrases,
}

impl NoteGenerator {
    pub fn new(primary_locale: &str, secondary_locale: &str) -> Result<Self, NoteError> {
        Self::with_templates(primary_locale, secondary_locale, DEFAULT_SEGMENT, DEFAULT_NOTE)
    }

    /// Build a generator with custom segment and note layouts.
    pub fn with_templates(
        primary_locale: &str,
        secondary_locale: &str,
        segment: &str,
        note: &str,
    ) -> Result<Self, NoteError> {
        let mut tera = Tera::default();
        tera.add_raw_template(SEGMENT_TEMPLATE, segment)
            .map_err(|e| NoteError::TemplateParse(e.to_string()))?;
        tera.add_raw_template(NOTE_TEMPLATE, note)
            .map_err(|e| NoteError::TemplateParse(e.to_string()))?;

        Ok(Self {
            tera,
            primary: Phrases::for_locale(primary_locale)?,
            secondary: Phrases::for_locale(secondary_locale)?,
        })
    }

    pub(crate) fn render_segment(&self, ctx: &SegmentContext<'_>) -> Result<String, NoteError> {
        let context = Context::from_serialize(ctx)?;
        Ok(self.tera.render(SEGMENT_TEMPLATE, &context)?)
    }

    pub(crate) fn render_note(&self, ctx: &NoteContext<'_>) -> Result<String, NoteError> {
        let context = Context::from_serialize(ctx)?;
        Ok(self.tera.render(NOTE_TEMPLATE, &context)?)
    }
}
