use std::collections::{BTreeMap, BTreeSet};

use kinesis_core::models::input::ResponseValue;
use kinesis_core::models::label::Locale;
use kinesis_core::models::response::ResponseSet;
use kinesis_core::models::template::{NoteRole, Section, Template};
use kinesis_rules::snapshot::ResponseSnapshot;
use kinesis_rules::visibility::{ItemState, Resolved, resolve, section_visible};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::NoteError;
use crate::format;
use crate::phrases::{Phrases, fill};
use crate::render::{BucketContext, NoteContext, NoteGenerator, SegmentContext};

/// Everything the generator reads. The caller loads all three from one
/// consistent snapshot.
pub struct NoteInput<'a> {
    pub template: &'a Template,
    pub responses: &'a ResponseSet,
    pub baseline: &'a BTreeMap<String, ResponseValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNote {
    pub note: String,
    pub note_localized: String,
    pub referenced_items: BTreeSet<Uuid>,
}

/// Result of walking the tree for one locale.
struct Walk {
    buckets: BTreeMap<NoteRole, Vec<String>>,
    caveats: Vec<String>,
    referenced: BTreeSet<Uuid>,
}

impl NoteGenerator {
    /// Render the note in both locales. Output depends only on the input,
    /// so repeated calls over unchanged responses are byte-identical.
    pub fn generate(&self, input: &NoteInput<'_>) -> Result<RenderedNote, NoteError> {
        let committed = ResponseSnapshot::new(input.responses, input.baseline);
        let Resolved { states, snapshot } = resolve(input.template, &committed);

        let (note, referenced_items) =
            self.render_locale(input, &snapshot, &states, Locale::Primary, &self.primary)?;
        let (note_localized, _) =
            self.render_locale(input, &snapshot, &states, Locale::Secondary, &self.secondary)?;

        debug!(
            template_id = %input.template.id,
            referenced = referenced_items.len(),
            "note generated"
        );

        Ok(RenderedNote {
            note,
            note_localized,
            referenced_items,
        })
    }

    fn render_locale(
        &self,
        input: &NoteInput<'_>,
        snapshot: &ResponseSnapshot<'_>,
        states: &[ItemState<'_>],
        locale: Locale,
        phrases: &Phrases,
    ) -> Result<(String, BTreeSet<Uuid>), NoteError> {
        let walk = self.walk(input, snapshot, states, locale, phrases);

        let buckets = NoteRole::ALL
            .iter()
            .map(|role| BucketContext {
                heading: phrases.heading(*role),
                segments: walk.buckets.get(role).cloned().unwrap_or_default(),
            })
            .collect();

        let ctx = NoteContext {
            heading: &phrases.title,
            template_name: input.template.name.text(locale),
            buckets,
            nothing_recorded: &phrases.nothing_recorded,
            caveats_heading: &phrases.caveats,
            caveats: &walk.caveats,
        };
        let text = self.render_note(&ctx)?;
        Ok((text, walk.referenced))
    }

    fn walk(
        &self,
        input: &NoteInput<'_>,
        snapshot: &ResponseSnapshot<'_>,
        states: &[ItemState<'_>],
        locale: Locale,
        phrases: &Phrases,
    ) -> Walk {
        let mut walk = Walk {
            buckets: BTreeMap::new(),
            caveats: Vec::new(),
            referenced: BTreeSet::new(),
        };

        for section in &input.template.sections {
            if !section_visible(section, snapshot) {
                continue;
            }
            let title = section.title.text(locale);
            let mut lines = Vec::new();

            for state in states
                .iter()
                .filter(|s| s.section.id == section.id && s.visible)
            {
                let item = state.item;
                let label = item.label.text(locale);
                match input.responses.get(item.id) {
                    Some(response) if response.is_skipped => {
                        walk.referenced.insert(item.id);
                        if state.required {
                            let caveat = match response.skip_reason.as_deref() {
                                Some(reason) if !reason.trim().is_empty() => fill(
                                    &phrases.skipped_with_reason,
                                    &[("item", label), ("reason", reason.trim())],
                                ),
                                _ => fill(&phrases.skipped, &[("item", label)]),
                            };
                            walk.caveats.push(caveat);
                        }
                    }
                    Some(response) => match response.value.as_ref() {
                        Some(value) => {
                            walk.referenced.insert(item.id);
                            let mut line =
                                format!("{label}: {}", format::value(item, value, locale, phrases));
                            if let Some(delta) =
                                format::delta(item, value, snapshot.baseline(&item.key), phrases)
                            {
                                line.push_str(&format!(" ({delta})"));
                            }
                            lines.push(line);
                        }
                        None if state.required => walk
                            .caveats
                            .push(fill(&phrases.not_recorded, &[("item", label)])),
                        None => {}
                    },
                    None if state.required => walk
                        .caveats
                        .push(fill(&phrases.not_recorded, &[("item", label)])),
                    None => {}
                }
            }

            if lines.is_empty() {
                if section.is_required {
                    walk.caveats.push(fill(
                        &phrases.empty_required_section,
                        &[("section", title)],
                    ));
                }
                continue;
            }

            match self.segment(section, title, &lines, phrases) {
                Ok((role, text)) => walk.buckets.entry(role).or_default().push(text),
                Err(marker) => walk.caveats.push(marker),
            }
        }

        walk
    }

    /// Render one section. A failure yields an inline omission marker
    /// instead of aborting the whole note.
    fn segment(
        &self,
        section: &Section,
        title: &str,
        lines: &[String],
        phrases: &Phrases,
    ) -> Result<(NoteRole, String), String> {
        let omitted = |cause: &str| {
            fill(
                &phrases.omitted_section,
                &[("section", title), ("cause", cause)],
            )
        };

        let Some(role) = section.note_role else {
            warn!(section_id = %section.id, "section has no note role, omitted from note");
            return Err(omitted(&phrases.no_note_role));
        };

        self.render_segment(&SegmentContext { title, lines })
            .map(|text| (role, text))
            .map_err(|e| {
                warn!(section_id = %section.id, error = %e, "segment render failed, omitted from note");
                omitted(&phrases.render_failed)
            })
    }
}
