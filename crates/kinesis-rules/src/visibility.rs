use std::collections::HashSet;

use kinesis_core::models::template::{Item, Section, Template};
use tracing::warn;

use crate::condition::{required, visible};
use crate::snapshot::ResponseSnapshot;

/// Evaluated state of one item against a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ItemState<'t> {
    pub section: &'t Section,
    pub item: &'t Item,
    pub visible: bool,
    pub required: bool,
}

/// Item states together with the snapshot they were settled against: the
/// committed values of visible items only.
#[derive(Debug, Clone)]
pub struct Resolved<'t, 'a> {
    pub states: Vec<ItemState<'t>>,
    pub snapshot: ResponseSnapshot<'a>,
}

/// Settle visibility for the whole template.
///
/// A hidden item's value is invisible to every other condition, so hiding
/// cascades along chains of conditions. Conditions are re-evaluated against
/// the committed values minus the hidden ones until the hidden set stops
/// changing. Conditions that never settle hide everything that was hidden
/// in either of the last two rounds.
pub fn resolve<'t, 'a>(template: &'t Template, snapshot: &ResponseSnapshot<'a>) -> Resolved<'t, 'a> {
    let rounds = template.sections.iter().map(|s| s.items.len()).sum::<usize>() + 2;
    let mut hidden: HashSet<&'t str> = HashSet::new();
    let mut previous = HashSet::new();

    for _ in 0..rounds {
        let masked = snapshot.without(&hidden);
        let states = evaluate_states(template, &masked);
        let next = hidden_keys(&states);
        if next == hidden {
            return Resolved {
                states,
                snapshot: masked,
            };
        }
        previous = std::mem::replace(&mut hidden, next);
    }

    warn!(template_id = %template.id, "display conditions do not settle; hiding both candidates");
    hidden.extend(previous);
    let masked = snapshot.without(&hidden);
    let states = evaluate_states(template, &masked)
        .into_iter()
        .map(|mut state| {
            if hidden.contains(state.item.key.as_str()) {
                state.visible = false;
                state.required = false;
            }
            state
        })
        .collect();
    Resolved {
        states,
        snapshot: masked,
    }
}

/// Walk the template tree in order and evaluate every item. A hidden section
/// hides all of its items; a hidden item is never required.
pub fn item_states<'t>(template: &'t Template, snapshot: &ResponseSnapshot<'_>) -> Vec<ItemState<'t>> {
    resolve(template, snapshot).states
}

/// Whether a section is shown, independent of its items.
pub fn section_visible(section: &Section, snapshot: &ResponseSnapshot<'_>) -> bool {
    visible(section.display_conditions.as_ref(), snapshot)
}

fn evaluate_states<'t>(template: &'t Template, snapshot: &ResponseSnapshot<'_>) -> Vec<ItemState<'t>> {
    let mut states = Vec::new();
    for section in &template.sections {
        let section_visible = section_visible(section, snapshot);
        for item in &section.items {
            let is_visible = section_visible && visible(item.display_conditions.as_ref(), snapshot);
            let is_required = is_visible
                && required(
                    item.is_required,
                    item.required_conditions.as_ref(),
                    snapshot,
                );
            states.push(ItemState {
                section,
                item,
                visible: is_visible,
                required: is_required,
            });
        }
    }
    states
}

fn hidden_keys<'t>(states: &[ItemState<'t>]) -> HashSet<&'t str> {
    states
        .iter()
        .filter(|s| !s.visible)
        .map(|s| s.item.key.as_str())
        .collect()
}
