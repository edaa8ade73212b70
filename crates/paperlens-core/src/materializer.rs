//! Flattens a final [`ResultPayload`] into ordered display items.

use paperlens_schema::{DisplayItem, Provenance, ResultPayload, Stage};

pub fn materialize(payload: &ResultPayload) -> Vec<DisplayItem> {
    let mut items = Vec::new();

    if let Some(title) = present(&payload.title) {
        items.push(final_item("final-title", Stage::Initial, "📘", "Paper title".into(), title));
    }
    if let Some(gap) = present(&payload.research_gap) {
        items.push(final_item("final-gap", Stage::Expanding, "🎯", "Research gap".into(), gap));
    }
    if let Some(method) = present(&payload.core_methodology) {
        items.push(final_item(
            "final-method",
            Stage::Focused,
            "🧠",
            "Core methodology".into(),
            method,
        ));
    }

    if let Some(tree) = &payload.structural_tree {
        push_list(&mut items, &tree.problem_definition, ListKind::Problem);
        push_list(&mut items, &tree.technical_approach, ListKind::Approach);
        push_list(&mut items, &tree.empirical_evidence, ListKind::Evidence);
    }

    items
}

#[derive(Clone, Copy)]
enum ListKind {
    Problem,
    Approach,
    Evidence,
}

impl ListKind {
    fn id_prefix(self) -> &'static str {
        match self {
            ListKind::Problem => "pd",
            ListKind::Approach => "ta",
            ListKind::Evidence => "ee",
        }
    }

    fn stage(self) -> Stage {
        match self {
            ListKind::Problem => Stage::Initial,
            ListKind::Approach => Stage::Expanding,
            ListKind::Evidence => Stage::Final,
        }
    }

    fn icon(self) -> &'static str {
        match self {
            ListKind::Problem => "⚠️",
            ListKind::Approach => "🛠️",
            ListKind::Evidence => "📊",
        }
    }

    fn title(self) -> &'static str {
        match self {
            ListKind::Problem => "Problem definition",
            ListKind::Approach => "Technical approach",
            ListKind::Evidence => "Empirical evidence",
        }
    }
}

fn push_list(items: &mut Vec<DisplayItem>, entries: &[String], kind: ListKind) {
    // Every entry yields one item, blank or not, so ids follow list positions.
    for (index, entry) in entries.iter().enumerate() {
        items.push(final_item(
            &format!("{}-{index}", kind.id_prefix()),
            kind.stage(),
            kind.icon(),
            format!("{} {}", kind.title(), index + 1),
            entry,
        ));
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.trim().is_empty())
}

fn final_item(id: &str, stage: Stage, icon: &str, title: String, content: &str) -> DisplayItem {
    DisplayItem {
        id: id.to_string(),
        stage,
        icon: icon.to_string(),
        title,
        content: content.to_string(),
        provenance: Provenance::Final,
    }
}
