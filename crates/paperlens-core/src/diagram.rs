//! Partial graph and flow views that grow in lockstep with the item reveal.

use std::collections::HashSet;

use paperlens_schema::{FlowStep, GraphLink, GraphNode, ResultPayload};

use crate::reveal::reveal_ratio;

/// Vertical distance between stacked nodes, in layout units.
pub const NODE_ROW_HEIGHT: u32 = 56;

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedNode {
    pub node: GraphNode,
    pub row: usize,
    pub y: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagramView {
    pub ratio: f64,
    pub nodes: Vec<PlacedNode>,
    pub links: Vec<GraphLink>,
    pub total_nodes: usize,
    pub flow_title: Option<String>,
    pub steps: Vec<FlowStep>,
    pub total_steps: usize,
}

impl DiagramView {
    pub fn is_empty(&self) -> bool {
        self.total_nodes == 0 && self.total_steps == 0
    }
}

/// How many of `total` entries are visible given the item reveal progress.
///
/// Nothing is visible until the first item is shown; after that at least one
/// entry is. An empty item run counts as fully revealed.
pub fn visible_count(total: usize, displayed: usize, item_total: usize) -> usize {
    if total == 0 {
        return 0;
    }
    if item_total == 0 {
        return total;
    }
    if displayed == 0 {
        return 0;
    }
    let ratio = reveal_ratio(displayed, item_total);
    ((ratio * total as f64).ceil() as usize).clamp(1, total)
}

pub fn project(payload: &ResultPayload, displayed: usize, item_total: usize) -> DiagramView {
    let all_nodes = payload.nodes();
    let all_steps = payload.flow_steps();

    let node_count = visible_count(all_nodes.len(), displayed, item_total);
    let nodes: Vec<PlacedNode> = all_nodes
        .iter()
        .take(node_count)
        .enumerate()
        .map(|(row, node)| PlacedNode {
            node: node.clone(),
            row,
            y: row as u32 * NODE_ROW_HEIGHT,
        })
        .collect();

    let visible_ids: HashSet<&str> = nodes.iter().map(|placed| placed.node.id.as_str()).collect();
    let links = payload
        .links()
        .iter()
        .filter(|link| {
            visible_ids.contains(link.from.as_str()) && visible_ids.contains(link.to.as_str())
        })
        .cloned()
        .collect();

    let step_count = visible_count(all_steps.len(), displayed, item_total);

    DiagramView {
        ratio: reveal_ratio(displayed, item_total),
        nodes,
        links,
        total_nodes: all_nodes.len(),
        flow_title: payload.flow_title().map(str::to_string),
        steps: all_steps.iter().take(step_count).cloned().collect(),
        total_steps: all_steps.len(),
    }
}

#[cfg(test)]
mod tests {
    use paperlens_schema::{FlowChart, FrameworkMap};

    use super::*;

    fn node(id: &str) -> GraphNode {
        GraphNode {
            id: id.into(),
            label: id.to_uppercase(),
            kind: None,
        }
    }

    fn link(from: &str, to: &str) -> GraphLink {
        GraphLink {
            from: from.into(),
            to: to.into(),
            label: None,
        }
    }

    fn payload() -> ResultPayload {
        ResultPayload {
            framework_map: Some(FrameworkMap {
                nodes: vec![node("a"), node("b"), node("c"), node("d")],
                links: vec![link("a", "b"), link("b", "d"), link("c", "a"), link("a", "zz")],
            }),
            flow_chart: Some(FlowChart {
                title: Some("Pipeline".into()),
                steps: vec![
                    FlowStep {
                        name: "collect".into(),
                        detail: None,
                    },
                    FlowStep {
                        name: "rank".into(),
                        detail: Some("top-k".into()),
                    },
                ],
            }),
            ..Default::default()
        }
    }

    #[test]
    fn hidden_until_first_item() {
        let view = project(&payload(), 0, 10);
        assert!(view.nodes.is_empty());
        assert!(view.links.is_empty());
        assert!(view.steps.is_empty());
        assert_eq!(view.total_nodes, 4);
    }

    #[test]
    fn at_least_one_node_once_revealing() {
        let view = project(&payload(), 1, 10);
        assert_eq!(view.nodes.len(), 1);
        assert_eq!(view.steps.len(), 1);
        assert!(view.links.is_empty());
    }

    #[test]
    fn links_need_both_endpoints_visible() {
        let view = project(&payload(), 5, 10);
        let ids: Vec<&str> = view.nodes.iter().map(|n| n.node.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(view.links, vec![link("a", "b")]);

        let full = project(&payload(), 10, 10);
        assert_eq!(full.nodes.len(), 4);
        assert_eq!(full.links, vec![link("a", "b"), link("b", "d"), link("c", "a")]);
        for l in &full.links {
            assert!(full.nodes.iter().any(|n| n.node.id == l.from));
            assert!(full.nodes.iter().any(|n| n.node.id == l.to));
        }
    }

    #[test]
    fn nodes_stack_in_payload_order() {
        let view = project(&payload(), 10, 10);
        let ys: Vec<u32> = view.nodes.iter().map(|n| n.y).collect();
        assert_eq!(ys, vec![0, NODE_ROW_HEIGHT, 2 * NODE_ROW_HEIGHT, 3 * NODE_ROW_HEIGHT]);
        assert_eq!(view.flow_title.as_deref(), Some("Pipeline"));
    }

    #[test]
    fn empty_item_run_shows_everything() {
        let view = project(&payload(), 0, 0);
        assert_eq!(view.nodes.len(), 4);
        assert_eq!(view.steps.len(), 2);
        assert_eq!(view.ratio, 1.0);
    }

    #[test]
    fn counts_never_exceed_totals() {
        for item_total in 0..8 {
            for displayed in 0..12 {
                for total in 0..6 {
                    assert!(visible_count(total, displayed, item_total) <= total);
                }
            }
        }
    }
}
