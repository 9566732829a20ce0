use std::collections::{HashMap, HashSet};

use crate::config::Config;
use crate::model::{Flow, Id, Material, MaterialTree, Node, Stock};

use super::text::composition_text;
use super::{GraphLink, GraphNode, NodeKey, SankeyGraph, Side, stock_node_id};

#[derive(Debug, Clone, Copy, Default)]
pub struct SankeyInput<'a> {
    pub origins: &'a [Node],
    pub destinations: &'a [Node],
    pub flows: &'a [Flow],
    pub stocks: &'a [Stock],
    pub materials: &'a [Material],
}

/// Builds the layered diagram graph.
///
/// Nodes come out in admission order (origins, destinations, then one stock
/// sink per stock); links in flow order followed by stock links.
pub fn sankey_graph(input: &SankeyInput<'_>, config: &Config) -> SankeyGraph {
    let options = &config.sankey;
    let side_by_side = options.force_side_by_side;
    let materials = MaterialTree::new(input.materials);

    // Connectivity is recomputed per call; nothing is cached between renders.
    let mut has_outgoing: HashSet<&Id> = HashSet::new();
    let mut has_incoming: HashSet<&Id> = HashSet::new();
    if options.hide_unconnected {
        for flow in input.flows.iter().filter(|flow| !flow.is_self_loop()) {
            has_outgoing.insert(&flow.origin);
            has_incoming.insert(&flow.destination);
        }
        for stock in input.stocks {
            has_outgoing.insert(&stock.origin);
        }
    }

    let mut nodes: Vec<GraphNode> = Vec::new();
    let mut index: HashMap<NodeKey, usize> = HashMap::new();
    let mut admit = |side: Side, candidates: &[Node], connected: &HashSet<&Id>| {
        for node in candidates {
            let key = NodeKey::new(side, &node.id, side_by_side);
            if index.contains_key(&key) {
                continue;
            }
            if options.hide_unconnected && !connected.contains(&node.id) {
                tracing::debug!(node = %node.id, ?side, "hiding unconnected node");
                continue;
            }
            let color = config.theme.color_for(&node.name);
            let mut graph_node = GraphNode::new(key.node_id(), node.name.clone(), color);
            graph_node.group = node.level.map(|level| level.as_str().to_string());
            if side_by_side {
                graph_node.side = Some(side);
            }
            index.insert(key, nodes.len());
            nodes.push(graph_node);
        }
    };
    admit(Side::Origin, input.origins, &has_outgoing);
    admit(Side::Destination, input.destinations, &has_incoming);

    let mut links = Vec::with_capacity(input.flows.len() + input.stocks.len());
    for flow in input.flows {
        if flow.is_self_loop() {
            tracing::warn!(flow = %flow.id, node = %flow.origin, "dropping self-referencing flow");
            continue;
        }
        let source = index.get(&NodeKey::new(Side::Origin, &flow.origin, side_by_side));
        let target = index.get(&NodeKey::new(Side::Destination, &flow.destination, side_by_side));
        let (Some(&source), Some(&target)) = (source, target) else {
            tracing::debug!(flow = %flow.id, "flow endpoint not admitted, skipping");
            continue;
        };
        links.push(GraphLink {
            id: flow.id.to_string(),
            source,
            target,
            value: flow.amount,
            units: options.units.clone(),
            is_stock: false,
            waste: flow.waste,
            color: nodes[source].color,
            composition_text: composition_text(flow.composition.as_ref(), &materials, &config.labels),
            material: None,
            flow_ids: Vec::new(),
        });
    }

    for stock in input.stocks {
        let Some(&source) = index.get(&NodeKey::new(Side::Origin, &stock.origin, side_by_side))
        else {
            tracing::debug!(stock = %stock.id, "stock origin not admitted, skipping");
            continue;
        };
        let target = nodes.len();
        let mut sink = GraphNode::new(
            stock_node_id(&stock.id),
            options.stock_label.clone(),
            config.theme.stock_color,
        );
        sink.stock = true;
        nodes.push(sink);
        links.push(GraphLink {
            id: stock.id.to_string(),
            source,
            target,
            value: stock.amount,
            units: options.units.clone(),
            is_stock: true,
            waste: stock.waste,
            color: nodes[source].color,
            composition_text: composition_text(stock.composition.as_ref(), &materials, &config.labels),
            material: None,
            flow_ids: Vec::new(),
        });
    }

    tracing::debug!(nodes = nodes.len(), links = links.len(), "built sankey graph");
    SankeyGraph { nodes, links }
}
