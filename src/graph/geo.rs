use std::collections::HashMap;

use crate::aggregate::aggregate;
use crate::color::Color;
use crate::config::Config;
use crate::model::{Cluster, Flow, Id, Location, Material, MaterialTree, Node};

use super::text::{composition_text, fraction_text, material_name};
use super::{GraphLink, GraphNode, MapGraph};

#[derive(Debug, Clone, Copy, Default)]
pub struct MapInput<'a> {
    pub actors: &'a [Node],
    pub locations: &'a [Location],
    pub flows: &'a [Flow],
    pub materials: &'a [Material],
    pub clusters: &'a [Cluster],
}

#[derive(Debug, Clone, Copy)]
struct Endpoint {
    node: usize,
    clustered: bool,
}

/// A link before coloring and material splitting.
struct PendingLink {
    id: String,
    source: usize,
    target: usize,
    record: Flow,
    waste: bool,
    flow_ids: Vec<Id>,
}

/// Builds the map overlay: cluster and actor nodes plus the links between
/// them. Flows touching a cluster are aggregated per node pair, the rest pass
/// through one link per flow.
pub fn map_graph(input: &MapInput<'_>, config: &Config) -> MapGraph {
    let options = &config.map;
    let materials = MaterialTree::new(input.materials);
    let mut nodes: Vec<GraphNode> = Vec::new();
    let mut endpoints: HashMap<&Id, Endpoint> = HashMap::new();

    for (number, cluster) in input.clusters.iter().enumerate() {
        let node = nodes.len();
        let cluster_id = format!("cluster-{number}");
        let mut members = 0usize;
        for actor in &cluster.ids {
            if endpoints.contains_key(actor) {
                tracing::warn!(actor = %actor, cluster = %cluster_id, "actor already clustered, keeping first cluster");
                continue;
            }
            endpoints.insert(actor, Endpoint { node, clustered: true });
            members += 1;
        }
        let color = match cluster.color.as_deref() {
            Some(raw) => Color::parse(raw).unwrap_or_else(|| {
                tracing::warn!(cluster = %cluster_id, color = raw, "invalid cluster color");
                config.theme.cluster_color
            }),
            None => config.theme.cluster_color,
        };
        let label = cluster
            .label
            .clone()
            .unwrap_or_else(|| format!("{members} actors"));
        let mut graph_node = GraphNode::new(cluster_id.clone(), label, color);
        graph_node.radius = Some(cluster_radius(members, config));
        graph_node.cluster = Some(cluster_id);
        graph_node.lat = Some(cluster.lat);
        graph_node.lon = Some(cluster.lon);
        nodes.push(graph_node);
    }

    let mut located: HashMap<&Id, &Location> = HashMap::new();
    for location in input.locations {
        located.entry(&location.actor).or_insert(location);
    }

    for actor in input.actors {
        if endpoints.contains_key(&actor.id) {
            continue;
        }
        let Some(location) = located.get(&actor.id) else {
            tracing::warn!(actor = %actor.id, name = %actor.name, "actor has no location, skipping");
            continue;
        };
        endpoints.insert(
            &actor.id,
            Endpoint {
                node: nodes.len(),
                clustered: false,
            },
        );
        let color = config.theme.color_for(&actor.name);
        let mut graph_node = GraphNode::new(actor.id.to_string(), actor.name.clone(), color);
        graph_node.radius = Some(options.node_radius);
        graph_node.group = actor.level.map(|level| level.as_str().to_string());
        graph_node.lat = Some(location.lat);
        graph_node.lon = Some(location.lon);
        nodes.push(graph_node);
    }

    let mut clustered_flows: Vec<Flow> = Vec::new();
    let mut all_waste: HashMap<(usize, usize), bool> = HashMap::new();
    let mut pending: Vec<PendingLink> = Vec::new();
    let mut passthrough: Vec<PendingLink> = Vec::new();
    for flow in input.flows {
        if flow.is_self_loop() {
            tracing::warn!(flow = %flow.id, node = %flow.origin, "dropping self-referencing flow");
            continue;
        }
        let (Some(origin), Some(destination)) =
            (endpoints.get(&flow.origin), endpoints.get(&flow.destination))
        else {
            tracing::debug!(flow = %flow.id, "flow endpoint has no map node, skipping");
            continue;
        };
        if origin.clustered || destination.clustered {
            if origin.node == destination.node {
                continue;
            }
            let waste = all_waste
                .entry((origin.node, destination.node))
                .or_insert(true);
            *waste &= flow.waste;
            clustered_flows.push(flow.clone());
        } else {
            passthrough.push(PendingLink {
                id: flow.id.to_string(),
                source: origin.node,
                target: destination.node,
                record: flow.clone(),
                waste: flow.waste,
                flow_ids: Vec::new(),
            });
        }
    }

    let node_of = |id: &Id| endpoints.get(id).map(|endpoint| endpoint.node);
    for group in aggregate(&clustered_flows, |flow| {
        (node_of(&flow.origin), node_of(&flow.destination))
    }) {
        let (Some(source), Some(target)) = group.key else {
            continue;
        };
        let mut record = group.record;
        record.origin = Id::new(nodes[source].id.clone());
        record.destination = Id::new(nodes[target].id.clone());
        pending.push(PendingLink {
            id: format!("{}->{}", nodes[source].id, nodes[target].id),
            source,
            target,
            record,
            waste: all_waste.get(&(source, target)).copied().unwrap_or(false),
            flow_ids: group.members,
        });
    }
    pending.extend(passthrough);

    let mut material_colors = indexmap::IndexMap::new();
    let mut flows = Vec::with_capacity(pending.len());
    for link in pending {
        let base = GraphLink {
            id: link.id.clone(),
            source: link.source,
            target: link.target,
            value: link.record.amount,
            units: options.units.clone(),
            is_stock: false,
            waste: link.waste,
            color: nodes[link.source].color,
            composition_text: composition_text(
                link.record.composition.as_ref(),
                &materials,
                &config.labels,
            ),
            material: None,
            flow_ids: link.flow_ids,
        };
        if !options.split_by_material {
            flows.push(base);
            continue;
        }
        let fractions = link
            .record
            .composition
            .as_ref()
            .map(|composition| composition.fractions.as_slice())
            .unwrap_or_default();
        if fractions.is_empty() {
            flows.push(GraphLink {
                color: config.theme.unknown_material_color,
                ..base
            });
            continue;
        }
        let mut repeats: HashMap<&Id, usize> = HashMap::new();
        for fraction in fractions {
            let value = link.record.amount * fraction.fraction;
            if value <= 0.0 {
                continue;
            }
            let name = material_name(fraction, &materials);
            let color = *material_colors
                .entry(name.clone())
                .or_insert_with(|| config.theme.color_for(&name));
            let seen = repeats.entry(&fraction.material).or_insert(0);
            *seen += 1;
            let id = if *seen == 1 {
                format!("{}@{}", link.id, fraction.material)
            } else {
                format!("{}@{}-{}", link.id, fraction.material, seen)
            };
            flows.push(GraphLink {
                id,
                value,
                color,
                composition_text: fraction_text(fraction, &materials, &config.labels),
                material: Some(name),
                ..base.clone()
            });
        }
    }

    tracing::debug!(
        nodes = nodes.len(),
        flows = flows.len(),
        materials = material_colors.len(),
        "built map graph"
    );
    MapGraph {
        nodes,
        flows,
        material_colors,
    }
}

/// Cluster marker radius: grows with the member count, capped.
pub fn cluster_radius(members: usize, config: &Config) -> f32 {
    let map = &config.map;
    (map.cluster_radius_base + map.cluster_radius_per_member * members as f32)
        .min(map.cluster_radius_max)
}
