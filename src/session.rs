//! Fetch-then-transform cycles.
//!
//! A [`ViewSession`] runs one cycle per filter or clustering change. Every
//! fetch a transform needs is issued concurrently and joined before the
//! transform starts; one failed fetch aborts the cycle with a single error.
//! Starting a new cycle supersedes the previous one, whose results are then
//! discarded as [`CycleOutcome::Stale`] (last write wins).

use std::future::Future;

use futures::future::try_join_all;
use tokio::sync::watch;

use crate::config::Config;
use crate::error::FlowError;
use crate::filter::{FilterSpec, SubQuery, build_query};
use crate::graph::{MapGraph, MapInput, SankeyGraph, SankeyInput, map_graph, sankey_graph};
use crate::model::{Area, Cluster, Flow, Id, Location, Material, Node, NodeLevel, Stock};

/// Backend the session pulls records from.
pub trait DataSource {
    fn flows(&self, query: &SubQuery) -> impl Future<Output = Result<Vec<Flow>, FlowError>>;
    fn stocks(&self, query: &SubQuery) -> impl Future<Output = Result<Vec<Stock>, FlowError>>;
    fn nodes(&self, level: NodeLevel) -> impl Future<Output = Result<Vec<Node>, FlowError>>;
    fn materials(&self) -> impl Future<Output = Result<Vec<Material>, FlowError>>;
    fn area(&self, id: &Id) -> impl Future<Output = Result<Area, FlowError>>;
    fn locations(&self, actors: &[Id])
    -> impl Future<Output = Result<Vec<Location>, FlowError>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome<T> {
    Ready(T),
    /// The filter matched nothing.
    Empty,
    /// A newer cycle started before this one finished.
    Stale,
}

impl<T> CycleOutcome<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            CycleOutcome::Ready(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapViewState {
    Idle,
    LoadingLocations,
    Transformed,
    Rendered,
}

/// Handle on one fetch-transform cycle.
#[derive(Debug)]
pub struct Cycle {
    generation: u64,
    watcher: watch::Receiver<u64>,
}

impl Cycle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn handle(&self) -> Cycle {
        Cycle {
            generation: self.generation,
            watcher: self.watcher.clone(),
        }
    }

    pub fn is_current(&self) -> bool {
        *self.watcher.borrow() == self.generation
    }

    /// Resolves once a newer cycle has started (or the session is gone).
    pub async fn superseded(&mut self) {
        loop {
            if *self.watcher.borrow_and_update() != self.generation {
                return;
            }
            if self.watcher.changed().await.is_err() {
                return;
            }
        }
    }
}

pub struct ViewSession {
    generation: watch::Sender<u64>,
    map_state: watch::Sender<MapViewState>,
}

impl ViewSession {
    pub fn new() -> Self {
        ViewSession {
            generation: watch::Sender::new(0),
            map_state: watch::Sender::new(MapViewState::Idle),
        }
    }

    /// Starts a new cycle, superseding any cycle still in flight.
    pub fn begin(&self) -> Cycle {
        let mut generation = 0;
        self.generation.send_modify(|current| {
            *current += 1;
            generation = *current;
        });
        self.map_state.send_replace(MapViewState::Idle);
        tracing::debug!(generation, "started fetch cycle");
        Cycle {
            generation,
            watcher: self.generation.subscribe(),
        }
    }

    pub fn map_state(&self) -> MapViewState {
        *self.map_state.borrow()
    }

    /// Records that the renderer drew the result of `cycle`. Ignored for
    /// superseded cycles.
    pub fn mark_rendered(&self, cycle: &Cycle) {
        self.set_map_state(cycle, MapViewState::Rendered);
    }

    fn set_map_state(&self, cycle: &Cycle, state: MapViewState) {
        if cycle.is_current() {
            self.map_state.send_replace(state);
        }
    }

    pub async fn load_sankey<S: DataSource>(
        &self,
        source: &S,
        spec: &FilterSpec,
        config: &Config,
    ) -> Result<CycleOutcome<SankeyGraph>, FlowError> {
        let cycle = self.begin();
        let mut watcher = cycle.handle();
        let fetched = async {
            let areas = fetch_areas(source, spec).await?;
            let query = build_query(spec, &areas);
            let origin_level = spec.origin_level();
            let destination_level = spec.destination_level();
            let destinations = async {
                if destination_level == origin_level {
                    Ok(None)
                } else {
                    source.nodes(destination_level).await.map(Some)
                }
            };
            let (flows, stocks, origins, destinations, materials) = tokio::try_join!(
                source.flows(&query.flows),
                source.stocks(&query.stocks),
                source.nodes(origin_level),
                destinations,
                source.materials(),
            )?;
            Ok::<_, FlowError>((flows, stocks, origins, destinations, materials))
        };

        let fetched = tokio::select! {
            biased;
            _ = watcher.superseded() => None,
            fetched = fetched => Some(fetched?),
        };
        let Some((flows, stocks, origins, destinations, materials)) =
            fetched.filter(|_| cycle.is_current())
        else {
            tracing::debug!(generation = cycle.generation(), "discarding superseded sankey cycle");
            return Ok(CycleOutcome::Stale);
        };

        let graph = sankey_graph(
            &SankeyInput {
                origins: &origins,
                destinations: destinations.as_deref().unwrap_or(&origins),
                flows: &flows,
                stocks: &stocks,
                materials: &materials,
            },
            config,
        );
        if graph.is_empty() {
            return Ok(CycleOutcome::Empty);
        }
        Ok(CycleOutcome::Ready(graph))
    }

    /// Loads actors and flows, then their locations, clusters them with
    /// `cluster` and builds the map graph. Everything is recomputed per call.
    ///
    /// The returned [`Cycle`] is what [`ViewSession::mark_rendered`] expects
    /// once the graph has been drawn.
    pub async fn load_map<S, C>(
        &self,
        source: &S,
        spec: &FilterSpec,
        config: &Config,
        cluster: C,
    ) -> Result<(Cycle, CycleOutcome<MapGraph>), FlowError>
    where
        S: DataSource,
        C: FnOnce(&[Location]) -> Vec<Cluster>,
    {
        let cycle = self.begin();
        let mut watcher = cycle.handle();
        let state = cycle.handle();
        let fetched = async {
            let areas = fetch_areas(source, spec).await?;
            let query = build_query(spec, &areas);
            let (actors, flows, materials) = tokio::try_join!(
                source.nodes(NodeLevel::Actor),
                source.flows(&query.flows),
                source.materials(),
            )?;
            self.set_map_state(&state, MapViewState::LoadingLocations);
            let ids: Vec<Id> = actors.iter().map(|actor| actor.id.clone()).collect();
            let locations = source.locations(&ids).await?;
            Ok::<_, FlowError>((actors, flows, materials, locations))
        };

        let fetched = tokio::select! {
            biased;
            _ = watcher.superseded() => None,
            fetched = fetched => Some(fetched?),
        };
        let Some((actors, flows, materials, locations)) = fetched.filter(|_| cycle.is_current())
        else {
            tracing::debug!(generation = cycle.generation(), "discarding superseded map cycle");
            return Ok((cycle, CycleOutcome::Stale));
        };

        let clusters = cluster(&locations);
        let graph = map_graph(
            &MapInput {
                actors: &actors,
                locations: &locations,
                flows: &flows,
                materials: &materials,
                clusters: &clusters,
            },
            config,
        );
        self.set_map_state(&cycle, MapViewState::Transformed);
        if graph.is_empty() {
            return Ok((cycle, CycleOutcome::Empty));
        }
        Ok((cycle, CycleOutcome::Ready(graph)))
    }
}

impl Default for ViewSession {
    fn default() -> Self {
        Self::new()
    }
}

async fn fetch_areas<S: DataSource>(source: &S, spec: &FilterSpec) -> Result<Vec<Area>, FlowError> {
    try_join_all(spec.area_ids().iter().map(|id| source.area(id))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Selection;
    use crate::model::MaterialTree;
    use std::sync::Arc;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct MemorySource {
        flows: Vec<Flow>,
        nodes: Vec<Node>,
        locations: Vec<Location>,
        failing: Option<&'static str>,
        gate: Option<Arc<Notify>>,
    }

    impl MemorySource {
        fn check(&self, resource: &'static str) -> Result<(), FlowError> {
            if self.failing == Some(resource) {
                return Err(FlowError::fetch(resource, "503 Service Unavailable"));
            }
            Ok(())
        }
    }

    impl DataSource for MemorySource {
        async fn flows(&self, _query: &SubQuery) -> Result<Vec<Flow>, FlowError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.check("flows")?;
            Ok(self.flows.clone())
        }

        async fn stocks(&self, _query: &SubQuery) -> Result<Vec<Stock>, FlowError> {
            self.check("stocks")?;
            Ok(Vec::new())
        }

        async fn nodes(&self, _level: NodeLevel) -> Result<Vec<Node>, FlowError> {
            self.check("nodes")?;
            Ok(self.nodes.clone())
        }

        async fn materials(&self) -> Result<Vec<Material>, FlowError> {
            Ok(vec![Material::new("m1", "Plastic", None)])
        }

        async fn area(&self, id: &Id) -> Result<Area, FlowError> {
            self.check("areas")?;
            Ok(Area {
                id: id.clone(),
                name: id.to_string(),
                geometry: None,
                level: None,
            })
        }

        async fn locations(&self, actors: &[Id]) -> Result<Vec<Location>, FlowError> {
            self.check("locations")?;
            Ok(self
                .locations
                .iter()
                .filter(|location| actors.contains(&location.actor))
                .cloned()
                .collect())
        }
    }

    fn source() -> MemorySource {
        MemorySource {
            flows: vec![Flow::new("f1", "a", "b", 10.0)],
            nodes: vec![Node::new("a", "Alpha"), Node::new("b", "Beta")],
            locations: vec![
                Location { actor: Id::from("a"), lat: 52.0, lon: 4.0 },
                Location { actor: Id::from("b"), lat: 52.1, lon: 4.1 },
            ],
            ..MemorySource::default()
        }
    }

    fn spec() -> FilterSpec {
        let materials = vec![Material::new("m1", "Plastic", None)];
        let selection = Selection {
            area_ids: vec![Id::from("north")],
            ..Selection::default()
        };
        FilterSpec::resolve(&selection, &MaterialTree::new(&materials))
    }

    #[tokio::test]
    async fn sankey_cycle_builds_graph() {
        let session = ViewSession::new();
        let outcome = session
            .load_sankey(&source(), &spec(), &Config::default())
            .await
            .unwrap();
        let graph = outcome.ready().expect("graph");
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.links.len(), 1);
        assert_eq!(graph.links[0].value, 10.0);
    }

    #[tokio::test]
    async fn no_matching_flows_is_empty() {
        let source = MemorySource {
            flows: Vec::new(),
            ..source()
        };
        let outcome = ViewSession::new()
            .load_sankey(&source, &spec(), &Config::default())
            .await
            .unwrap();
        assert_eq!(outcome, CycleOutcome::Empty);
    }

    #[tokio::test]
    async fn one_failed_fetch_fails_the_cycle() {
        for resource in ["areas", "flows", "stocks", "nodes"] {
            let source = MemorySource {
                failing: Some(resource),
                ..source()
            };
            let err = ViewSession::new()
                .load_sankey(&source, &spec(), &Config::default())
                .await
                .unwrap_err();
            assert!(
                matches!(err, FlowError::Fetch { resource: failed, .. } if failed == resource),
                "{resource}: {err}"
            );
        }
    }

    #[tokio::test]
    async fn newer_cycle_discards_older_result() {
        let gate = Arc::new(Notify::new());
        let source = MemorySource {
            gate: Some(gate.clone()),
            ..source()
        };
        let session = ViewSession::new();
        let spec = spec();
        let config = Config::default();

        let (older, newer) = tokio::join!(session.load_sankey(&source, &spec, &config), async {
            tokio::task::yield_now().await;
            let cycle = session.begin();
            gate.notify_one();
            cycle
        });
        assert_eq!(older.unwrap(), CycleOutcome::Stale);
        assert!(newer.is_current());
    }

    #[tokio::test]
    async fn map_cycle_walks_view_states() {
        let session = ViewSession::new();
        assert_eq!(session.map_state(), MapViewState::Idle);
        let (cycle, outcome) = session
            .load_map(&source(), &spec(), &Config::default(), |locations| {
                assert_eq!(locations.len(), 2);
                Vec::new()
            })
            .await
            .unwrap();
        let graph = outcome.ready().expect("map graph");
        assert_eq!(graph.flows.len(), 1);
        assert_eq!(session.map_state(), MapViewState::Transformed);
        session.mark_rendered(&cycle);
        assert_eq!(session.map_state(), MapViewState::Rendered);
    }

    #[tokio::test]
    async fn superseded_cycle_cannot_mark_rendered() {
        let session = ViewSession::new();
        let (cycle, _) = session
            .load_map(&source(), &spec(), &Config::default(), |_| Vec::new())
            .await
            .unwrap();
        let _newer = session.begin();
        session.mark_rendered(&cycle);
        assert_eq!(session.map_state(), MapViewState::Idle);
    }

    #[tokio::test]
    async fn failed_fetch_fails_the_map_cycle() {
        for resource in ["areas", "nodes", "flows", "locations"] {
            let source = MemorySource {
                failing: Some(resource),
                ..source()
            };
            let session = ViewSession::new();
            let mut clustered = false;
            let err = session
                .load_map(&source, &spec(), &Config::default(), |_| {
                    clustered = true;
                    Vec::new()
                })
                .await
                .unwrap_err();
            assert!(
                matches!(err, FlowError::Fetch { resource: failed, .. } if failed == resource),
                "{resource}: {err}"
            );
            assert!(!clustered, "{resource}: clusterer ran on partial data");
            assert_ne!(session.map_state(), MapViewState::Transformed);
        }
    }
}
