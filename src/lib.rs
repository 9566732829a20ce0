pub mod aggregate;
#[cfg(feature = "cli")]
pub mod cli;
pub mod color;
pub mod config;
pub mod error;
pub mod filter;
pub mod graph;
pub mod model;
pub mod output;
#[cfg(feature = "session")]
pub mod session;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use color::{Color, color_by_name};
pub use config::{Config, load_config};
pub use error::FlowError;
pub use filter::{FilterSpec, QueryDescription, Selection, build_query};
pub use graph::{MapGraph, MapInput, SankeyGraph, SankeyInput, map_graph, sankey_graph};
pub use output::{GraphSummary, write_json};
#[cfg(feature = "session")]
pub use session::{CycleOutcome, DataSource, MapViewState, ViewSession};
pub use theme::Theme;
