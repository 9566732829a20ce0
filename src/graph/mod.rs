mod geo;
mod sankey;
pub(crate) mod text;
pub(crate) mod types;
pub use geo::{MapInput, cluster_radius, map_graph};
pub use sankey::{SankeyInput, sankey_graph};
pub use text::{composition_text, format_percent};
pub use types::*;
