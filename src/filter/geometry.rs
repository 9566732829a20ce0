use crate::model::Geometry;

type Polygon = Vec<Vec<[f64; 2]>>;

/// Merges polygons and multipolygons into one multipolygon.
///
/// Members are collected, not clipped: overlapping inputs stay separate
/// polygons, which is what an `intersects` lookup needs. Exact duplicates are
/// dropped. Returns `None` when nothing was given.
pub fn collect_multipolygon<'a>(
    geometries: impl IntoIterator<Item = &'a Geometry>,
) -> Option<Geometry> {
    let mut polygons: Vec<Polygon> = Vec::new();
    for geometry in geometries {
        match geometry {
            Geometry::Polygon(rings) => push_unique(&mut polygons, rings),
            Geometry::MultiPolygon(members) => {
                for rings in members {
                    push_unique(&mut polygons, rings);
                }
            }
        }
    }
    if polygons.is_empty() {
        return None;
    }
    Some(Geometry::MultiPolygon(polygons))
}

fn push_unique(polygons: &mut Vec<Polygon>, rings: &Polygon) {
    if rings.is_empty() || rings.iter().all(|ring| ring.is_empty()) {
        return;
    }
    if !polygons.iter().any(|existing| existing == rings) {
        polygons.push(rings.clone());
    }
}

/// GeoJSON text of a geometry.
pub fn to_geojson(geometry: &Geometry) -> String {
    serde_json::to_string(geometry).unwrap_or_default()
}
