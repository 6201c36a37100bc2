mod cache;

pub use cache::BoundedCache;

use std::collections::{BinaryHeap, HashMap};

use tracing::{debug, warn};

use crate::shared::{Cell, Coordinate, Distance, Mode, QuantizedPoint};

/// Cutoff beyond which walking legs fall back to the detour estimate.
const WALK_ROAD_CUTOFF: Distance = Distance::from_meters(300.0);
/// Cutoff beyond which vehicle legs fall back to the detour estimate.
const VEHICLE_ROAD_CUTOFF: Distance = Distance::from_meters(2_000.0);
/// Shared cache capacity; fixed so long-running services stay bounded.
const CACHE_CAPACITY: usize = 5_000;
/// How many spatial-hash rings the nearest-node probe expands through.
const NEAREST_NODE_RINGS: i32 = 3;

/// An undirected weighted road network. Nodes are bare coordinates, edges
/// carry their length in meters.
#[derive(Debug, Default)]
pub struct RoadGraph {
    nodes: Box<[Coordinate]>,
    adjacency: Box<[Box<[(u32, f32)]>]>,
    cell_lookup: HashMap<Cell, Box<[u32]>>,
}

impl RoadGraph {
    /// Builds the graph from a node table and `(a, b, length_m)` edges.
    /// Edges referencing unknown nodes or with non-positive lengths are
    /// skipped and counted.
    pub fn new(nodes: Vec<Coordinate>, edges: Vec<(u32, u32, f32)>) -> Self {
        let mut adjacency: Vec<Vec<(u32, f32)>> = vec![Vec::new(); nodes.len()];
        let mut skipped = 0usize;
        for (a, b, length) in edges {
            if a as usize >= nodes.len() || b as usize >= nodes.len() || length <= 0.0 {
                skipped += 1;
                continue;
            }
            adjacency[a as usize].push((b, length));
            adjacency[b as usize].push((a, length));
        }
        if skipped > 0 {
            warn!("Skipped {skipped} invalid road edges");
        }

        let mut cell_lookup: HashMap<Cell, Vec<u32>> = HashMap::new();
        nodes.iter().enumerate().for_each(|(i, node)| {
            cell_lookup.entry(node.to_cell()).or_default().push(i as u32);
        });
        let cell_lookup = cell_lookup
            .into_iter()
            .map(|(cell, nodes)| (cell, nodes.into()))
            .collect();

        debug!("Road graph: {} nodes", nodes.len());
        Self {
            nodes: nodes.into(),
            adjacency: adjacency.into_iter().map(|val| val.into()).collect(),
            cell_lookup,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Snaps a coordinate to the closest graph node, probing outward through
    /// the spatial hash. Returns the node and the snap distance.
    pub fn nearest_node(&self, coordinate: &Coordinate) -> Option<(u32, Distance)> {
        let (origin_x, origin_y) = coordinate.to_cell();
        let mut best: Option<(u32, Distance)> = None;
        for reach in 0..=NEAREST_NODE_RINGS {
            for x in -reach..=reach {
                for y in -reach..=reach {
                    if x.abs() != reach && y.abs() != reach {
                        continue;
                    }
                    let Some(nodes) = self.cell_lookup.get(&(origin_x + x, origin_y + y)) else {
                        continue;
                    };
                    for node_idx in nodes.iter() {
                        let d = self.nodes[*node_idx as usize].haversine_distance(coordinate);
                        if best.is_none_or(|(_, best_d)| d < best_d) {
                            best = Some((*node_idx, d));
                        }
                    }
                }
            }
            // A hit in ring r can still be beaten inside ring r+1, so probe
            // one ring past the first hit before settling.
            if let Some((_, d)) = best
                && d.as_meters() < reach as f32 * crate::shared::geo::SPATIAL_CELL_SIZE.as_meters()
            {
                break;
            }
        }
        best
    }

    /// Dijkstra by edge length, abandoned once the frontier passes `cutoff`
    /// meters.
    pub fn shortest_path_length(&self, from: u32, to: u32, cutoff: f32) -> Option<f32> {
        if from == to {
            return Some(0.0);
        }
        let mut dist: Vec<f32> = vec![f32::INFINITY; self.nodes.len()];
        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
        dist[from as usize] = 0.0;
        heap.push(HeapEntry {
            cost: 0.0,
            node: from,
        });

        while let Some(HeapEntry { cost, node }) = heap.pop() {
            if node == to {
                return Some(cost);
            }
            if cost > dist[node as usize] || cost > cutoff {
                continue;
            }
            for (next, length) in self.adjacency[node as usize].iter() {
                let next_cost = cost + length;
                if next_cost < dist[*next as usize] {
                    dist[*next as usize] = next_cost;
                    heap.push(HeapEntry {
                        cost: next_cost,
                        node: *next,
                    });
                }
            }
        }
        None
    }
}

struct HeapEntry {
    cost: f32,
    node: u32,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.node == other.node
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Min-heap on cost; ties broken on node index for determinism.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// The geo kernel: best-effort road distances with graceful degradation to
/// haversine times a mode detour factor, behind bounded quantized caches.
#[derive(Debug)]
pub struct GeoKernel {
    graph: Option<RoadGraph>,
    path_cache: BoundedCache<(QuantizedPoint, QuantizedPoint), Option<f32>>,
    nearest_cache: BoundedCache<QuantizedPoint, Option<(u32, f32)>>,
}

impl GeoKernel {
    pub fn new(graph: Option<RoadGraph>) -> Self {
        if graph.is_none() {
            warn!("No road graph loaded; distances degrade to haversine with detour factors");
        }
        Self {
            graph,
            path_cache: BoundedCache::new(CACHE_CAPACITY),
            nearest_cache: BoundedCache::new(CACHE_CAPACITY),
        }
    }

    pub fn has_graph(&self) -> bool {
        self.graph.is_some()
    }

    /// Best-effort road distance between two coordinates for the given mode.
    pub fn distance(&self, from: &Coordinate, to: &Coordinate, mode: Mode) -> Distance {
        let straight = from.haversine_distance(to);
        let detour = straight * mode.params().detour_factor;
        let cutoff = if mode == Mode::Walk {
            WALK_ROAD_CUTOFF
        } else {
            VEHICLE_ROAD_CUTOFF
        };
        if self.graph.is_none() || straight > cutoff {
            return detour;
        }

        match self.road_path(from, to, straight) {
            Some(road) => {
                let road = Distance::from_meters(road);
                // Short walks can cut corners the road graph does not model.
                if mode == Mode::Walk && road > straight * 1.2 {
                    straight * 1.2
                } else {
                    road
                }
            }
            None => detour,
        }
    }

    pub fn walk_distance(&self, from: &Coordinate, to: &Coordinate) -> Distance {
        self.distance(from, to, Mode::Walk)
    }

    fn road_path(&self, from: &Coordinate, to: &Coordinate, straight: Distance) -> Option<f32> {
        let key = (from.quantized(), to.quantized());
        self.path_cache.get_or_insert_with(key, || {
            let graph = self.graph.as_ref()?;
            let (from_node, from_snap) = self.snap(from)?;
            let (to_node, to_snap) = self.snap(to)?;
            let cutoff = straight.as_meters() * 3.0 + 1_000.0;
            let path = graph.shortest_path_length(from_node, to_node, cutoff)?;
            Some(path + from_snap + to_snap)
        })
    }

    fn snap(&self, coordinate: &Coordinate) -> Option<(u32, f32)> {
        self.nearest_cache
            .get_or_insert_with(coordinate.quantized(), || {
                let graph = self.graph.as_ref()?;
                graph
                    .nearest_node(coordinate)
                    .map(|(node, d)| (node, d.as_meters()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_graph() -> RoadGraph {
        // Four nodes along a street running east, 200 m apart.
        let nodes = vec![
            Coordinate::new(37.5000, 127.0000),
            Coordinate::new(37.5000, 127.0023),
            Coordinate::new(37.5000, 127.0046),
            Coordinate::new(37.5000, 127.0069),
        ];
        let edges = vec![(0, 1, 200.0), (1, 2, 200.0), (2, 3, 200.0)];
        RoadGraph::new(nodes, edges)
    }

    #[test]
    fn dijkstra_follows_the_street() {
        let graph = line_graph();
        let d = graph.shortest_path_length(0, 3, 10_000.0).unwrap();
        assert!((d - 600.0).abs() < 0.1);
    }

    #[test]
    fn dijkstra_respects_cutoff() {
        let graph = line_graph();
        assert!(graph.shortest_path_length(0, 3, 100.0).is_none());
    }

    #[test]
    fn nearest_node_snaps() {
        let graph = line_graph();
        let probe = Coordinate::new(37.5001, 127.0001);
        let (node, d) = graph.nearest_node(&probe).unwrap();
        assert_eq!(node, 0);
        assert!(d.as_meters() < 50.0);
    }

    #[test]
    fn kernel_without_graph_uses_detour() {
        let kernel = GeoKernel::new(None);
        let from = Coordinate::new(37.5000, 127.0000);
        let to = Coordinate::new(37.5000, 127.0046);
        let straight = from.haversine_distance(&to);
        let walk = kernel.distance(&from, &to, Mode::Walk);
        assert!((walk.as_meters() - straight.as_meters() * 1.2).abs() < 1.0);
        let ride = kernel.distance(&from, &to, Mode::Kickboard);
        assert!((ride.as_meters() - straight.as_meters() * 1.3).abs() < 1.0);
    }

    #[test]
    fn kernel_with_graph_measures_roads() {
        let kernel = GeoKernel::new(Some(line_graph()));
        let from = Coordinate::new(37.5000, 127.0000);
        let to = Coordinate::new(37.5000, 127.0069);
        let ride = kernel.distance(&from, &to, Mode::Kickboard);
        // Street distance plus snap slack; never the bare detour guess.
        assert!(ride.as_meters() > 500.0 && ride.as_meters() < 800.0);
    }

    #[test]
    fn repeated_lookup_is_cached() {
        let kernel = GeoKernel::new(Some(line_graph()));
        let from = Coordinate::new(37.5000, 127.0000);
        let to = Coordinate::new(37.5000, 127.0069);
        let first = kernel.distance(&from, &to, Mode::Kickboard);
        let second = kernel.distance(&from, &to, Mode::Kickboard);
        assert_eq!(first, second);
        assert!(!kernel.path_cache.is_empty());
    }
}
