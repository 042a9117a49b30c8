use std::any::Any;

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use crate::{
    engine::{GenerationStage, Phase, PhaseContext},
    geometry::trace_line,
    grid::{CellPos, Grid},
    rng::PhaseRng,
    tile::TileKind,
};

/// A spanning-tree connection between two anchors, by anchor index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoadEdge {
    pub from: usize,
    pub to: usize,
}

/// Greedy Prim expansion from anchor 0 over Euclidean distance.
///
/// Returns `points.len() - 1` edges for two or more points, none otherwise.
/// Ties keep the first pair found, scanning connected anchors in the order
/// they joined the tree and candidates by index.
pub fn spanning_edges(points: &[CellPos]) -> Vec<RoadEdge> {
    if points.len() < 2 {
        return Vec::new();
    }

    let mut connected = vec![0usize];
    let mut in_tree = vec![false; points.len()];
    in_tree[0] = true;
    let mut edges = Vec::with_capacity(points.len() - 1);

    while connected.len() < points.len() {
        let mut best: Option<(i64, RoadEdge)> = None;
        for &from in &connected {
            for to in (0..points.len()).filter(|idx| !in_tree[*idx]) {
                let dist = distance_sq(points[from], points[to]);
                if best.map_or(true, |(best_dist, _)| dist < best_dist) {
                    best = Some((dist, RoadEdge { from, to }));
                }
            }
        }
        // The loop guard leaves at least one candidate, so `best` is set.
        let Some((_, edge)) = best else { break };
        in_tree[edge.to] = true;
        connected.push(edge.to);
        edges.push(edge);
    }
    edges
}

fn distance_sq(a: CellPos, b: CellPos) -> i64 {
    let dx = i64::from(a.x) - i64::from(b.x);
    let dy = i64::from(a.y) - i64::from(b.y);
    dx * dx + dy * dy
}

/// Paints `Road` over a square of half-width `thickness / 2` around every path
/// cell. `Building` cells and off-map cells are left alone.
pub fn stamp_road(grid: &mut Grid, path: &[CellPos], thickness: u32) {
    let radius = (thickness / 2) as i32;
    for cell in path {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let target = cell.offset(dx, dy);
                if grid.in_bounds(target.x, target.y) && grid.get_at(target) != TileKind::Building
                {
                    grid.set_at(target, TileKind::Road);
                }
            }
        }
    }
}

/// Connects all anchors with a minimum spanning road network and returns the
/// edges that were drawn.
pub fn build_roads(grid: &mut Grid, anchors: &[CellPos], thickness: u32) -> Vec<RoadEdge> {
    let edges = spanning_edges(anchors);
    for edge in &edges {
        let path = trace_line(anchors[edge.from], anchors[edge.to]);
        stamp_road(grid, &path, thickness);
    }
    edges
}

/// Straight east-west highway through the middle row of the map.
pub fn add_highway(grid: &mut Grid, width: u32) {
    if grid.width() == 0 || grid.height() == 0 {
        return;
    }
    let mid_y = (grid.height() / 2) as i32;
    let path = trace_line(
        CellPos::new(0, mid_y),
        CellPos::new(grid.width() as i32 - 1, mid_y),
    );
    stamp_road(grid, &path, width);
}

/// Reverts road cells with no road neighbor to nature. Returns how many were
/// removed.
pub fn prune_isolated_roads(grid: &mut Grid) -> usize {
    let isolated: Vec<CellPos> = grid
        .cells()
        .filter(|p| {
            grid.get_at(*p) == TileKind::Road && grid.neighbor_mask(p.x, p.y, TileKind::Road) == 0
        })
        .collect();
    for pos in &isolated {
        grid.set_at(*pos, TileKind::Nature);
    }
    isolated.len()
}

/// Groups 4-connected road cells into paths. Single-cell fragments are not
/// reported.
pub fn trace_road_paths(grid: &Grid) -> Vec<Vec<CellPos>> {
    let width = grid.width() as usize;
    let mut visited = vec![false; grid.tile_count()];
    let mut paths = Vec::new();

    for start in grid.cells() {
        let start_idx = start.y as usize * width + start.x as usize;
        if visited[start_idx] || grid.get_at(start) != TileKind::Road {
            continue;
        }
        let mut path = Vec::new();
        let mut stack = vec![start];
        visited[start_idx] = true;
        while let Some(pos) = stack.pop() {
            path.push(pos);
            for next in grid.neighbors(pos) {
                let idx = next.y as usize * width + next.x as usize;
                if !visited[idx] && grid.get_at(next) == TileKind::Road {
                    visited[idx] = true;
                    stack.push(next);
                }
            }
        }
        if path.len() > 1 {
            paths.push(path);
        }
    }
    paths
}

pub struct RoadPhase {
    thickness: u32,
    highway_width: Option<u32>,
    prune_isolated: bool,
    edges: Vec<RoadEdge>,
}

impl RoadPhase {
    pub fn new(thickness: u32) -> Self {
        Self {
            thickness,
            highway_width: None,
            prune_isolated: false,
            edges: Vec::new(),
        }
    }

    pub fn with_highway(mut self, width: Option<u32>) -> Self {
        self.highway_width = width.filter(|w| *w > 0);
        self
    }

    pub fn with_pruning(mut self, prune_isolated: bool) -> Self {
        self.prune_isolated = prune_isolated;
        self
    }

    /// Edges chosen by the most recent run.
    pub fn edges(&self) -> &[RoadEdge] {
        &self.edges
    }
}

impl Default for RoadPhase {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Phase for RoadPhase {
    fn name(&self) -> &str {
        "roads"
    }

    fn completes(&self) -> GenerationStage {
        GenerationStage::RoadsPlaced
    }

    fn run(&mut self, ctx: &PhaseContext, grid: &mut Grid, _rng: &mut PhaseRng<'_>) -> Result<()> {
        let points: Vec<CellPos> = ctx.anchors.iter().map(|a| a.pos).collect();
        self.edges = build_roads(grid, &points, self.thickness);
        if let Some(width) = self.highway_width {
            add_highway(grid, width);
        }
        let pruned = if self.prune_isolated {
            prune_isolated_roads(grid)
        } else {
            0
        };
        debug!(
            segments = self.edges.len(),
            road_cells = grid.count(TileKind::Road),
            pruned,
            "road network built"
        );
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    fn connected_through(grid: &Grid, from: CellPos, targets: &[CellPos], kinds: &[TileKind]) -> bool {
        let width = grid.width() as usize;
        let mut seen = vec![false; grid.tile_count()];
        let mut queue = VecDeque::from([from]);
        seen[from.y as usize * width + from.x as usize] = true;
        while let Some(pos) = queue.pop_front() {
            for next in grid.neighbors(pos) {
                let idx = next.y as usize * width + next.x as usize;
                if !seen[idx] && kinds.contains(&grid.get_at(next)) {
                    seen[idx] = true;
                    queue.push_back(next);
                }
            }
        }
        targets
            .iter()
            .all(|t| seen[t.y as usize * width + t.x as usize])
    }

    #[test]
    fn spanning_tree_has_n_minus_one_edges() {
        assert!(spanning_edges(&[]).is_empty());
        assert!(spanning_edges(&[CellPos::new(3, 3)]).is_empty());

        let points = [
            CellPos::new(0, 0),
            CellPos::new(10, 0),
            CellPos::new(10, 10),
            CellPos::new(0, 10),
            CellPos::new(5, 5),
        ];
        let edges = spanning_edges(&points);
        assert_eq!(edges.len(), points.len() - 1);

        let mut joined = vec![false; points.len()];
        joined[0] = true;
        for edge in &edges {
            assert!(joined[edge.from], "edge starts outside the tree");
            assert!(!joined[edge.to], "edge would close a cycle");
            joined[edge.to] = true;
        }
        assert!(joined.iter().all(|j| *j));
    }

    #[test]
    fn triangle_scenario_picks_two_shortest_links() {
        let points = [CellPos::new(0, 0), CellPos::new(500, 0), CellPos::new(250, 400)];
        let edges = spanning_edges(&points);
        assert_eq!(
            edges,
            vec![RoadEdge { from: 0, to: 2 }, RoadEdge { from: 2, to: 1 }]
        );

        let mut grid = Grid::new(501, 401);
        let drawn = build_roads(&mut grid, &points, 3);
        assert_eq!(drawn.len(), 2);
        assert!(connected_through(&grid, points[0], &points, &[TileKind::Road]));
    }

    #[test]
    fn two_anchors_give_one_straight_road() {
        let mut grid = Grid::new(20, 5);
        let points = [CellPos::new(2, 2), CellPos::new(17, 2)];
        let edges = build_roads(&mut grid, &points, 1);

        assert_eq!(edges, vec![RoadEdge { from: 0, to: 1 }]);
        assert_eq!(grid.count(TileKind::Road), 16);
        assert!((2..=17).all(|x| grid.get(x, 2) == TileKind::Road));
    }

    #[test]
    fn thickness_widens_the_road() {
        let mut grid = Grid::new(20, 9);
        build_roads(&mut grid, &[CellPos::new(2, 4), CellPos::new(17, 4)], 3);
        // 16 path cells widened by one cell on each side.
        assert_eq!(grid.count(TileKind::Road), 18 * 3);
    }

    #[test]
    fn roads_never_overwrite_buildings_but_do_overwrite_city() {
        let mut grid = Grid::new(12, 5);
        grid.set(5, 2, TileKind::Building);
        grid.set(7, 2, TileKind::City);
        build_roads(&mut grid, &[CellPos::new(1, 2), CellPos::new(10, 2)], 1);

        assert_eq!(grid.get(5, 2), TileKind::Building);
        assert_eq!(grid.get(7, 2), TileKind::Road);
    }

    #[test]
    fn thick_roads_at_edges_are_clipped() {
        let mut grid = Grid::new(6, 6);
        build_roads(&mut grid, &[CellPos::new(0, 0), CellPos::new(5, 0)], 5);
        assert_eq!(grid.count(TileKind::Road), 6 * 3);
    }

    #[test]
    fn highway_and_pruning() {
        let mut grid = Grid::new(10, 10);
        add_highway(&mut grid, 3);
        assert_eq!(grid.count(TileKind::Road), 30);
        assert!((0..10).all(|x| grid.get(x, 5) == TileKind::Road));

        grid.set(0, 0, TileKind::Road);
        grid.set(9, 9, TileKind::Road);
        assert_eq!(prune_isolated_roads(&mut grid), 2);
        assert_eq!(grid.count(TileKind::Road), 30);
    }

    #[test]
    fn path_tracing_groups_components() {
        let mut grid = Grid::new(10, 10);
        build_roads(&mut grid, &[CellPos::new(0, 1), CellPos::new(9, 1)], 1);
        build_roads(&mut grid, &[CellPos::new(0, 7), CellPos::new(4, 7)], 1);
        grid.set(8, 8, TileKind::Road);

        let mut lengths: Vec<usize> = trace_road_paths(&grid).iter().map(Vec::len).collect();
        lengths.sort();
        assert_eq!(lengths, vec![5, 10]);
    }
}
