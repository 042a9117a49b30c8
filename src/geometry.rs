//! Integer line rasterization.

use crate::grid::CellPos;

/// Bresenham line from `from` to `to`, both endpoints included.
///
/// Consecutive cells are edge- or corner-adjacent and the path holds exactly
/// `max(|dx|, |dy|) + 1` cells.
pub fn trace_line(from: CellPos, to: CellPos) -> Vec<CellPos> {
    let dx = (i64::from(to.x) - i64::from(from.x)).abs();
    let dy = (i64::from(to.y) - i64::from(from.y)).abs();
    let sx = if from.x < to.x { 1 } else { -1 };
    let sy = if from.y < to.y { 1 } else { -1 };
    let mut err = dx - dy;

    let mut points = Vec::with_capacity(dx.max(dy) as usize + 1);
    let (mut x, mut y) = (from.x, from.y);
    loop {
        points.push(CellPos::new(x, y));
        if x == to.x && y == to.y {
            break;
        }
        let e2 = err * 2;
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
    }
    points
}
