//! Terminal-configuration scoring: local wall/open topology (`pb`), box-to-goal
//! congestion (`pc`), and box count (`n`), combined into the final reward.

use crate::grid::{is_block, is_box, is_goal, Grid, INVALID_INDEX};

pub const CONGESTION_ALPHA: f64 = 1.9;
pub const CONGESTION_BETA: f64 = 0.1;
pub const CONGESTION_GAMMA: f64 = 1.3;

/// Count of 3x3 windows (fully inside the grid) containing both a block cell and a
/// non-block cell — a coarse measure of how much "topology" (wall/open contrast) the
/// level has, rather than being uniformly open or uniformly walled.
pub fn topology_score(grid: &Grid) -> f64 {
    if grid.width < 3 || grid.height < 3 {
        return 0.0;
    }
    let mut count = 0;
    for wy in 0..=(grid.height - 3) {
        for wx in 0..=(grid.width - 3) {
            let mut has_block = false;
            let mut has_non_block = false;
            for dy in 0..3 {
                for dx in 0..3 {
                    let pawn = grid.get(wx + dx, wy + dy);
                    if is_block(pawn) {
                        has_block = true;
                    } else {
                        has_non_block = true;
                    }
                }
            }
            if has_block && has_non_block {
                count += 1;
            }
        }
    }
    count as f64
}

/// Box-to-goal congestion: for every (origin, destination) pair recorded in `second`,
/// walk the axis-aligned rectangle between the two cells and weigh how crowded it is
/// with other boxes, goals, and blocks.
pub fn congestion(grid: &Grid, second: &[u8]) -> f64 {
    let mut total = 0.0;
    for (origin, &dest) in second.iter().enumerate() {
        if dest == INVALID_INDEX {
            continue;
        }
        let (ox, oy) = grid.as_tile(origin);
        let (gx, gy) = grid.as_tile(dest as usize);

        let (x0, x1) = (ox.min(gx), ox.max(gx));
        let (y0, y1) = (oy.min(gy), oy.max(gy));

        // The rectangle's own corners are the box's origin and destination, so net
        // those two cells back out: only *other* interfering boxes/goals should count.
        let mut boxes_in_rect = -1;
        let mut goals_in_rect = -1;
        let mut blocks_in_rect = 0;
        let mut area = 0;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let pawn = grid.get(x, y);
                area += 1;
                if is_box(pawn) {
                    boxes_in_rect += 1;
                }
                if is_goal(pawn) {
                    goals_in_rect += 1;
                }
                if is_block(pawn) {
                    blocks_in_rect += 1;
                }
            }
        }

        let denom = CONGESTION_GAMMA * (area - blocks_in_rect) as f64;
        if denom > 0.0 {
            total += (CONGESTION_ALPHA * boxes_in_rect as f64
                + CONGESTION_BETA * goals_in_rect as f64)
                / denom;
        }
    }
    total
}

/// Final reward for a terminal grid, given the `second` array recording each box's
/// origin -> destination mapping (see the node state-machine doc for the encoding).
pub fn score_terminal(grid: &Grid, second: &[u8], box_count: i32) -> f64 {
    if box_count <= 0 {
        return 0.0;
    }
    let pb = topology_score(grid);
    let pc = congestion(grid, second);
    let n = box_count as f64;
    let area = grid.area() as f64;
    (3.0 * pb + 7.0 * pc + 8.0 * n) / 55.0 * (25.0 / area)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::char_to_pawn;

    fn grid_from_rows(rows: &[&str]) -> Grid {
        let height = rows.len() as i32;
        let width = rows[0].chars().count() as i32;
        let mut grid = Grid::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                grid.set(x as i32, y as i32, char_to_pawn(c).unwrap());
            }
        }
        grid
    }

    #[test]
    fn zero_box_count_scores_zero() {
        let grid = grid_from_rows(&["xxxxx", "x---x", "x-p-x", "x---x", "xxxxx"]);
        let second = vec![INVALID_INDEX; grid.data.len()];
        assert_eq!(score_terminal(&grid, &second, 0), 0.0);
    }

    #[test]
    fn single_box_baseline_scores_around_point_four() {
        // 11x11 bordered board, one box pushed along an open corridor to its goal.
        // With a single box in play, congestion always nets to zero (there are no
        // *other* boxes or goals for the rectangle to catch), so this pins down
        // topology_score/area scaling alone: (3*pb + 8)/55 * (25/area) ~= 0.4.
        let grid = grid_from_rows(&[
            "xxxxxxxxxxx",
            "xp--------x",
            "x--c------x",
            "x---------x",
            "x---------x",
            "x---------x",
            "x---------x",
            "x---------x",
            "x--g------x",
            "x---------x",
            "xxxxxxxxxxx",
        ]);
        let mut second = vec![INVALID_INDEX; grid.data.len()];
        let origin = grid.as_index(3, 2);
        let dest = grid.as_index(3, 8);
        second[origin] = dest as u8;
        let score = score_terminal(&grid, &second, 1);
        assert!((score - 0.4).abs() < 0.01, "score was {score}");
    }

    #[test]
    fn topology_counts_mixed_windows_only() {
        let all_open = grid_from_rows(&["-----", "-----", "-----", "-----", "-----"]);
        assert_eq!(topology_score(&all_open), 0.0);

        let mixed = grid_from_rows(&["xxxxx", "x---x", "x---x", "x---x", "xxxxx"]);
        assert!(topology_score(&mixed) > 0.0);
    }

    #[test]
    fn congestion_grows_with_distance_between_box_and_goal() {
        let near = grid_from_rows(&["xxxxxx", "x-Cc-x", "x----x", "x----x", "x-p--x", "xxxxxx"]);
        let mut near_second = vec![INVALID_INDEX; near.data.len()];
        near_second[near.as_index(3, 1)] = near.as_index(2, 1) as u8;

        let far = grid_from_rows(&["xxxxxx", "x-C--x", "x----x", "x----x", "x-cp-x", "xxxxxx"]);
        let mut far_second = vec![INVALID_INDEX; far.data.len()];
        far_second[far.as_index(3, 4)] = far.as_index(2, 1) as u8;

        assert!(congestion(&far, &far_second) >= congestion(&near, &near_second));
    }
}
