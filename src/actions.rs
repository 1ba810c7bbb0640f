//! The five constructive actions plus `bloom`, expressed as candidate-pool generation
//! (`bloom`) and consume-one-candidate child construction (the rest). Each `*_action`
//! function consumes exactly one candidate from its parent's pool and appends one new
//! child to the tree, enforcing the phase-1 / phase-2 state machine described in the
//! node module.

use crate::config::Config;
use crate::grid::{
    bot_layer, is_block, is_box, is_empty_top, Direction, Grid, MoveInfo, BOX, GOAL, INVALID_INDEX,
    PUSHER,
};
use crate::node::{flags, Node, NodeId, Phase};
use crate::rng::LevelRng;
use crate::tree::NodeStore;

/// Populate `first`/`second` (phase 1) or `moves` (phase 2) for a freshly-created,
/// not-yet-bloomed node. Idempotent: a second call on an already-bloomed node is a
/// no-op.
pub fn bloom<S: NodeStore>(store: &mut S, id: NodeId, config: &Config) {
    if store.get(id).is_bloomed() {
        return;
    }
    match store.get(id).phase() {
        Phase::One => bloom_phase_one(store, id, config),
        Phase::Two => bloom_phase_two(store, id, config),
    }
    store.get_mut(id).set_flag(flags::BLOOMED);
}

fn adjacent_to_non_block(grid: &Grid, x: i32, y: i32) -> bool {
    Direction::ALL.iter().any(|&dir| {
        let (dx, dy) = dir.delta();
        let (nx, ny) = (x + dx, y + dy);
        grid.in_grid(nx, ny) && !is_block(grid.get(nx, ny))
    })
}

fn bloom_phase_one<S: NodeStore>(store: &mut S, id: NodeId, config: &Config) {
    let node = store.get(id);
    let grid = &node.grid;
    let spawn = node.pusher as usize;

    let mut first = Vec::new();
    for idx in 0..grid.data.len() {
        if is_block(grid.get_index(idx)) {
            let (x, y) = grid.as_tile(idx);
            if adjacent_to_non_block(grid, x, y) {
                first.push(idx as u8);
            }
        }
    }

    let mut second = Vec::new();
    if node.box_count < config.effective_box_upper_cutoff() {
        for idx in 0..grid.data.len() {
            if idx != spawn && is_empty_top(grid.get_index(idx)) {
                second.push(idx as u8);
            }
        }
    }

    let can_freeze = node.box_count >= config.box_lower_cutoff
        && node.depth >= config.depth_lower_cutoff
        && !node.is_frozen();

    let node = store.get_mut(id);
    node.first = first;
    node.second = second;
    if can_freeze {
        node.set_flag(flags::CAN_FREEZE);
    }
}

fn simple_moves(grid: &Grid, pusher: usize) -> Vec<MoveInfo> {
    let (x, y) = grid.as_tile(pusher);
    Direction::ALL
        .iter()
        .filter(|&&dir| grid.could_move(x, y, dir))
        .map(|&direction| MoveInfo {
            index: pusher as u8,
            direction,
        })
        .collect()
}

fn bloom_phase_two<S: NodeStore>(store: &mut S, id: NodeId, config: &Config) {
    let node = store.get(id);
    let pusher = node.pusher as usize;
    let moves = if config.use_simple_moves {
        simple_moves(&node.grid, pusher)
    } else {
        node.grid.reachable_moves(pusher)
    };
    store.get_mut(id).moves = moves;
}

/// Remove one block cell orthogonally adjacent to a non-block cell, chosen uniformly
/// at random among `first`'s remaining candidates.
pub fn delete_block<S: NodeStore, R: LevelRng>(store: &mut S, id: NodeId, rng: &mut R) -> NodeId {
    let node = store.get(id);
    debug_assert!(!node.first.is_empty(), "delete_block with no candidates");
    let choice = rng.range_i64(0, node.first.len() as i64 - 1) as usize;
    let cell = node.first[choice] as usize;

    let mut grid = node.grid.clone();
    grid.set_index(cell, bot_layer(grid.get_index(cell)));

    let depth = node.depth + 1;
    let box_count = node.box_count;
    let pusher = node.pusher;
    store.get_mut(id).first.swap_remove(choice);

    let child = Node::child_of(id, grid, pusher, depth, box_count);
    store.push_child(id, child)
}

/// Place a box on one candidate empty cell, chosen uniformly at random among
/// `second`'s remaining candidates.
pub fn place_box<S: NodeStore, R: LevelRng>(store: &mut S, id: NodeId, rng: &mut R) -> NodeId {
    let node = store.get(id);
    debug_assert!(!node.second.is_empty(), "place_box with no candidates");
    let choice = rng.range_i64(0, node.second.len() as i64 - 1) as usize;
    let cell = node.second[choice] as usize;

    let mut grid = node.grid.clone();
    let bot = bot_layer(grid.get_index(cell));
    grid.set_index(cell, bot | BOX);

    let depth = node.depth + 1;
    let box_count = node.box_count + 1;
    let pusher = node.pusher;
    store.get_mut(id).second.swap_remove(choice);

    let child = Node::child_of(id, grid, pusher, depth, box_count);
    store.push_child(id, child)
}

fn is_off_grid_or_block(grid: &Grid, x: i32, y: i32) -> bool {
    !grid.in_grid(x, y) || is_block(grid.get(x, y))
}

fn manhattan_adjacent(a: (i32, i32), b: (i32, i32)) -> bool {
    (a.0 - b.0).abs() + (a.1 - b.1).abs() == 1
}

/// Prune 2x2-window deadlocks: four boxes, three walls (including off-grid) plus one
/// box, or two walls plus two edge-adjacent boxes all indicate a configuration no
/// agent could ever resolve, so one box in the offending window is removed.
pub fn remove_impossible_v2(grid: &mut Grid, first: &mut [u8], second: &mut [u8], box_count: &mut i32) {
    for wy in -1..grid.height {
        for wx in -1..grid.width {
            let corners = [(wx, wy), (wx + 1, wy), (wx, wy + 1), (wx + 1, wy + 1)];
            let mut wall_count = 0;
            let mut boxes = Vec::new();
            for &(x, y) in &corners {
                if is_off_grid_or_block(grid, x, y) {
                    wall_count += 1;
                } else if is_box(grid.get(x, y)) {
                    boxes.push((x, y));
                }
            }

            let target = if boxes.len() == 4 {
                Some(boxes[0])
            } else if wall_count == 3 && boxes.len() == 1 {
                Some(boxes[0])
            } else if wall_count == 2 && boxes.len() == 2 && manhattan_adjacent(boxes[0], boxes[1]) {
                Some(boxes[0])
            } else {
                None
            };

            if let Some((bx, by)) = target {
                let idx = grid.as_index(bx, by);
                grid.set_index(idx, bot_layer(grid.get_index(idx)));
                first[idx] = INVALID_INDEX;
                second[idx] = INVALID_INDEX;
                *box_count -= 1;
            }
        }
    }
}

/// Transition a phase-1 node into phase 2: re-key `first`/`second` as origin/push-count
/// state, optionally deadlock-prune, and remove the spawn box if one is sitting there.
pub fn freeze<S: NodeStore>(store: &mut S, id: NodeId, config: &Config) -> NodeId {
    let node = store.get(id);
    debug_assert!(node.can_freeze(), "freeze without CAN_FREEZE");

    let mut grid = node.grid.clone();
    let area = grid.data.len();
    let mut first = vec![INVALID_INDEX; area];
    let mut second = vec![INVALID_INDEX; area];
    let mut box_count = node.box_count;
    let pusher = node.pusher;

    for idx in 0..area {
        if is_box(grid.get_index(idx)) {
            first[idx] = idx as u8;
            second[idx] = 0;
        }
    }

    let spawn_idx = pusher as usize;
    if is_box(grid.get_index(spawn_idx)) {
        grid.set_index(spawn_idx, bot_layer(grid.get_index(spawn_idx)));
        first[spawn_idx] = INVALID_INDEX;
        second[spawn_idx] = INVALID_INDEX;
        box_count -= 1;
    }
    grid.set_index(spawn_idx, bot_layer(grid.get_index(spawn_idx)) | PUSHER);

    if config.remove_impossible {
        remove_impossible_v2(&mut grid, &mut first, &mut second, &mut box_count);
    }

    let depth = node.depth + 1;
    let mut child = Node::child_of(id, grid, pusher, depth, box_count);
    child.first = first;
    child.second = second;
    child.set_flag(flags::SECOND_ACTION);

    let child_id = store.push_child(id, child);
    store.get_mut(id).set_flag(flags::FROZEN);
    child_id
}

/// Pick one candidate push, walk the pusher to it and push the box one cell, updating
/// the box's origin/push-count tracking in `first`/`second`.
pub fn move_agent<S: NodeStore, R: LevelRng>(store: &mut S, id: NodeId, rng: &mut R) -> NodeId {
    let node = store.get(id);
    debug_assert!(node.box_count > 0 && !node.moves.is_empty());
    let choice = rng.range_i64(0, node.moves.len() as i64 - 1) as usize;
    let mv = node.moves[choice];

    let mut grid = node.grid.clone();
    let mut first = node.first.clone();
    let mut second = node.second.clone();

    let (x, y) = grid.as_tile(mv.index as usize);
    let pusher_idx = node.pusher as usize;
    grid.set_index(pusher_idx, bot_layer(grid.get_index(pusher_idx)));
    grid.set_index(mv.index as usize, bot_layer(grid.get_index(mv.index as usize)) | PUSHER);
    let pushed = grid.pawn_move(mv.direction);
    debug_assert!(pushed, "move_agent selected an illegal candidate move");

    let (dx, dy) = mv.direction.delta();
    let box_from = grid.as_index(x + dx, y + dy);
    let box_to = grid.as_index(x + 2 * dx, y + 2 * dy);
    let origin = first[box_from];
    let push_count = second[box_from];
    debug_assert_ne!(origin, INVALID_INDEX, "pushed cell had no tracked box origin");
    first[box_to] = origin;
    second[box_to] = push_count.saturating_add(1);
    first[box_from] = INVALID_INDEX;
    second[box_from] = INVALID_INDEX;

    let (px, py) = grid.get_pusher_position();
    let new_pusher = grid.as_index(px, py) as u8;

    let depth = node.depth + 1;
    let box_count = node.box_count;
    store.get_mut(id).moves.swap_remove(choice);

    let mut child = Node::child_of(id, grid, new_pusher, depth, box_count);
    child.first = first;
    child.second = second;
    child.set_flag(flags::SECOND_ACTION);
    store.push_child(id, child)
}

/// Resolve the current phase-2 configuration into a terminal, playable level: boxes
/// that never moved become blocks, boxes pushed exactly once vanish, everything else
/// becomes a goal at its current cell with a fresh box restored at its origin cell and
/// the pusher restored to `spawn` (the run's fixed spawn cell, not wherever the
/// simulated pusher wandered to during move-agent).
pub fn evaluate<S: NodeStore>(store: &mut S, id: NodeId, spawn: usize) -> NodeId {
    let node = store.get(id);
    debug_assert!(!node.is_evaluated(), "evaluate called twice on the same node");

    let mut grid = node.grid.clone();
    let first = node.first.clone();
    let second = node.second.clone();
    let area = grid.data.len();

    for i in 0..area {
        if !is_box(grid.get_index(i)) {
            continue;
        }
        match second[i] {
            0 => grid.set_index(i, bot_layer(grid.get_index(i)) | crate::grid::BLOCK),
            1 => grid.set_index(i, bot_layer(grid.get_index(i))),
            _ => {}
        }
    }

    let mut second_out = vec![INVALID_INDEX; area];
    let mut origins = Vec::new();
    for i in 0..area {
        if is_box(grid.get_index(i)) {
            let origin = first[i] as usize;
            origins.push(origin);
            second_out[origin] = i as u8;
            grid.set_index(i, bot_layer(grid.get_index(i)) | GOAL);
        }
    }
    for &origin in &origins {
        let bot = bot_layer(grid.get_index(origin));
        grid.set_index(origin, bot | BOX);
    }

    grid.set_index(spawn, bot_layer(grid.get_index(spawn)) | PUSHER);

    let box_count = origins.len() as i32;
    let depth = node.depth + 1;
    let mut child = Node::child_of(id, grid, spawn as u8, depth, box_count);
    child.first = vec![INVALID_INDEX; area];
    child.second = second_out;
    child.set_flag(flags::TERMINAL);

    store.get_mut(id).set_flag(flags::EVALUATED);
    store.push_child(id, child)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::char_to_pawn;
    use crate::node::Node;
    use crate::rng::{Engine, RngKind};
    use crate::tree::Tree;

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

    fn fresh_tree(grid: Grid) -> (Tree, usize) {
        let (px, py) = grid.get_pusher_position();
        let pusher = grid.as_index(px, py);
        (Tree::new(Node::new_root(grid, pusher as u8)), pusher)
    }

    #[test]
    fn bloom_phase_one_finds_deletable_border_and_empty_cells() {
        let grid = grid_from_rows(&["xxxxx", "x-p-x", "xxxxx"]);
        let (mut tree, _) = fresh_tree(grid);
        let config = Config::default();
        bloom(&mut tree, NodeId::ROOT, &config);
        let root = tree.get(NodeId::ROOT);
        assert!(root.is_bloomed());
        assert!(!root.first.is_empty());
        assert!(!root.second.is_empty());
    }

    #[test]
    fn delete_block_consumes_one_candidate_and_clears_a_cell() {
        let grid = grid_from_rows(&["xxxxx", "x-p-x", "xxxxx"]);
        let (mut tree, _) = fresh_tree(grid);
        let config = Config::default();
        bloom(&mut tree, NodeId::ROOT, &config);
        let before = tree.get(NodeId::ROOT).first.len();
        let mut rng = Engine::new(RngKind::Small, 1);
        let child = delete_block(&mut tree, NodeId::ROOT, &mut rng);
        assert_eq!(tree.get(NodeId::ROOT).first.len(), before - 1);
        assert_eq!(tree.get(child).depth, 1);
        assert!(tree.get(child).grid.get_count(is_block) < tree.get(NodeId::ROOT).grid.get_count(is_block));
    }

    #[test]
    fn place_box_increments_box_count() {
        let grid = grid_from_rows(&["xxxxx", "x-p-x", "xxxxx"]);
        let (mut tree, _) = fresh_tree(grid);
        let config = Config::default();
        bloom(&mut tree, NodeId::ROOT, &config);
        let mut rng = Engine::new(RngKind::Small, 2);
        let child = place_box(&mut tree, NodeId::ROOT, &mut rng);
        assert_eq!(tree.get(child).box_count, 1);
        assert_eq!(tree.get(child).grid.get_count(is_box), 1);
    }

    #[test]
    fn freeze_rekeys_boxes_into_origin_tracking() {
        let grid = grid_from_rows(&["xxxxxx", "x-c--x", "x----x", "x-p--x", "xxxxxx"]);
        let (mut tree, _) = fresh_tree(grid);
        let mut config = Config::default();
        config.depth_lower_cutoff = 0;
        config.box_lower_cutoff = 1;
        let root = tree.get_mut(NodeId::ROOT);
        root.box_count = 1;
        root.set_flag(flags::CAN_FREEZE);
        let child = freeze(&mut tree, NodeId::ROOT, &config);
        let child_node = tree.get(child);
        assert_eq!(child_node.phase(), Phase::Two);
        let box_idx = child_node.grid.as_index(2, 1);
        assert_eq!(child_node.first[box_idx], box_idx as u8);
        assert_eq!(child_node.second[box_idx], 0);
    }

    #[test]
    fn remove_impossible_v2_clears_four_boxes_in_a_square() {
        let mut grid = grid_from_rows(&["xxxxxx", "x-cc-x", "x-cc-x", "x-p--x", "xxxxxx"]);
        let mut first = vec![INVALID_INDEX; grid.data.len()];
        let mut second = vec![INVALID_INDEX; grid.data.len()];
        let mut box_count = 4;
        remove_impossible_v2(&mut grid, &mut first, &mut second, &mut box_count);
        assert_eq!(box_count, 3);
        assert_eq!(grid.get_count(is_box), 3);
    }

    #[test]
    fn move_agent_shifts_origin_and_increments_push_count() {
        let grid = grid_from_rows(&["xxxxxx", "x-c--x", "x----x", "x-p--x", "xxxxxx"]);
        let (mut tree, pusher) = fresh_tree(grid);
        let box_idx = tree.get(NodeId::ROOT).grid.as_index(2, 1);
        {
            let root = tree.get_mut(NodeId::ROOT);
            root.box_count = 1;
            root.set_flag(flags::SECOND_ACTION);
            root.first = vec![INVALID_INDEX; root.grid.data.len()];
            root.second = vec![INVALID_INDEX; root.grid.data.len()];
            root.first[box_idx] = box_idx as u8;
            root.second[box_idx] = 0;
            root.pusher = pusher as u8;
        }
        let config = Config::default();
        bloom(&mut tree, NodeId::ROOT, &config);
        assert!(!tree.get(NodeId::ROOT).moves.is_empty());
        let mut rng = Engine::new(RngKind::Small, 3);
        let child = move_agent(&mut tree, NodeId::ROOT, &mut rng);
        let child_node = tree.get(child);
        assert_eq!(child_node.grid.get_count(is_box), 1);
        let new_box_idx = (0..child_node.grid.data.len())
            .find(|&i| is_box(child_node.grid.get_index(i)))
            .unwrap();
        assert_eq!(child_node.first[new_box_idx], box_idx as u8);
        assert_eq!(child_node.second[new_box_idx], 1);
    }

    #[test]
    fn evaluate_never_moved_box_becomes_block_and_clears_spawn() {
        let grid = grid_from_rows(&["xxxxx", "x-c-x", "x-p-x", "xxxxx"]);
        let (mut tree, pusher) = fresh_tree(grid);
        let box_idx = tree.get(NodeId::ROOT).grid.as_index(2, 1);
        {
            let root = tree.get_mut(NodeId::ROOT);
            root.box_count = 1;
            root.set_flag(flags::SECOND_ACTION);
            root.first = vec![INVALID_INDEX; root.grid.data.len()];
            root.second = vec![INVALID_INDEX; root.grid.data.len()];
            root.first[box_idx] = box_idx as u8;
            root.second[box_idx] = 0;
        }
        let child = evaluate(&mut tree, NodeId::ROOT, pusher);
        let child_node = tree.get(child);
        assert!(child_node.is_terminal());
        assert_eq!(child_node.box_count, 0);
        assert!(is_block(child_node.grid.get_index(box_idx)));
        assert!(crate::grid::is_pusher(child_node.grid.get_index(pusher)));
    }

    #[test]
    fn evaluate_box_pushed_twice_becomes_goal_with_fresh_box_at_origin() {
        let grid = grid_from_rows(&["xxxxxx", "x-c--x", "x----x", "x-p--x", "xxxxxx"]);
        let (mut tree, pusher) = fresh_tree(grid);
        let origin_idx = tree.get(NodeId::ROOT).grid.as_index(2, 1);
        let dest_idx = tree.get(NodeId::ROOT).grid.as_index(2, 2);
        {
            let root = tree.get_mut(NodeId::ROOT);
            root.box_count = 1;
            root.set_flag(flags::SECOND_ACTION);
            root.first = vec![INVALID_INDEX; root.grid.data.len()];
            root.second = vec![INVALID_INDEX; root.grid.data.len()];
            root.grid.set_index(origin_idx, bot_layer(root.grid.get_index(origin_idx)));
            root.grid.set_index(dest_idx, bot_layer(root.grid.get_index(dest_idx)) | BOX);
            root.first[dest_idx] = origin_idx as u8;
            root.second[dest_idx] = 2;
        }
        let child = evaluate(&mut tree, NodeId::ROOT, pusher);
        let child_node = tree.get(child);
        assert_eq!(child_node.box_count, 1);
        assert!(is_box(child_node.grid.get_index(origin_idx)));
        assert_eq!(child_node.second[origin_idx], dest_idx as u8);
        assert!(crate::grid::is_goal(child_node.grid.get_index(dest_idx)));
    }

    #[test]
    fn move_agent_on_multi_box_node_leaves_the_untouched_box_intact_through_evaluate() {
        // Two boxes in play: one beside the pusher's reachable corridor, one sitting
        // untouched off to the side. reachable_moves must only ever offer box-adjacent
        // pushes here, never an empty-cell no-op, or move_agent corrupts the other
        // box's origin tracking when it consumes one.
        let grid = grid_from_rows(&[
            "xxxxxxxx",
            "x-c----x",
            "x------x",
            "x-pc---x",
            "xxxxxxxx",
        ]);
        let (mut tree, pusher) = fresh_tree(grid);
        let idx_a = tree.get(NodeId::ROOT).grid.as_index(2, 1);
        let idx_b = tree.get(NodeId::ROOT).grid.as_index(3, 3);
        {
            let root = tree.get_mut(NodeId::ROOT);
            root.box_count = 2;
            root.set_flag(flags::SECOND_ACTION);
            root.first = vec![INVALID_INDEX; root.grid.data.len()];
            root.second = vec![INVALID_INDEX; root.grid.data.len()];
            root.first[idx_a] = idx_a as u8;
            root.second[idx_a] = 0;
            root.first[idx_b] = idx_b as u8;
            root.second[idx_b] = 0;
            root.pusher = pusher as u8;
        }
        let config = Config::default();
        bloom(&mut tree, NodeId::ROOT, &config);
        let root_grid = tree.get(NodeId::ROOT).grid.clone();
        let moves = tree.get(NodeId::ROOT).moves.clone();
        assert!(!moves.is_empty());
        for mv in &moves {
            let (x, y) = root_grid.as_tile(mv.index as usize);
            let (dx, dy) = mv.direction.delta();
            assert!(
                is_box(root_grid.get(x + dx, y + dy)),
                "reachable_moves offered a push into a non-box cell"
            );
        }

        let mut rng = Engine::new(RngKind::Small, 7);
        let after_first = move_agent(&mut tree, NodeId::ROOT, &mut rng);
        assert_eq!(tree.get(after_first).grid.get_count(is_box), 2);
        let moved_cells: Vec<usize> = (0..tree.get(after_first).grid.data.len())
            .filter(|&i| is_box(tree.get(after_first).grid.get_index(i)))
            .collect();
        assert_eq!(moved_cells.len(), 2);
        for &cell in &moved_cells {
            let origin = tree.get(after_first).first[cell];
            assert!(
                origin == idx_a as u8 || origin == idx_b as u8,
                "box origin corrupted after move_agent: {origin}"
            );
        }

        bloom(&mut tree, after_first, &config);
        assert!(!tree.get(after_first).moves.is_empty());
        let mut rng2 = Engine::new(RngKind::Small, 11);
        let after_second = move_agent(&mut tree, after_first, &mut rng2);
        assert_eq!(tree.get(after_second).grid.get_count(is_box), 2);

        let terminal = evaluate(&mut tree, after_second, pusher);
        let terminal_node = tree.get(terminal);
        assert!(terminal_node.is_terminal());
        assert!(terminal_node.box_count <= 2);
        for i in 0..terminal_node.grid.data.len() {
            if is_box(terminal_node.grid.get_index(i)) {
                assert_ne!(
                    terminal_node.second[i],
                    INVALID_INDEX,
                    "surviving box has no destination after evaluate"
                );
            }
        }
    }
}
