//! The MCTS driver: `select -> expand -> rollout -> backpropagate`, plus the
//! finished-level sink and best-level extraction.

use std::time::Instant;

use log::{debug, info};

use crate::actions::{bloom, delete_block, evaluate, freeze, move_agent, place_box};
use crate::config::Config;
use crate::error::ConfigError;
use crate::grid::{Grid, BLOCK, PUSHER};
use crate::level::Level;
use crate::node::{Node, NodeId};
use crate::policy::{score as policy_score, ChildStats};
use crate::rng::{Engine, LevelRng};
use crate::scoring::score_terminal;
use crate::tree::{NodeStore, RolloutArena, Tree};

/// Which constructive action a node offers next. Used by both the `next` (fixed
/// order) and `random` (weighted-by-pool-size) expand-ordering policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionChoice {
    DeleteBlock,
    PlaceBox,
    Freeze,
    MoveAgent,
    Evaluate,
}

/// Which candidate actions `node` currently offers, read off its phase and pools.
fn available_actions<S: NodeStore>(store: &S, id: NodeId) -> Vec<ActionChoice> {
    let node = store.get(id);
    let mut actions = Vec::new();
    match node.phase() {
        crate::node::Phase::One => {
            if !node.first.is_empty() {
                actions.push(ActionChoice::DeleteBlock);
            }
            if !node.second.is_empty() {
                actions.push(ActionChoice::PlaceBox);
            }
            if node.can_freeze() {
                actions.push(ActionChoice::Freeze);
            }
        }
        crate::node::Phase::Two => {
            if node.box_count > 0 && !node.moves.is_empty() {
                actions.push(ActionChoice::MoveAgent);
            }
            if !node.is_evaluated() {
                actions.push(ActionChoice::Evaluate);
            }
        }
    }
    actions
}

/// Backing storage for one rollout's descendant chain: an arena reused and reset
/// across every iteration, or (when `Config::arena_allocator` is off) a throwaway
/// `Tree` dropped at the end of each rollout.
enum RolloutStore {
    Arena(RolloutArena),
    Heap(Tree),
}

impl RolloutStore {
    fn new(config: &Config) -> RolloutStore {
        if config.arena_allocator {
            RolloutStore::Arena(RolloutArena::new(config.arena_bucket_size))
        } else {
            RolloutStore::Heap(Tree::new(Node::new_root(Grid::new(1, 1), 0)))
        }
    }

    /// Discard the previous rollout's chain and seed `root` as the new one's start,
    /// always at `NodeId::ROOT`.
    fn reset_with_root(&mut self, root: Node) -> NodeId {
        match self {
            RolloutStore::Arena(arena) => arena.reset_with_root(root),
            RolloutStore::Heap(tree) => {
                *tree = Tree::new(root);
                NodeId::ROOT
            }
        }
    }
}

impl NodeStore for RolloutStore {
    fn get(&self, id: NodeId) -> &Node {
        match self {
            RolloutStore::Arena(arena) => arena.get(id),
            RolloutStore::Heap(tree) => tree.get(id),
        }
    }

    fn get_mut(&mut self, id: NodeId) -> &mut Node {
        match self {
            RolloutStore::Arena(arena) => arena.get_mut(id),
            RolloutStore::Heap(tree) => tree.get_mut(id),
        }
    }

    fn push_child(&mut self, parent: NodeId, child: Node) -> NodeId {
        match self {
            RolloutStore::Arena(arena) => arena.push_child(parent, child),
            RolloutStore::Heap(tree) => tree.push_child(parent, child),
        }
    }
}

pub struct Search {
    tree: Tree,
    config: Config,
    engine: Engine,
    spawn: usize,
    rollout_store: RolloutStore,
    finished: Vec<Level>,
    best_score: f64,
    best_score_time: f64,
    start: Instant,
    iterations_run: u64,
    seed: u64,
}

impl Search {
    pub fn new(config: Config) -> Result<Search, ConfigError> {
        config.validate()?;

        let (sx, sy) = config.resolved_start();
        let mut grid = Grid::new(config.board_width, config.board_height);
        for i in 0..grid.data.len() {
            grid.set_index(i, BLOCK);
        }
        let spawn = grid.as_index(sx, sy);
        grid.set_index(spawn, PUSHER);

        let root = Node::new_root(grid, spawn as u8);
        let tree = Tree::new(root);

        let seed = if config.seed == 0 {
            Engine::fresh_seed()
        } else {
            config.seed
        };
        let engine = Engine::new(config.rng_kind, seed);

        info!(
            "starting search: {}x{} board, spawn ({sx}, {sy}), seed {seed}, policy {:?}",
            config.board_width, config.board_height, config.decision_policy
        );

        let rollout_store = RolloutStore::new(&config);

        Ok(Search {
            tree,
            config,
            engine,
            spawn,
            rollout_store,
            finished: Vec::new(),
            best_score: f64::MIN,
            best_score_time: 0.0,
            start: Instant::now(),
            iterations_run: 0,
            seed,
        })
    }

    /// Seed a phase-2 root pre-populated with `seed_grids` as already-frozen children,
    /// for a bootstrap phase-B search. See [`crate::bootstrap`].
    pub(crate) fn new_bootstrapped(config: Config, seed_grids: Vec<Grid>, engine: Engine, seed: u64) -> Search {
        let (sx, sy) = config.resolved_start();
        let mut grid = Grid::new(config.board_width, config.board_height);
        for i in 0..grid.data.len() {
            grid.set_index(i, BLOCK);
        }
        let spawn = grid.as_index(sx, sy);
        grid.set_index(spawn, PUSHER);

        let mut root = Node::new_root(grid, spawn as u8);
        root.depth = config.depth_lower_cutoff + 1;
        root.set_flag(crate::node::flags::BLOOMED);
        root.set_flag(crate::node::flags::EXPANDED);
        root.set_flag(crate::node::flags::SECOND_ACTION);
        let mut tree = Tree::new(root);

        for seed_grid in seed_grids {
            let area = seed_grid.data.len();
            let mut first = vec![crate::grid::INVALID_INDEX; area];
            let mut second = vec![crate::grid::INVALID_INDEX; area];
            for idx in 0..area {
                if crate::grid::is_box(seed_grid.get_index(idx)) {
                    first[idx] = idx as u8;
                    second[idx] = 0;
                }
            }
            let box_count = seed_grid.get_count(crate::grid::is_box);
            let mut child = Node::child_of(NodeId::ROOT, seed_grid, spawn as u8, config.depth_lower_cutoff + 2, box_count);
            child.first = first;
            child.second = second;
            child.set_flag(crate::node::flags::SECOND_ACTION);
            tree.push_child(NodeId::ROOT, child);
        }

        let rollout_store = RolloutStore::new(&config);

        Search {
            tree,
            config,
            engine,
            spawn,
            rollout_store,
            finished: Vec::new(),
            best_score: f64::MIN,
            best_score_time: 0.0,
            start: Instant::now(),
            iterations_run: 0,
            seed,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The RNG seed actually used this run (resolved from a nondeterministic `0` in
    /// configuration, if applicable), for naming the saved level-set file.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Hand off this search's RNG state, for a bootstrap phase B continuing the same
    /// random stream instead of reseeding.
    pub(crate) fn into_engine(self) -> Engine {
        self.engine
    }

    fn budget_exhausted(&self) -> bool {
        if self.config.timeout_seconds > 0.0 {
            self.start.elapsed().as_secs_f64() >= self.config.timeout_seconds
        } else {
            self.iterations_run >= self.config.simulation_count
        }
    }

    /// Run iterations until the configured time or iteration budget is spent.
    pub fn run(&mut self) {
        while !self.budget_exhausted() {
            self.run_iteration();
        }
        info!(
            "search finished after {} iterations, {} levels kept, best score {:.3}",
            self.iterations_run,
            self.finished.len(),
            self.best_score
        );
    }

    pub fn run_for(&mut self, deadline: Instant) {
        while Instant::now() < deadline {
            self.run_iteration();
        }
    }

    pub fn run_iteration(&mut self) {
        self.iterations_run += 1;
        let Some(leaf) = self.select() else {
            return;
        };
        let score = self.rollout(leaf);
        self.tree.backpropagate(leaf, score);
        debug!("rollout {} scored {:.3}", self.iterations_run, score);
    }

    /// Tree policy: bloom/prune-empty/expand-or-select-best-child, until reaching a
    /// node to roll out from (terminal nodes are rolled out trivially).
    fn select(&mut self) -> Option<NodeId> {
        let mut current = self.tree.root();
        loop {
            if self.tree.get(current).is_terminal() {
                return Some(current);
            }
            if !self.tree.get(current).is_bloomed() {
                bloom(&mut self.tree, current, &self.config);
                let node = self.tree.get(current);
                if !node.can_expand() && node.children.is_empty() {
                    current = self.tree.prune(current)?;
                    continue;
                }
            }
            if self.tree.get(current).can_expand() {
                return Some(self.expand(current));
            }
            match self.best_child(current) {
                Some(child) => current = child,
                None => current = self.tree.prune(current)?,
            }
        }
    }

    fn choose_action(&mut self, id: NodeId) -> ActionChoice {
        let actions = available_actions(&self.tree, id);
        debug_assert!(!actions.is_empty(), "expand called with no available actions");
        if self.config.tree_policy_next {
            actions[0]
        } else {
            let weight = |a: &ActionChoice| -> i64 {
                let node = self.tree.get(id);
                match a {
                    ActionChoice::DeleteBlock => node.first.len() as i64,
                    ActionChoice::PlaceBox => node.second.len() as i64,
                    ActionChoice::Freeze => 1,
                    ActionChoice::MoveAgent => node.moves.len() as i64,
                    ActionChoice::Evaluate => 1,
                }
            };
            let total: i64 = actions.iter().map(weight).sum();
            let mut pick = self.engine.range_i64(0, (total - 1).max(0));
            for a in &actions {
                let w = weight(a);
                if pick < w {
                    return *a;
                }
                pick -= w;
            }
            *actions.last().unwrap()
        }
    }

    fn expand(&mut self, id: NodeId) -> NodeId {
        match self.choose_action(id) {
            ActionChoice::DeleteBlock => delete_block(&mut self.tree, id, &mut self.engine),
            ActionChoice::PlaceBox => place_box(&mut self.tree, id, &mut self.engine),
            ActionChoice::Freeze => freeze(&mut self.tree, id, &self.config),
            ActionChoice::MoveAgent => move_agent(&mut self.tree, id, &mut self.engine),
            ActionChoice::Evaluate => evaluate(&mut self.tree, id, self.spawn),
        }
    }

    fn best_child(&self, id: NodeId) -> Option<NodeId> {
        let parent_rollout_count = self.tree.get(id).rollout_count;
        self.tree
            .get(id)
            .children
            .iter()
            .copied()
            .max_by(|&a, &b| {
                let sa = self.child_score(a, parent_rollout_count);
                let sb = self.child_score(b, parent_rollout_count);
                sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    fn child_score(&self, id: NodeId, parent_rollout_count: u64) -> f64 {
        let node = self.tree.get(id);
        let stats = ChildStats {
            score_sum: node.score_sum,
            squared_score_sum: node.squared_score_sum,
            rollout_count: node.rollout_count,
            parent_rollout_count,
        };
        policy_score(self.config.decision_policy, stats, self.config.ucb1_c, self.config.sp_mcts_d)
    }

    /// Default policy: from `leaf`, keep expanding with *random* child choices (never
    /// the best-child policy) until a terminal configuration is reached, then score it
    /// and record it as a finished level if it's good enough.
    ///
    /// The walk never touches the persistent tree: `leaf`'s state is cloned into
    /// `rollout_store`'s scratch chain (an arena reset at the start of every rollout,
    /// per `Config::arena_allocator`), so an arbitrarily long playout costs one
    /// reclaim instead of permanently growing the search tree.
    fn rollout(&mut self, leaf: NodeId) -> f64 {
        let mut scratch_root = self.tree.get(leaf).clone();
        scratch_root.parent = None;
        scratch_root.children = Vec::new();
        let mut current = self.rollout_store.reset_with_root(scratch_root);
        loop {
            if !self.rollout_store.get(current).is_bloomed() {
                bloom(&mut self.rollout_store, current, &self.config);
            }
            if self.rollout_store.get(current).is_terminal() {
                break;
            }
            let actions = available_actions(&self.rollout_store, current);
            if actions.is_empty() {
                // Dead end reached mid-rollout (every candidate already consumed by
                // earlier tree-policy expansions). Score as zero rather than panic;
                // this only happens for already-exhausted subtrees.
                return 0.0;
            }
            let action = if actions.len() == 1 {
                actions[0]
            } else {
                let idx = self.engine.range_i64(0, actions.len() as i64 - 1) as usize;
                actions[idx]
            };
            current = match action {
                ActionChoice::DeleteBlock => delete_block(&mut self.rollout_store, current, &mut self.engine),
                ActionChoice::PlaceBox => place_box(&mut self.rollout_store, current, &mut self.engine),
                ActionChoice::Freeze => freeze(&mut self.rollout_store, current, &self.config),
                ActionChoice::MoveAgent => move_agent(&mut self.rollout_store, current, &mut self.engine),
                ActionChoice::Evaluate => evaluate(&mut self.rollout_store, current, self.spawn),
            };
        }

        let node = self.rollout_store.get(current);
        let score = score_terminal(&node.grid, &node.second, node.box_count);

        let is_new_best = score > self.best_score;
        let is_good = self.config.add_good_levels && score >= self.config.good_level_cut;
        if is_new_best || is_good {
            let timestamp = self.start.elapsed().as_secs_f64();
            if is_new_best {
                self.best_score = score;
                self.best_score_time = timestamp;
                info!("new best level: score {:.3} at t={:.2}s", score, timestamp);
            }
            self.finished.push(Level::from_grid(node.grid.clone(), score, timestamp));
        }
        score
    }

    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    pub fn best_score_time(&self) -> f64 {
        self.best_score_time
    }

    pub fn iterations_run(&self) -> u64 {
        self.iterations_run
    }

    pub fn finished(&self) -> &[Level] {
        &self.finished
    }

    /// The top `level_set_size` finished levels, ascending by score (so the
    /// highest-scoring level is last). This preserves the original's ascending-sort-
    /// then-slice-from-end ordering (see `SPEC_FULL.md` §10.5), which keeps
    /// later-discovered equal-scoring levels after earlier ones on ties.
    pub fn get_level_set(&self) -> Vec<Level> {
        let mut sorted = self.finished.clone();
        sorted.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));
        let take = self.config.level_set_size.min(sorted.len());
        sorted.split_off(sorted.len() - take)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_iteration_search_produces_a_level() {
        let config = Config::default()
            .with_board_size(7, 7)
            .with_timeout_seconds(0.0)
            .with_simulation_count(200)
            .with_seed(1234);
        let mut search = Search::new(config).unwrap();
        search.run();
        assert!(search.iterations_run() >= 200);
        assert!(!search.finished().is_empty(), "expected at least one finished level");
    }

    #[test]
    fn same_seed_same_config_reproduces_finished_levels() {
        let config = Config::default()
            .with_board_size(7, 7)
            .with_timeout_seconds(0.0)
            .with_simulation_count(150)
            .with_seed(99);
        let mut a = Search::new(config.clone()).unwrap();
        a.run();
        let mut b = Search::new(config).unwrap();
        b.run();
        let levels_a: Vec<String> = a.finished().iter().map(|l| l.grid.to_text()).collect();
        let levels_b: Vec<String> = b.finished().iter().map(|l| l.grid.to_text()).collect();
        assert_eq!(levels_a, levels_b);
    }

    #[test]
    fn get_level_set_is_capped_and_ascending_with_best_last() {
        let config = Config::default()
            .with_board_size(7, 7)
            .with_timeout_seconds(0.0)
            .with_simulation_count(300)
            .with_seed(7);
        let mut search = Search::new(config).unwrap();
        search.run();
        let top = search.get_level_set();
        assert!(top.len() <= search.config().level_set_size);
        for pair in top.windows(2) {
            assert!(pair[0].score <= pair[1].score);
        }
        if let Some(best) = top.last() {
            assert_eq!(best.score, search.best_score());
        }
    }
}
