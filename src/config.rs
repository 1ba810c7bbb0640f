//! Single typed settings surface for a search run, matching the production defaults
//! of the reference implementation and the `MctsSetting::add_*` builder convention
//! used elsewhere in this codebase.

use crate::error::ConfigError;
use crate::policy::DecisionPolicy;
use crate::rng::RngKind;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub board_width: i32,
    pub board_height: i32,
    /// `-1` means "center the spawn on the board".
    pub start_x: i32,
    pub start_y: i32,

    /// Search timeout in seconds. `0.0` means run a fixed iteration count instead.
    pub timeout_seconds: f64,
    pub simulation_count: u64,

    pub depth_lower_cutoff: u32,
    pub box_lower_cutoff: i32,
    /// `-1` means derive from `box_area_cutoff`.
    pub box_upper_cutoff: i32,
    pub box_area_cutoff: f64,

    pub mcts_bootstrap: bool,
    pub mcts_bootstrap_count: usize,
    pub mcts_bootstrap_delta: f64,

    pub add_good_levels: bool,
    pub good_level_cut: f64,
    pub level_set_size: usize,

    pub remove_impossible: bool,
    pub use_simple_moves: bool,
    pub tree_policy_next: bool,

    pub ucb1_c: f64,
    pub sp_mcts_d: f64,
    pub decision_policy: DecisionPolicy,

    pub arena_allocator: bool,
    pub arena_bucket_size: usize,

    /// `0` means seed nondeterministically at search start.
    pub seed: u64,
    pub rng_kind: RngKind,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            board_width: 7,
            board_height: 7,
            start_x: -1,
            start_y: -1,

            timeout_seconds: 10.0,
            simulation_count: 800_000,

            depth_lower_cutoff: 10,
            box_lower_cutoff: 1,
            box_upper_cutoff: -1,
            box_area_cutoff: 3.0,

            mcts_bootstrap: false,
            mcts_bootstrap_count: 4,
            mcts_bootstrap_delta: 0.05,

            add_good_levels: false,
            good_level_cut: 0.8,
            level_set_size: 30,

            remove_impossible: true,
            use_simple_moves: false,
            tree_policy_next: false,

            ucb1_c: std::f64::consts::SQRT_2,
            sp_mcts_d: std::f64::consts::SQRT_2,
            decision_policy: DecisionPolicy::Ucb1Tuned,

            arena_allocator: true,
            arena_bucket_size: crate::arena::DEFAULT_BUCKET_BYTES,

            seed: 0,
            rng_kind: RngKind::ChaCha8,
        }
    }
}

impl Config {
    pub fn with_board_size(mut self, width: i32, height: i32) -> Config {
        self.board_width = width;
        self.board_height = height;
        self
    }

    pub fn with_start_position(mut self, x: i32, y: i32) -> Config {
        self.start_x = x;
        self.start_y = y;
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: f64) -> Config {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_simulation_count(mut self, count: u64) -> Config {
        self.simulation_count = count;
        self
    }

    pub fn with_decision_policy(mut self, policy: DecisionPolicy) -> Config {
        self.decision_policy = policy;
        self
    }

    pub fn with_bootstrap(mut self, count: usize, delta: f64) -> Config {
        self.mcts_bootstrap = true;
        self.mcts_bootstrap_count = count;
        self.mcts_bootstrap_delta = delta;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Config {
        self.seed = seed;
        self
    }

    pub fn with_rng_kind(mut self, kind: RngKind) -> Config {
        self.rng_kind = kind;
        self
    }

    /// Effective maximum box count: the configured absolute cutoff, or
    /// `ceil(area / box_area_cutoff)` when `box_upper_cutoff` is `-1`.
    pub fn effective_box_upper_cutoff(&self) -> i32 {
        if self.box_upper_cutoff >= 0 {
            self.box_upper_cutoff
        } else {
            let area = (self.board_width * self.board_height) as f64;
            (area / self.box_area_cutoff).ceil() as i32
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let area = self.board_width * self.board_height;
        if !(16..=254).contains(&area) {
            return Err(ConfigError::BadBoardSize {
                width: self.board_width,
                height: self.board_height,
            });
        }
        if self.start_x != -1
            && (self.start_x < 0 || self.start_x >= self.board_width)
        {
            return Err(ConfigError::StartOutsideGrid {
                x: self.start_x,
                y: self.start_y,
                width: self.board_width,
                height: self.board_height,
            });
        }
        if self.start_y != -1
            && (self.start_y < 0 || self.start_y >= self.board_height)
        {
            return Err(ConfigError::StartOutsideGrid {
                x: self.start_x,
                y: self.start_y,
                width: self.board_width,
                height: self.board_height,
            });
        }
        if !(0.0..=1.0).contains(&self.mcts_bootstrap_delta) {
            return Err(ConfigError::BootstrapDeltaOutOfRange {
                delta: self.mcts_bootstrap_delta,
            });
        }
        if self.mcts_bootstrap && self.timeout_seconds <= 0.0 {
            return Err(ConfigError::BootstrapNeedsTimeout);
        }
        Ok(())
    }

    /// Resolve `(-1, -1)` start coordinates to the board's center cell.
    pub fn resolved_start(&self) -> (i32, i32) {
        let x = if self.start_x == -1 {
            self.board_width / 2
        } else {
            self.start_x
        };
        let y = if self.start_y == -1 {
            self.board_height / 2
        } else {
            self.start_y
        };
        (x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_values() {
        let cfg = Config::default();
        assert_eq!(cfg.board_width, 7);
        assert_eq!(cfg.board_height, 7);
        assert_eq!(cfg.decision_policy, DecisionPolicy::Ucb1Tuned);
        assert_eq!(cfg.arena_bucket_size, crate::arena::DEFAULT_BUCKET_BYTES);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_board_too_small() {
        let cfg = Config::default().with_board_size(3, 3);
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::BadBoardSize { width: 3, height: 3 })
        );
    }

    #[test]
    fn rejects_bootstrap_without_timeout() {
        let cfg = Config::default()
            .with_timeout_seconds(0.0)
            .with_bootstrap(4, 0.05);
        assert_eq!(cfg.validate(), Err(ConfigError::BootstrapNeedsTimeout));
    }

    #[test]
    fn effective_box_upper_cutoff_derives_from_area() {
        let cfg = Config::default().with_board_size(7, 7);
        assert_eq!(cfg.effective_box_upper_cutoff(), 17); // ceil(49 / 3.0)
    }

    #[test]
    fn resolved_start_centers_on_negative_one() {
        let cfg = Config::default().with_board_size(7, 9);
        assert_eq!(cfg.resolved_start(), (3, 4));
    }
}
