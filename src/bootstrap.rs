//! Two-phase bootstrap search: phase A runs a regular search for most of the time
//! budget, then its top finished levels seed a phase-B search's root children.

use std::time::{Duration, Instant};

use log::info;

use crate::config::Config;
use crate::error::ConfigError;
use crate::grid::{top_layer, Grid};
use crate::level::Level;
use crate::search::Search;

/// Remove every goal marker from a terminal grid, leaving just boxes, blocks, and the
/// pusher — the shape a phase-2 root child needs as its starting configuration.
fn strip_goals(grid: &Grid) -> Grid {
    let mut stripped = grid.clone();
    for cell in stripped.data.iter_mut() {
        *cell = top_layer(*cell);
    }
    stripped
}

/// Run the full two-phase bootstrap protocol and return the merged finished-level
/// list from both phases plus the seed actually used. `config.mcts_bootstrap` must
/// already be validated (a positive timeout is required; see
/// [`ConfigError::BootstrapNeedsTimeout`]).
pub fn run(config: Config) -> Result<(Vec<Level>, u64), ConfigError> {
    config.validate()?;
    debug_assert!(config.mcts_bootstrap, "bootstrap::run called without MCTS_BOOTSTRAP set");

    let total_seconds = config.timeout_seconds;
    let phase_b_seconds = total_seconds * config.mcts_bootstrap_delta;
    let phase_a_seconds = total_seconds - phase_b_seconds;

    let mut phase_a_config = config.clone();
    phase_a_config.timeout_seconds = phase_a_seconds;
    phase_a_config.mcts_bootstrap = false;
    let mut phase_a = Search::new(phase_a_config)?;
    phase_a.run_for(Instant::now() + Duration::from_secs_f64(phase_a_seconds));

    info!(
        "bootstrap phase A complete: {} iterations, {} levels, best {:.3}",
        phase_a.iterations_run(),
        phase_a.finished().len(),
        phase_a.best_score()
    );

    let mut top = phase_a.finished().to_vec();
    top.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    top.truncate(config.mcts_bootstrap_count);
    let seed_scores: Vec<f64> = top.iter().map(|l| l.score).collect();
    let seed_grids: Vec<Grid> = top.iter().map(|level| strip_goals(&level.grid)).collect();

    info!(
        "bootstrap phase B starting: {} seed levels, scores {:?}",
        seed_grids.len(),
        seed_scores
    );

    let mut phase_b_config = config;
    phase_b_config.timeout_seconds = phase_b_seconds;
    phase_b_config.mcts_bootstrap = false;
    let used_seed = phase_a.seed();
    let engine = phase_a.into_engine();
    let mut phase_b = Search::new_bootstrapped(phase_b_config, seed_grids, engine, used_seed);
    phase_b.run();

    info!(
        "bootstrap phase B complete: {} iterations, {} levels, best {:.3}",
        phase_b.iterations_run(),
        phase_b.finished().len(),
        phase_b.best_score()
    );

    let mut merged = phase_a.finished().to_vec();
    merged.extend(phase_b.finished().iter().cloned());
    Ok((merged, used_seed))
}
