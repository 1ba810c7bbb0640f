//! CLI entry point: run a search and print/save the best level(s), or replay a
//! previously saved level set.

use clap::{Parser, Subcommand};

use sokogen::config::Config;
use sokogen::level::{load_level_set, save_level_set};
use sokogen::search::Search;
use sokogen::{bootstrap, logging};

#[derive(Parser)]
#[command(name = "sokogen", version, about = "Procedural Sokoban level generator")]
struct Cli {
    #[arg(short, long, help = "raise log level to debug")]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    #[arg(long, default_value_t = 7, help = "board width")]
    width: i32,
    #[arg(long, default_value_t = 7, help = "board height")]
    height: i32,
    #[arg(long, env = "SOKOGEN_SEED", help = "RNG seed; 0 picks one nondeterministically")]
    seed: Option<u64>,
    #[arg(long, help = "search timeout in seconds; 0 uses a fixed iteration count")]
    timeout: Option<f64>,
    #[arg(long, help = "run the two-phase bootstrap search")]
    bootstrap: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Read `saved_levels/<NAME>.txt` and print it instead of searching.
    Load { name: String },
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(Command::Load { name }) = cli.command {
        let levels = load_level_set(&name)?;
        log::info!("loaded {} level(s) from {name}", levels.len());
        for level in &levels {
            println!("{}", level.grid.to_text());
        }
        return Ok(());
    }

    let mut config = Config::default().with_board_size(cli.width, cli.height);
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }
    if let Some(timeout) = cli.timeout {
        config = config.with_timeout_seconds(timeout);
    }
    if cli.bootstrap {
        config.mcts_bootstrap = true;
    }
    config.validate()?;

    let (levels, seed) = if config.mcts_bootstrap {
        bootstrap::run(config)?
    } else {
        let mut search = Search::new(config)?;
        search.run();
        (search.get_level_set(), search.seed())
    };

    if levels.is_empty() {
        log::info!("search finished with no levels to report");
        return Ok(());
    }

    if let Some(best) = levels.last() {
        println!("{}", best.grid.to_text());
    }

    let path = save_level_set(seed, &levels)?;
    log::info!("saved {} level(s) to {}", levels.len(), path.display());

    Ok(())
}
