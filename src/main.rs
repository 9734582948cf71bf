use std::error::Error;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use corewar::assembler::assemble;
use corewar::battle::Battle;
use corewar::config::MarsConfig;
use corewar::scheduler::Match;
use corewar::tournament::round_robin;
use corewar::warrior::Warrior;

#[derive(Parser)]
#[command(name = "corewar", about = "Redcode assembler and MARS simulator")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log debug details (warrior deaths, round results) to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(flatten)]
    mars: MarsArgs,
}

/// Simulator limits. Unset values scale with the core size.
#[derive(Args)]
struct MarsArgs {
    /// Number of cells in the core.
    #[arg(long, global = true, default_value_t = 8000)]
    core_size: u32,

    /// Maximum processes per warrior (default: core size).
    #[arg(long, global = true)]
    max_processes: Option<u32>,

    /// Maximum instructions per warrior.
    #[arg(long, global = true, default_value_t = 100)]
    max_length: u32,

    /// Minimum distance between warriors.
    #[arg(long, global = true, default_value_t = 100)]
    min_distance: u32,

    /// Cycles before a match is a tie (default: 10 x core size).
    #[arg(long, global = true)]
    max_cycles: Option<u32>,

    /// Rounds per battle.
    #[arg(long, global = true, default_value_t = 1)]
    rounds: u32,

    /// Random seed for warrior placement.
    #[arg(long, global = true, default_value_t = 0)]
    seed: u64,
}

impl MarsArgs {
    fn config(&self, warriors: usize) -> MarsConfig {
        let base = MarsConfig::with_core_size(self.core_size);
        MarsConfig {
            max_processes: self.max_processes.unwrap_or(base.max_processes),
            max_cycles: self.max_cycles.unwrap_or(base.max_cycles),
            max_length: self.max_length,
            min_distance: self.min_distance,
            rounds: self.rounds,
            warriors: warriors.max(1),
            ..base
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a warrior and print its load file.
    Dump {
        /// Redcode source; "-" reads stdin.
        input: PathBuf,

        /// Where to write the load file; "-" is stdout.
        #[arg(long, short, default_value = "-")]
        output_file: PathBuf,
    },

    /// Run a single warrior until it dies or runs out of cycles.
    Run {
        /// Redcode source; "-" reads stdin.
        input: PathBuf,

        /// Print every non-empty core cell when the run ends.
        #[arg(long)]
        dump_core: bool,
    },

    /// Fight several rounds between warriors.
    Battle {
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,
    },

    /// Battle every pair of warriors and print the standings.
    Tournament {
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,
    },
}

fn read_source(path: &Path) -> io::Result<String> {
    if path == Path::new("-") {
        let mut input = String::new();
        io::stdin().read_to_string(&mut input)?;
        Ok(input)
    } else {
        fs::read_to_string(path)
    }
}

fn load(path: &Path, config: &MarsConfig) -> Result<Warrior, Box<dyn Error>> {
    let source = read_source(path)?;
    let assembly = assemble(&source, config).map_err(|e| format!("{}: {e}", path.display()))?;
    Ok(assembly.warrior)
}

fn load_all(paths: &[PathBuf], config: &MarsConfig) -> Result<Vec<Warrior>, Box<dyn Error>> {
    paths.iter().map(|p| load(p, config)).collect()
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Command::Dump { input, output_file } => {
            let config = cli.mars.config(1);
            let warrior = load(&input, &config)?;
            if output_file == Path::new("-") {
                println!("{warrior}");
            } else {
                let mut file = fs::File::create(&output_file)?;
                writeln!(file, "{warrior}")?;
            }
        }
        Command::Run { input, dump_core } => {
            let config = cli.mars.config(1);
            let warrior = load(&input, &config)?;
            let start = std::time::Instant::now();
            let mut game = Match::new(&config, &[(&warrior, 0)], Vec::new())?;
            let outcome = game.run();
            let elapsed = start.elapsed();
            println!("{}: {outcome}", warrior.name());
            if dump_core {
                println!("{}", game.core());
            }
            eprintln!("{} cycles in {elapsed:.2?}", game.cycle());
        }
        Command::Battle { inputs } => {
            let config = cli.mars.config(inputs.len());
            let warriors = load_all(&inputs, &config)?;
            let refs: Vec<&Warrior> = warriors.iter().collect();
            let report = Battle::new(&config, &refs, cli.mars.seed).run()?;
            println!("{report}");
        }
        Command::Tournament { inputs } => {
            let config = cli.mars.config(2);
            let warriors = load_all(&inputs, &config)?;
            let standings = round_robin(&config, &warriors, cli.mars.seed)?;
            for (rank, standing) in standings.iter().enumerate() {
                println!(
                    "{:>3}. {:<24} {:>5}  {}/{}/{}",
                    rank + 1,
                    standing.name,
                    standing.points(),
                    standing.score.wins,
                    standing.score.losses,
                    standing.score.ties
                );
            }
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
