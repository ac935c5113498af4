use clap::{Args, Parser, Subcommand};
use slabgen::core::lattice::miller::MillerIndex;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "slabgen CLI - Build periodic surface slab models from bulk crystal structures and Miller indices.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the unique surface terminations of a bulk structure for one Miller index.
    Terminations(TerminationsArgs),
    /// Cut one slab, or one slab per termination, and write it to disk.
    Cut(CutArgs),
    /// Report the top and bottom surface atoms of a slab.
    SurfaceAtoms(SurfaceAtomsArgs),
}

/// Arguments for the `terminations` subcommand.
#[derive(Args, Debug)]
pub struct TerminationsArgs {
    /// Path to the job file (TOML) holding the bulk structure and slab settings.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Override the Miller index from the job file (e.g., '1,1,0' or '110').
    #[arg(short, long, value_name = "H,K,L", allow_hyphen_values = true)]
    pub miller: Option<MillerIndex>,

    /// Override the coordinate comparison tolerance.
    #[arg(short, long, value_name = "FLOAT")]
    pub tolerance: Option<f64>,
}

/// Arguments for the `cut` subcommand.
#[derive(Args, Debug)]
pub struct CutArgs {
    // --- Core Arguments ---
    /// Path to the job file (TOML) holding the bulk structure and slab settings.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the output slab structure (TOML).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Also export a per-atom CSV table to this path.
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,

    // --- Slab Overrides ---
    /// Override the Miller index from the job file (e.g., '1,1,0' or '110').
    #[arg(short, long, value_name = "H,K,L", allow_hyphen_values = true)]
    pub miller: Option<MillerIndex>,

    /// Override the number of atomic layers.
    #[arg(short, long, value_name = "INT")]
    pub layers: Option<usize>,

    /// Override the number of fixed bottom layers.
    #[arg(short, long, value_name = "INT")]
    pub fixed: Option<usize>,

    /// Override the vacuum added on each side of the slab, in Angstroms.
    #[arg(long, value_name = "FLOAT")]
    pub vacuum: Option<f64>,

    /// Override the coordinate comparison tolerance.
    #[arg(short, long, value_name = "FLOAT")]
    pub tolerance: Option<f64>,

    /// Cut at this termination index instead of the basis as built.
    #[arg(long, value_name = "INT", conflicts_with = "all_terminations")]
    pub termination: Option<usize>,

    /// Reduce the slab to its primitive in-plane cell (requires vacuum).
    #[arg(long)]
    pub primitive: bool,

    /// Write one slab per unique termination, suffixing the output file names.
    #[arg(long)]
    pub all_terminations: bool,

    /// Set a specific configuration value, overriding the job file.
    /// Can be used multiple times. Example: -S slab.layers=6
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `surface-atoms` subcommand.
#[derive(Args, Debug)]
pub struct SurfaceAtomsArgs {
    /// Path to the job file (TOML) whose bulk structure is the coordination reference.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path to the slab structure (TOML) to classify.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub slab: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cut_arguments_parse_with_overrides() {
        let cli = Cli::parse_from([
            "slabgen", "-vv", "cut", "-i", "job.toml", "-o", "slab.toml", "--miller", "1,-1,0",
            "--layers", "6", "--vacuum", "7.5", "--primitive", "-S", "slab.fixed-layers=3",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Cut(args) = cli.command else {
            panic!("expected the cut subcommand");
        };
        assert_eq!(args.miller.map(|m| m.as_array()), Some([1, -1, 0]));
        assert_eq!(args.layers, Some(6));
        assert_eq!(args.vacuum, Some(7.5));
        assert!(args.primitive);
        assert_eq!(args.set_values, vec!["slab.fixed-layers=3".to_string()]);
    }

    #[test]
    fn termination_conflicts_with_all_terminations() {
        let result = Cli::try_parse_from([
            "slabgen", "cut", "-i", "job.toml", "-o", "slab.toml", "--termination", "1",
            "--all-terminations",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn invalid_miller_index_is_rejected_by_the_parser() {
        let result = Cli::try_parse_from(["slabgen", "terminations", "-i", "job.toml", "-m", "0,0,0"]);
        assert!(result.is_err());
    }

    #[test]
    fn surface_atoms_subcommand_is_kebab_case() {
        let cli = Cli::parse_from(["slabgen", "surface-atoms", "-i", "job.toml", "-s", "slab.toml"]);
        assert!(matches!(cli.command, Commands::SurfaceAtoms(_)));
    }
}
