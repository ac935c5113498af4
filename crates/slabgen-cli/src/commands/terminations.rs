use super::prepare_generator;
use crate::cli::TerminationsArgs;
use crate::config::SlabOverrides;
use crate::error::Result;
use tracing::info;

pub fn run(args: TerminationsArgs) -> Result<()> {
    let (generator, job) = prepare_generator(&args.input, &SlabOverrides::from(&args))?;
    let terminations = generator.terminations()?;
    info!(count = terminations.len(), "Enumerated terminations.");

    println!(
        "{} unique termination(s) for {}:",
        terminations.len(),
        job.slab.miller_index
    );
    for (index, offset) in terminations.iter().enumerate() {
        println!("  [{}] z = {:.6}", index, offset);
    }
    Ok(())
}
