use super::prepare_generator;
use crate::cli::CutArgs;
use crate::config::SlabOverrides;
use crate::error::{CliError, Result};
use crate::utils::output::indexed_path;
use slabgen::core::io::{write_atom_table_to_path, write_structure};
use slabgen::core::models::structure::Structure;
use slabgen::workflows::batch::all_terminations;
use slabgen::workflows::generator::SlabRequest;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub fn run(args: CutArgs) -> Result<()> {
    let (generator, job) = prepare_generator(&args.input, &SlabOverrides::from(&args))?;
    if job.primitive && job.slab.vacuum == 0.0 {
        warn!("Primitive reduction was requested without vacuum and will be skipped.");
    }

    if args.all_terminations {
        let slabs = all_terminations(&generator, job.primitive)?;
        println!("Writing {} slab(s), one per termination...", slabs.len());
        for (index, slab) in slabs.iter().enumerate() {
            let output = indexed_path(&args.output, index);
            let csv = args.csv.as_deref().map(|path| indexed_path(path, index));
            write_slab(slab, &output, csv.as_deref())?;
            println!("  [{}] {} atoms written to: {}", index, slab.len(), output.display());
        }
        return Ok(());
    }

    let slab = generator.slab(SlabRequest {
        termination: job.termination,
        primitive: job.primitive,
    })?;
    write_slab(&slab, &args.output, args.csv.as_deref())?;
    println!(
        "✓ Slab with {} atoms ({} fixed) written to: {}",
        slab.len(),
        slab.fixed_indices().len(),
        args.output.display()
    );
    Ok(())
}

fn write_slab(slab: &Structure, output: &Path, csv: Option<&Path>) -> Result<()> {
    info!("Writing slab to {:?}", output);
    write_structure(slab, output).map_err(|e| file_error(output, e))?;
    if let Some(path) = csv {
        info!("Writing atom table to {:?}", path);
        write_atom_table_to_path(slab, path).map_err(|e| file_error(path, e))?;
    }
    Ok(())
}

fn file_error(path: &Path, source: slabgen::core::io::StructureFileError) -> CliError {
    CliError::FileParsing {
        path: PathBuf::from(path),
        source: source.into(),
    }
}
