use crate::cli::SurfaceAtomsArgs;
use crate::config::PartialJobConfig;
use crate::error::{CliError, Result};
use slabgen::core::io::read_structure;
use slabgen::engine::surface::classify_surface_atoms;
use tracing::info;

pub fn run(args: SurfaceAtomsArgs) -> Result<()> {
    let bulk = PartialJobConfig::from_file(&args.input)?.bulk()?;

    info!("Loading slab structure from {:?}", &args.slab);
    let slab = read_structure(&args.slab).map_err(|e| CliError::FileParsing {
        path: args.slab.clone(),
        source: e.into(),
    })?;

    let surface = classify_surface_atoms(&bulk, &slab)?;
    println!("top: {}", format_indices(&surface.top));
    println!("bottom: {}", format_indices(&surface.bottom));
    Ok(())
}

fn format_indices(indices: &[usize]) -> String {
    if indices.is_empty() {
        return "(none)".to_string();
    }
    indices
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_space_separated() {
        assert_eq!(format_indices(&[0, 4, 7]), "0 4 7");
        assert_eq!(format_indices(&[]), "(none)");
    }
}
