use super::generator::{SlabGenerator, SlabRequest};
use crate::core::models::structure::Structure;
use crate::engine::error::SlabError;
use tracing::{info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Cuts one slab per unique termination, in termination order.
#[instrument(skip_all, name = "all_terminations_workflow", fields(primitive = primitive))]
pub fn all_terminations(
    generator: &SlabGenerator,
    primitive: bool,
) -> Result<Vec<Structure>, SlabError> {
    let count = generator.terminations()?.len();

    #[cfg(not(feature = "parallel"))]
    let indices = 0..count;

    #[cfg(feature = "parallel")]
    let indices = (0..count).into_par_iter();

    let slabs = indices
        .map(|index| {
            generator.slab(SlabRequest {
                termination: Some(index),
                primitive,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    info!(slabs = slabs.len(), "Cut a slab for every termination.");
    Ok(slabs)
}
