use crate::core::models::structure::Structure;
use crate::core::primitive::{InPlaneReducer, PrimitiveReducer};
use crate::core::symmetry::{LatticeSymmetryFinder, SymmetryFinder};
use crate::engine::basis::{BasisBuilder, LatticeBasis, RotatedBasis};
use crate::engine::cache::TerminationCache;
use crate::engine::config::SlabConfig;
use crate::engine::cutter::SlabCutter;
use crate::engine::error::SlabError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::surface::{SurfaceAtoms, classify_surface_atoms};
use crate::engine::terminations::TerminationEnumerator;
use tracing::{info, instrument};

/// Which slab to cut from a generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlabRequest {
    /// Index into [`SlabGenerator::terminations`]. `None` cuts the basis as built,
    /// without any offset; `Some(0)` applies the first termination.
    pub termination: Option<usize>,
    /// Reduce the slab to its primitive in-plane cell. Ignored when the configured
    /// vacuum is zero.
    pub primitive: bool,
}

/// Generates slab models of one bulk structure for one Miller index.
///
/// The surface-aligned basis is built when the generator is created. Terminations are
/// enumerated on first use and cached for the lifetime of the generator.
pub struct SlabGenerator<'a> {
    bulk: Structure,
    config: SlabConfig,
    basis: RotatedBasis,
    terminations: TerminationCache,
    symmetry: Box<dyn SymmetryFinder + Send + Sync>,
    reducer: Box<dyn PrimitiveReducer + Send + Sync>,
    reporter: ProgressReporter<'a>,
}

impl<'a> SlabGenerator<'a> {
    /// Creates a generator with the built-in symmetry finder and primitive reducer and no
    /// progress callback.
    pub fn new(bulk: Structure, config: SlabConfig) -> Result<Self, SlabError> {
        Self::with_reporter(bulk, config, ProgressReporter::new())
    }

    pub fn with_reporter(
        bulk: Structure,
        config: SlabConfig,
        reporter: ProgressReporter<'a>,
    ) -> Result<Self, SlabError> {
        Self::with_services(
            bulk,
            config,
            Box::new(LatticeSymmetryFinder),
            Box::new(InPlaneReducer),
            reporter,
        )
    }

    /// Creates a generator with caller-supplied symmetry and primitive-cell services.
    ///
    /// # Errors
    ///
    /// The configuration and the bulk are checked before any basis work starts:
    /// an invalid configuration yields [`SlabError::Config`] and a bulk without atoms
    /// yields [`SlabError::EmptyBulk`].
    #[instrument(skip_all, name = "slab_generator", fields(miller = %config.miller_index))]
    pub fn with_services(
        bulk: Structure,
        config: SlabConfig,
        symmetry: Box<dyn SymmetryFinder + Send + Sync>,
        reducer: Box<dyn PrimitiveReducer + Send + Sync>,
        reporter: ProgressReporter<'a>,
    ) -> Result<Self, SlabError> {
        config.validate()?;
        if bulk.is_empty() {
            return Err(SlabError::EmptyBulk);
        }

        reporter.report(Progress::PhaseStart {
            name: "Building Basis",
        });
        let basis = BasisBuilder::new(config.tolerance).build(&bulk, &config.miller_index)?;
        reporter.report(Progress::PhaseFinish);
        info!(
            atoms = basis.structure.len(),
            layers = config.layers,
            vacuum = config.vacuum,
            "Slab generator ready."
        );

        Ok(Self {
            bulk,
            config,
            basis,
            terminations: TerminationCache::new(),
            symmetry,
            reducer,
            reporter,
        })
    }

    pub fn config(&self) -> &SlabConfig {
        &self.config
    }

    pub fn bulk(&self) -> &Structure {
        &self.bulk
    }

    /// The bulk re-expressed in the surface-aligned cell, surface normal along `+z`.
    pub fn basis(&self) -> &Structure {
        &self.basis.structure
    }

    pub fn lattice_basis(&self) -> &LatticeBasis {
        &self.basis.lattice
    }

    /// Fractional heights of the unique terminations, computed once per generator.
    pub fn terminations(&self) -> Result<&[f64], SlabError> {
        self.terminations.get_or_try_init(|| {
            self.reporter.report(Progress::PhaseStart {
                name: "Enumerating Terminations",
            });
            let offsets = TerminationEnumerator::new(
                self.symmetry.as_ref(),
                self.config.tolerance,
                &self.reporter,
            )
            .enumerate(&self.basis.structure)?;
            self.reporter.report(Progress::PhaseFinish);
            Ok(offsets)
        })
    }

    /// Cuts one slab.
    ///
    /// # Errors
    ///
    /// Returns [`SlabError::TerminationOutOfRange`] when the requested termination does
    /// not exist.
    pub fn slab(&self, request: SlabRequest) -> Result<Structure, SlabError> {
        let offset = match request.termination {
            None => None,
            Some(index) => {
                let offsets = self.terminations()?;
                let offset = offsets.get(index).ok_or(SlabError::TerminationOutOfRange {
                    index,
                    count: offsets.len(),
                })?;
                Some(*offset)
            }
        };

        self.reporter.report(Progress::PhaseStart {
            name: "Cutting Slab",
        });
        let slab = SlabCutter::new(&self.config, self.reducer.as_ref()).cut(
            &self.basis.structure,
            offset,
            request.primitive,
        )?;
        self.reporter.report(Progress::PhaseFinish);
        Ok(slab)
    }

    /// Splits the under-coordinated atoms of `slab` into top and bottom surfaces, using
    /// this generator's bulk as the coordination reference.
    pub fn surface_atoms(&self, slab: &Structure) -> Result<SurfaceAtoms, SlabError> {
        classify_surface_atoms(&self.bulk, slab)
    }
}
