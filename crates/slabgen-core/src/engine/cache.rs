use std::sync::OnceLock;

/// Write-once store for the termination offsets of a generator.
///
/// The offsets depend only on the generator's immutable basis and tolerance, so the
/// cache is never invalidated. Concurrent first calls may both compute; the first
/// stored result wins and both results are identical.
#[derive(Debug, Default)]
pub struct TerminationCache {
    offsets: OnceLock<Vec<f64>>,
}

impl TerminationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&[f64]> {
        self.offsets.get().map(Vec::as_slice)
    }

    pub fn get_or_try_init<E, F>(&self, compute: F) -> Result<&[f64], E>
    where
        F: FnOnce() -> Result<Vec<f64>, E>,
    {
        if let Some(offsets) = self.get() {
            return Ok(offsets);
        }
        let computed = compute()?;
        Ok(self.offsets.get_or_init(|| computed).as_slice())
    }
}
