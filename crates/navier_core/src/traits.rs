/// Output of a force model at a single spatial index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceSample {
    /// Raw estimated force (the "model" value).
    pub estimate: f64,
    /// Sum of the partial sensitivities of the estimate.
    pub gradient: f64,
}

/// Represents a differentiable force model evaluated once per index.
pub trait ForceModel {
    /// t: series time value for this index
    /// lx: spatial position (the index as a real)
    /// length: number of spatial samples
    fn sample(&self, t: f64, lx: f64, length: usize) -> ForceSample;
}

/// Maps a simulation index to the reference scale applied to the flow update.
pub trait ReferenceScale {
    fn weight(&self, index: usize, length: usize) -> f64;
}

/// Monotonic clock used to time trials, in milliseconds.
pub trait Stopwatch {
    fn now_ms(&self) -> f64;
}
