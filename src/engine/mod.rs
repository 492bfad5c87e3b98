//! Compute engine — the opaque generation routine behind the job system.

pub mod procedural;

pub use procedural::ProceduralEngine;

use crate::error::EngineError;
use crate::job::JobSpec;

/// Bytes and metadata produced by one render.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    /// Encoded artifact (PNG).
    pub bytes: Vec<u8>,
    /// Final output width; may differ from the request after device clamping.
    pub width: u32,
    /// Final output height.
    pub height: u32,
    /// Seed actually used (the requested one, or a drawn fallback).
    pub seed: u64,
    /// Wall-clock render time in milliseconds.
    pub elapsed_ms: u64,
}

/// The long-running, single-result generation routine.
///
/// `render` blocks; the executor always calls it from a dedicated
/// blocking thread. Progress goes through the callback as
/// `(message, percent 0–100)` — advisory, not required to be strictly
/// increasing. Implementations handle their own device selection and
/// report fallbacks as progress, not as errors or states.
pub trait ComputeEngine: Send + Sync {
    fn render(
        &self,
        spec: &JobSpec,
        on_progress: &(dyn Fn(&str, u8) + Sync),
    ) -> Result<RenderOutput, EngineError>;
}
