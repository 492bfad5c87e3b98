//! Bundled deterministic engine.
//!
//! Stands in for a real diffusion pipeline behind [`ComputeEngine`]: it
//! renders a seeded procedural pattern over the requested step count,
//! reporting the same progress milestones a model-backed engine would
//! (device pre-flight, per-step rendering, encoding).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Cursor;
use std::time::Instant;

use image::{ImageFormat, Rgb, RgbImage};

use super::{ComputeEngine, RenderOutput};
use crate::error::EngineError;
use crate::job::JobSpec;

/// Largest edge rendered when falling back to the CPU path.
const CPU_MAX_EDGE: u32 = 512;

/// Deterministic procedural renderer. Stateless and safe to share across
/// concurrent jobs.
#[derive(Debug, Default)]
pub struct ProceduralEngine;

impl ProceduralEngine {
    pub fn new() -> Self {
        Self
    }

    /// Whether an accelerator is usable. The bundled engine has none, so
    /// GPU requests always fall back to the CPU path.
    fn accelerator_available(&self) -> bool {
        false
    }
}

impl ComputeEngine for ProceduralEngine {
    fn render(
        &self,
        spec: &JobSpec,
        on_progress: &(dyn Fn(&str, u8) + Sync),
    ) -> Result<RenderOutput, EngineError> {
        on_progress("Loading model...", 0);

        // Device pre-flight. Falling back is progress, not a state.
        let use_accelerator = spec.use_gpu && self.accelerator_available();
        if spec.use_gpu && !use_accelerator {
            on_progress("Accelerator unavailable, falling back to CPU...", 5);
        }
        on_progress(
            if use_accelerator {
                "Model ready on accelerator"
            } else {
                "Model ready on CPU"
            },
            20,
        );

        let (mut width, mut height) = (spec.width, spec.height);
        if !use_accelerator && (width > CPU_MAX_EDGE || height > CPU_MAX_EDGE) {
            width = width.min(CPU_MAX_EDGE);
            height = height.min(CPU_MAX_EDGE);
            on_progress(
                &format!("Adjusted resolution for CPU: {width}x{height}"),
                25,
            );
        }

        let seed = spec.seed.unwrap_or_else(rand::random::<u64>);
        let mut hasher = DefaultHasher::new();
        spec.prompt.hash(&mut hasher);
        seed.hash(&mut hasher);
        let field = hasher.finish();

        on_progress("Starting image generation...", 30);
        let start = Instant::now();

        // Accumulate one octave of the pattern per inference step so
        // progress tracks real work.
        let steps = spec.steps.max(1);
        let mut accum = vec![[0u32; 3]; (width * height) as usize];
        for step in 0..steps {
            let octave = field.wrapping_mul(u64::from(step) * 2 + 1);
            for y in 0..height {
                for x in 0..width {
                    let px = pixel_noise(octave, x >> (step % 4), y >> (step % 4));
                    let cell = &mut accum[(y * width + x) as usize];
                    cell[0] += u32::from(px[0]);
                    cell[1] += u32::from(px[1]);
                    cell[2] += u32::from(px[2]);
                }
            }
            // Map step completion onto the 30–90 band, like the model path.
            let percent = 30 + (step + 1) * 60 / steps;
            on_progress(
                &format!("Rendering step {}/{steps}", step + 1),
                percent as u8,
            );
        }

        let img = RgbImage::from_fn(width, height, |x, y| {
            let cell = accum[(y * width + x) as usize];
            Rgb([
                (cell[0] / steps) as u8,
                (cell[1] / steps) as u8,
                (cell[2] / steps) as u8,
            ])
        });

        on_progress("Encoding image...", 95);
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, ImageFormat::Png)
            .map_err(|e| EngineError::Encode(e.to_string()))?;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        on_progress("Complete", 100);

        Ok(RenderOutput {
            bytes: bytes.into_inner(),
            width,
            height,
            seed,
            elapsed_ms,
        })
    }
}

/// Cheap deterministic per-pixel hash.
fn pixel_noise(octave: u64, x: u32, y: u32) -> [u8; 3] {
    let mut h = octave
        ^ (u64::from(x).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        ^ (u64::from(y).wrapping_mul(0xC2B2_AE3D_27D4_EB4F));
    h ^= h >> 33;
    h = h.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
    h ^= h >> 33;
    [(h & 0xFF) as u8, ((h >> 8) & 0xFF) as u8, ((h >> 16) & 0xFF) as u8]
}
