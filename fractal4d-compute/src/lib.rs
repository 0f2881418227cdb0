pub mod accumulate;
pub mod cancel;
pub mod cross_section;
pub mod engine;
pub mod sample_space;

pub use accumulate::{accumulate_hologram, accumulate_single, accumulate_tiered, IterationTiers, TraceBuf};
pub use cancel::CancelFlag;
pub use cross_section::{escape_counts, escape_map};
pub use engine::{spawn_hologram, spawn_nebula, spawn_projection, EngineError, RenderHandle, RenderOptions};
pub use sample_space::{CubeSpace, MaskedPlaneSpace, SampleSpace, SampleSpaceError, SamplingMethod};
