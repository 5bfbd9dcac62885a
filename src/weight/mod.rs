pub mod broadcaster;
pub mod decoder;
pub mod reader;
pub mod stabilizer;
pub mod types;

pub use broadcaster::{Broadcaster, ObserverId};
pub use decoder::{decode_frames, FrameDecoder, FRAME_DIGITS};
pub use reader::{DecodePipeline, StreamReader, WeightCells};
pub use stabilizer::{Stabilizer, StabilizerConfig};
pub use types::*;
