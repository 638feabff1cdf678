//! Testing utilities and mock implementations.
//!
//! Mock implementations of the external seams (encoder process, media
//! resolver, clock) so the full job lifecycle is testable without ffmpeg,
//! media files, or wall-clock waits.

mod manual_clock;
mod mock_encoder;
mod mock_media;

pub use manual_clock::ManualClock;
pub use mock_encoder::{MockLauncher, MockProcess};
pub use mock_media::MockMediaResolver;
