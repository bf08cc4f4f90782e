// ── Encoder domain model ──
//
// Canonical, read-only view of the encoder as reconstructed from pushes.
// `StateStore` is the only writer; everything else gets an
// `Arc<EncoderState>` snapshot.

pub mod encoder;
pub mod network;
pub mod power;
pub mod stream;

// ── Re-exports ──────────────────────────────────────────────────────

pub use encoder::{EncoderState, Notification, SubObject};
pub use network::{Interface, Modem, ModemLink};
pub use power::{Sensors, Ups};
pub use stream::{PipelineInfo, Stream, StreamSettings};
