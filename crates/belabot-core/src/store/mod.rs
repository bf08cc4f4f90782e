// ── Encoder state store ──
//
// Single-writer, many-reader snapshot of the encoder. Pushes are merged on
// the link's receive path; readers get whole `Arc<EncoderState>`s.

mod merge;
mod state_store;

pub use state_store::{StateDiff, StateStore};
