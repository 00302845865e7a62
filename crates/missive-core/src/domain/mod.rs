//! Domain model (recipients, delivery state, variation, classification).
//!
//! ここにあるものはすべて純粋（I/O なし）。時刻は呼び出し側が渡す。

pub mod classifier;
pub mod errors;
pub mod ids;
pub mod outcome;
pub mod recipient;
pub mod state;
pub mod timestamp;
pub mod variation;

pub use classifier::{OutcomeClassification, PhraseBook};
pub use errors::{ChannelError, MissiveError, MissiveResult};
pub use ids::RunId;
pub use outcome::AttemptOutcome;
pub use recipient::{DeliveryStatus, FailureReason, Recipient};
pub use state::{DeliveryState, Reconciliation, StateMeta};
pub use variation::{MessageTemplate, VariationRules, vary};
