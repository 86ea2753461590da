//! Client-side poller for the mood bridge.
//!
//! A `Poller` fetches from an `EmotionSource` once on start and then on a
//! fixed period, keeping the latest successfully fetched sample as its
//! display state. Empty responses and failures leave that state untouched.

mod error;
mod poller;
mod source;

pub use error::PollError;
pub use poller::{DEFAULT_INTERVAL, Poller, PollerHandle};
pub use source::{EmotionSource, FetchOutcome, HttpSource};
