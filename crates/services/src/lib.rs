pub mod classifier;
pub mod deepgram;
pub mod listings;
pub mod simulate;

pub use classifier::{ClassifierError, RoleClassifier};
pub use deepgram::{AdapterState, RecognitionAdapter};
pub use listings::{Property, PropertySearch, Recommendation};
pub use simulate::SimulatedTranscripts;
