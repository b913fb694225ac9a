//! Field model and form state

mod accessor;
mod bucket;
mod control;
mod state;

pub use accessor::{ChangeListener, ConfigValueAccessor, TouchedListener, ValidationError};
pub use bucket::FieldBucket;
pub use control::{FormControl, Validator};
pub use state::FormState;
