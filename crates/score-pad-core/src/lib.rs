pub mod actions;
pub mod history;
pub mod note;
pub mod project;
pub mod sequence;

pub use note::Note;
pub use project::Project;
pub use sequence::{Sequence, SequenceHandle};
