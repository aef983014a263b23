mod strings;
pub use strings::{derivative_label, raise_superscript};
