mod differentiation;
pub use differentiation::{derivative, derivative_tree};

mod taylor;
pub use taylor::taylor_polynomial;
