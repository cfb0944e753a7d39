pub mod market;
pub mod numeric;
pub mod outcome;

pub use market::*;
pub use outcome::*;
