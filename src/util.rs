pub mod object;
pub mod range;
