pub mod handwriting;
pub mod synthetic;
