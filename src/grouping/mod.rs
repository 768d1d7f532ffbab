pub mod grouper;
pub mod normalizer;
