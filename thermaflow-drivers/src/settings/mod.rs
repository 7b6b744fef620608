//! Settings storage adapters

pub mod mirror;

pub use mirror::MirroredSettings;
