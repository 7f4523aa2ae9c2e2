//! Templates and the view models that feed them.

pub mod views;
