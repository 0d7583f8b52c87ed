// Session lifecycle and streaming generation.

pub mod generation;
pub mod manager;
