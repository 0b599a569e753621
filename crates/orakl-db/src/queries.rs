//! Database query functions organized by domain.

pub mod jobs;
pub mod reporters;
pub mod settings;
