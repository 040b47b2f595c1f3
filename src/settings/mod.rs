//! Visual settings, structural updates and project configuration.

/// Project file and encoding inputs.
pub mod project;
/// Single-field structural updates.
pub mod update;
/// Visual settings snapshot and its enumerations.
pub mod visual;

#[cfg(test)]
#[path = "../../tests/unit/settings/settings.rs"]
mod tests;
