/// Fluent builders for stamps and configurations.
pub mod builder;
/// Mock collaborators.
pub mod mocks;
