//! Repository factory abstraction
//!
//! Lets the service pick a storage backend at startup without the rest of the
//! application knowing which one it got.

/// A trait for repository factories
///
/// Generic over the repository type and whatever the repository needs to be built.
pub trait RepositoryFactory<R, C> {
    /// Create a new repository instance
    ///
    /// # Arguments
    ///
    /// * `config` - The connection or configuration the repository is built from
    fn create_repository(&self, config: C) -> R;
}
