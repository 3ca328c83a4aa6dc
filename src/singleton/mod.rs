//! One-shot, concurrency-safe construction of shared handles.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;


/// Outcome shared by every caller of a [`Singleton`].
pub type Shared<T> = Result<Arc<T>, Arc<anyhow::Error>>;

/// Lazily constructs a value exactly once.
///
/// Concurrent callers wait for the single in-flight construction and then
/// observe its outcome. A failed construction is remembered as well: later
/// calls get the same error and the constructor is never run again.
///
/// Dropping the future of the caller that is running the constructor lets
/// the next waiter start over, so constructors should not be raced against
/// cancellation from outside.
pub struct Singleton<T: ?Sized> {
    cell: OnceCell<Shared<T>>,
}

impl<T: ?Sized> Singleton<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Returns the cached outcome, running `create` if nothing is cached yet.
    pub async fn get_or_create<F, Fut>(&self, create: F) -> Shared<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Arc<T>>>,
    {
        self.cell
            .get_or_init(|| async move { create().await.map_err(Arc::new) })
            .await
            .clone()
    }

    /// Cached outcome, if construction already finished.
    pub fn get(&self) -> Option<&Shared<T>> {
        self.cell.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

impl<T: ?Sized> Default for Singleton<T> {
    fn default() -> Self {
        Self::new()
    }
}
