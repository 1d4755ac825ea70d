//! Change dispatcher: hands new configurations to the application callback.

use crate::error::{ConfigError, Result};
use std::sync::{Arc, OnceLock};

/// Application callback deciding whether a new configuration is accepted.
pub type ChangeCallback<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Holds the single change callback of a session.
///
/// The callback runs synchronously on the watcher that detected the change.
/// Returning `false` rejects the change: the session rolls back and that
/// watcher stops for good.
///
/// # Examples
///
/// ```rust
/// use cloud_reload::notify::ChangeDispatcher;
///
/// let dispatcher = ChangeDispatcher::<u32>::new();
/// dispatcher.register(|port: &u32| *port >= 1024).unwrap();
///
/// assert!(dispatcher.dispatch(&8080));
/// assert!(!dispatcher.dispatch(&80));
/// assert!(dispatcher.register(|_: &u32| true).is_err());
/// ```
pub struct ChangeDispatcher<T> {
    callback: OnceLock<ChangeCallback<T>>,
}

impl<T> ChangeDispatcher<T> {
    /// Create a dispatcher with no callback.
    pub fn new() -> Self {
        Self {
            callback: OnceLock::new(),
        }
    }

    /// Register the change callback.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CallbackAlreadyRegistered`] on a second call.
    pub fn register<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.callback
            .set(Arc::new(callback))
            .map_err(|_| ConfigError::CallbackAlreadyRegistered)
    }

    /// Whether a callback has been registered.
    pub fn is_registered(&self) -> bool {
        self.callback.get().is_some()
    }

    /// Offer `config` to the callback and return its verdict.
    ///
    /// Without a registered callback every change is accepted.
    pub fn dispatch(&self, config: &T) -> bool {
        match self.callback.get() {
            Some(callback) => callback(config),
            None => true,
        }
    }
}

impl<T> Default for ChangeDispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_dispatch_without_callback_accepts() {
        let dispatcher = ChangeDispatcher::<i32>::new();
        assert!(!dispatcher.is_registered());
        assert!(dispatcher.dispatch(&1));
    }

    #[test]
    fn test_dispatch_invokes_callback() {
        let dispatcher = ChangeDispatcher::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let counter_clone = Arc::clone(&counter);
        dispatcher
            .register(move |value: &i32| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                *value > 0
            })
            .unwrap();

        assert!(dispatcher.is_registered());
        assert!(dispatcher.dispatch(&5));
        assert!(!dispatcher.dispatch(&-5));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_second_registration_fails() {
        let dispatcher = ChangeDispatcher::<i32>::new();
        dispatcher.register(|_| true).unwrap();

        let err = dispatcher.register(|_| false).unwrap_err();
        assert!(matches!(err, ConfigError::CallbackAlreadyRegistered));
        // The first callback stays in place.
        assert!(dispatcher.dispatch(&0));
    }
}
