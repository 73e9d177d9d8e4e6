//! Page navigation capability used by the auth interceptor

/// Where the user currently is, and how to send them to the login page.
///
/// Implementations must tolerate repeated redirects: several in-flight
/// requests can each detect an invalid session.
#[cfg_attr(test, mockall::automock)]
pub trait Navigator: Send + Sync {
    /// Path of the page currently shown
    fn current_path(&self) -> String;

    /// Leave the current page for the login page
    fn redirect_to_login(&self);
}
