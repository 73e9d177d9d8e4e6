//! Navigation for a terminal session

use sigma_http::Navigator;
use tracing::warn;

/// A terminal has no pages; it sits at the application root and answers a
/// redirect with a hint to sign in again.
#[derive(Debug, Default)]
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn current_path(&self) -> String {
        "/".to_string()
    }

    fn redirect_to_login(&self) {
        warn!("Session is no longer valid; run `sigma login` to sign in again");
    }
}
