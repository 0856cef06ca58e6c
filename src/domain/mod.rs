//! Messaging domain primitives.
//!
//! Write-side side effects are modeled as [`events::MessagingEvent`] values
//! handed to an explicit [`observers::ObserverList`] at each write call site.

pub mod events;
pub mod observers;

pub use crate::gate::Role;
pub use events::MessagingEvent;
pub use observers::{
    CleanupObserver, HistoryObserver, MessagingObserver, NotificationObserver, ObserverList,
};

/// Maximum characters shown in a message preview.
pub const PREVIEW_LENGTH: usize = 50;

/// First [`PREVIEW_LENGTH`] characters of `body`, with `...` when cut.
#[must_use]
pub fn preview(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(PREVIEW_LENGTH).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview() {
        assert_eq!(preview("hello"), "hello");
        let long = "x".repeat(60);
        assert_eq!(preview(&long), format!("{}...", "x".repeat(50)));
        assert_eq!(preview(&"é".repeat(50)), "é".repeat(50));
    }
}
