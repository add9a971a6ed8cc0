//! Progress and warning sink for a bundle session.
//!
//! The library never logs on its own; callers hand the session a
//! `Reporter` and decide what to do with the messages. Warnings also land
//! in the final report, so a sink is only needed for live feedback.

/// Receives progress notes and warnings while a session runs
pub trait Reporter {
    /// A progress note (document being walked, session finished)
    fn info(&mut self, message: &str);
    /// Something was skipped or failed without stopping the session
    fn warn(&mut self, message: &str);
}

/// Discards everything; the default sink
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn info(&mut self, _message: &str) {}
    fn warn(&mut self, _message: &str) {}
}
