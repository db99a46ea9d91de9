use crate::report::domain::report::Report;

/// Delivery channel for a finished count.
///
/// Delivery is best effort: the count is final before a sink sees it, and a
/// failure never changes it.
pub trait ReportSink: Send {
    fn name(&self) -> &str;

    fn deliver(&self, report: &Report) -> Result<(), Box<dyn std::error::Error>>;
}
