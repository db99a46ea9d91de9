use crate::report::domain::report::Report;
use crate::report::domain::report_sink::ReportSink;

/// Writes the report through the `log` crate at `info`.
pub struct LogReportSink;

impl ReportSink for LogReportSink {
    fn name(&self) -> &str {
        "log"
    }

    fn deliver(&self, report: &Report) -> Result<(), Box<dyn std::error::Error>> {
        for line in report.message().lines() {
            log::info!("{line}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counting::domain::count_result::{CountResult, FinishReason};

    #[test]
    fn test_log_sink_never_fails() {
        let report = Report::new(&CountResult::default(), FinishReason::EndOfStream, None);
        assert!(LogReportSink.deliver(&report).is_ok());
        assert_eq!(LogReportSink.name(), "log");
    }
}
