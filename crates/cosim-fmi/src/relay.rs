use std::ffi::{CStr, CString};

use cosim_core::{BridgeError, Fmi2Status, LogRecord};

/// The host's logging callback, bound to one component.
pub trait HostLogger {
    fn log(&self, status: Fmi2Status, category: Option<&CStr>, message: &CStr);
}

/// Forwards model log records and bridge failures to the host logger.
///
/// Records the model did not mark as debug are always forwarded. Debug
/// records pass only while debug logging is on and their category is enabled;
/// an empty category list enables all of them.
pub struct LogRelay<L> {
    logger: L,
    debug_logging: bool,
    categories: Vec<String>,
}

impl<L: HostLogger> LogRelay<L> {
    pub fn new(logger: L, debug_logging: bool) -> Self {
        Self {
            logger,
            debug_logging,
            categories: Vec::new(),
        }
    }

    pub fn set_debug_logging(&mut self, on: bool, categories: Vec<String>) {
        tracing::debug!(on, categories = ?categories, "Debug logging updated");
        self.debug_logging = on;
        self.categories = categories;
    }

    pub fn debug_logging(&self) -> bool {
        self.debug_logging
    }

    pub fn logger(&self) -> &L {
        &self.logger
    }

    pub fn forwards(&self, record: &LogRecord) -> bool {
        if !record.debug {
            return true;
        }
        self.debug_logging
            && (self.categories.is_empty()
                || record
                    .category
                    .as_ref()
                    .is_some_and(|c| self.categories.contains(c)))
    }

    /// Forwards drained records in order.
    pub fn relay(&self, records: Vec<LogRecord>) {
        for record in records {
            if self.forwards(&record) {
                self.emit(record.status, record.category.as_deref(), &record.message);
            }
        }
    }

    /// Delivers a bridge failure to the host.
    pub fn report(&self, err: &BridgeError) {
        let status = err.status();
        self.emit(status, Some(status_category(status)), &err.to_string());
    }

    pub fn emit(&self, status: Fmi2Status, category: Option<&str>, message: &str) {
        let category = category.map(to_cstring);
        let message = to_cstring(&escape_format(message));
        self.logger.log(status, category.as_deref(), &message);
    }
}

fn status_category(status: Fmi2Status) -> &'static str {
    match status {
        Fmi2Status::Warning => "logStatusWarning",
        Fmi2Status::Discard => "logStatusDiscard",
        Fmi2Status::Error => "logStatusError",
        Fmi2Status::Fatal => "logStatusFatal",
        Fmi2Status::Ok | Fmi2Status::Pending => "logAll",
    }
}

/// The host logger takes a printf-style format string.
fn escape_format(message: &str) -> String {
    message.replace('%', "%%")
}

fn to_cstring(s: &str) -> CString {
    CString::new(s.replace('\0', " ")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        lines: RefCell<Vec<(Fmi2Status, Option<String>, String)>>,
    }

    impl HostLogger for Recorder {
        fn log(&self, status: Fmi2Status, category: Option<&CStr>, message: &CStr) {
            self.lines.borrow_mut().push((
                status,
                category.map(|c| c.to_string_lossy().into_owned()),
                message.to_string_lossy().into_owned(),
            ));
        }
    }

    fn debug(category: &str, msg: &str) -> LogRecord {
        LogRecord::new(Fmi2Status::Ok, msg)
            .with_category(category)
            .as_debug()
    }

    #[test]
    fn plain_records_always_pass() {
        let relay = LogRelay::new(Recorder::default(), false);
        relay.relay(vec![
            LogRecord::new(Fmi2Status::Warning, "first"),
            LogRecord::new(Fmi2Status::Ok, "second").with_category("logAll"),
        ]);
        let lines = relay.logger().lines.borrow();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], (Fmi2Status::Warning, None, "first".into()));
        assert_eq!(lines[1].1.as_deref(), Some("logAll"));
    }

    #[test]
    fn debug_records_follow_switch_and_categories() {
        let mut relay = LogRelay::new(Recorder::default(), false);
        relay.relay(vec![debug("a", "hidden")]);
        assert!(relay.logger().lines.borrow().is_empty());

        relay.set_debug_logging(true, vec![]);
        relay.relay(vec![debug("a", "shown")]);
        assert_eq!(relay.logger().lines.borrow().len(), 1);

        relay.set_debug_logging(true, vec!["b".into()]);
        relay.relay(vec![debug("a", "filtered"), debug("b", "kept")]);
        let lines = relay.logger().lines.borrow();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].2, "kept");
    }

    #[test]
    fn failures_carry_status_category() {
        let relay = LogRelay::new(Recorder::default(), false);
        relay.report(&BridgeError::fatal("gone"));
        let lines = relay.logger().lines.borrow();
        assert_eq!(lines[0].0, Fmi2Status::Fatal);
        assert_eq!(lines[0].1.as_deref(), Some("logStatusFatal"));
        assert_eq!(lines[0].2, "fatal: gone");
    }

    #[test]
    fn messages_are_format_safe() {
        let relay = LogRelay::new(Recorder::default(), false);
        relay.emit(Fmi2Status::Ok, None, "100% done\0tail");
        assert_eq!(relay.logger().lines.borrow()[0].2, "100%% done tail");
    }
}
