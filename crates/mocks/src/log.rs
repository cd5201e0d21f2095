use crate::spy::Spy;
use crate::{MockEnvironment, register_service_mock};
use serde_json::{Value, json};
use std::rc::Rc;
use widgetbed_core::error::ServiceError;
use widgetbed_core::services::{Log, LogLevel, Service, ServiceName, ServiceThunk};

/// Log without side effects: every method only records its call.
pub struct MockLog {
    pub log: Spy,
    pub trace: Spy,
    pub debug: Spy,
    pub info: Spy,
    pub warn: Spy,
    pub error: Spy,
}

impl Default for MockLog {
    fn default() -> Self {
        Self {
            log: Spy::new("axLog.log"),
            trace: Spy::new("axLog.trace"),
            debug: Spy::new("axLog.debug"),
            info: Spy::new("axLog.info"),
            warn: Spy::new("axLog.warn"),
            error: Spy::new("axLog.error"),
        }
    }
}

fn message_args(message: &str, args: &[Value]) -> Vec<Value> {
    std::iter::once(json!(message)).chain(args.iter().cloned()).collect()
}

impl Log for MockLog {
    fn log(&self, level: LogLevel, message: &str, args: &[Value]) {
        let mut call = vec![json!(level)];
        call.extend(message_args(message, args));
        self.log.record(call);
    }

    fn trace(&self, message: &str, args: &[Value]) {
        self.trace.record(message_args(message, args));
    }

    fn debug(&self, message: &str, args: &[Value]) {
        self.debug.record(message_args(message, args));
    }

    fn info(&self, message: &str, args: &[Value]) {
        self.info.record(message_args(message, args));
    }

    fn warn(&self, message: &str, args: &[Value]) {
        self.warn.record(message_args(message, args));
    }

    fn error(&self, message: &str, args: &[Value]) {
        self.error.record(message_args(message, args));
    }
}

fn create_log_mock(
    _environment: &MockEnvironment,
    _default: ServiceThunk,
) -> Result<Service, ServiceError> {
    Ok(Service::Log(Rc::new(MockLog::default())))
}

register_service_mock!(ServiceName::Log, create_log_mock);

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn level_methods_record_separately() {
        let log = MockLog::default();
        log.error("test error", &[]);
        log.log(LogLevel::Info, "[0] items", &[json!(3)]);

        assert!(log.error.was_called_with(&[json!("test error")]));
        assert!(log.log.was_called_with(&[json!("INFO"), json!("[0] items"), json!(3)]));
        assert!(!log.info.was_called());
    }
}
