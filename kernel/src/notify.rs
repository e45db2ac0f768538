// Error Notification
//
// The boundary where typed errors are handed to whatever presents them
// to a person. The kernel only produces errors; notifiers display them.

use std::error::Error;
use std::io::Write;

use tracing::error;

pub trait ErrorNotifier: Send + Sync {
    fn notify(&self, error: &dyn Error, title: &str);
}

/// Reports to the tracing subscriber and to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl TracingNotifier {
    /// `error` followed by its source chain, `: `-separated.
    pub fn render(error: &dyn Error) -> String {
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            let text = cause.to_string();
            if !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = cause.source();
        }
        message
    }
}

impl ErrorNotifier for TracingNotifier {
    fn notify(&self, err: &dyn Error, title: &str) {
        let message = Self::render(err);
        error!(%title, error = %message, "operation failed");
        let _ = writeln!(std::io::stderr(), "{title}: {message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LogError;
    use std::io;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<(String, String)>>);

    impl ErrorNotifier for Recording {
        fn notify(&self, error: &dyn Error, title: &str) {
            self.0
                .lock()
                .unwrap()
                .push((title.to_string(), error.to_string()));
        }
    }

    #[test]
    fn render_includes_source_once() {
        let err = LogError::Io {
            path: "/tmp/events.csv".into(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };

        let rendered = TracingNotifier::render(&err);

        assert_eq!(rendered, "I/O error on /tmp/events.csv: denied");
    }

    #[test]
    fn notifier_receives_title_and_error() {
        let notifier = Recording::default();
        let err = LogError::InvalidPath("file name is empty".into());

        notifier.notify(&err, "Append failed");

        let seen = notifier.0.lock().unwrap();
        assert_eq!(seen[0].0, "Append failed");
        assert!(seen[0].1.contains("file name is empty"));
    }
}
