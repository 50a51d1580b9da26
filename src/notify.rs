/// Displays a message to the user. Delivery is best effort; callers never
/// learn whether it was seen.
pub trait NotificationSink {
    fn notify(&mut self, title: &str, body: &str);
}

/// Writes notifications to the terminal, ringing the bell first.
#[derive(Debug, Default)]
pub struct TerminalSink;

impl NotificationSink for TerminalSink {
    fn notify(&mut self, title: &str, body: &str) {
        tracing::info!(title, body, "notification");
        println!("\x07[{}] {}", title, body);
    }
}

/// Passes notifications through only while enabled. Disabled notifications
/// are still logged.
#[derive(Debug, Default)]
pub struct Gate<S> {
    inner: S,
    enabled: bool,
}

impl<S: NotificationSink> Gate<S> {
    pub fn new(inner: S, enabled: bool) -> Self {
        Gate { inner, enabled }
    }

    #[cfg(test)]
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: NotificationSink> NotificationSink for Gate<S> {
    fn notify(&mut self, title: &str, body: &str) {
        if self.enabled {
            self.inner.notify(title, body);
        } else {
            tracing::debug!(title, body, "notification suppressed");
        }
    }
}

#[cfg(test)]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

/// Keeps every notification in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub received: Vec<Notification>,
}

#[cfg(test)]
impl NotificationSink for RecordingSink {
    fn notify(&mut self, title: &str, body: &str) {
        self.received.push(Notification {
            title: title.to_string(),
            body: body.to_string(),
        });
    }
}
