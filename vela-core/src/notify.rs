use async_trait::async_trait;

/// The SMS capability the core consumes. Fire-and-forget: the transport
/// handles (or drops) its own failures, the core imposes no retry contract.
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, phone: &str, message: &str);
}

/// Default runtime sender: writes the message to the log instead of a
/// gateway. Useful in development and as a stand-in until a transport is
/// wired in.
pub struct LogSms;

#[async_trait]
impl SmsSender for LogSms {
    async fn send(&self, phone: &str, message: &str) {
        tracing::info!(phone, message, "SMS notification");
    }
}
