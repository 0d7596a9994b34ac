use async_trait::async_trait;
use tracing::info;

use super::{Delivery, Notifier};
use crate::errors::CollaboratorError;

/// Notifier that only writes a structured log line.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    name: String,
}

impl LogNotifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_message(
        &self,
        text: &str,
        destination: &str,
    ) -> Result<Delivery, CollaboratorError> {
        info!(target: "certkeeper::notification", destination = %destination, "{}", text);
        Ok(Delivery::new("Log line written"))
    }
}
