//! Browser-session boundary for the PayPal payment id.

use crate::error::GatewayError;
use async_trait::async_trait;
use tower_sessions::Session;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put(&self, key: &str, value: &str) -> Result<(), GatewayError>;

    /// Read and clear in one step.
    async fn take(&self, key: &str) -> Result<Option<String>, GatewayError>;
}

#[async_trait]
impl SessionStore for Session {
    async fn put(&self, key: &str, value: &str) -> Result<(), GatewayError> {
        self.insert(key, value).await?;
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, GatewayError> {
        Ok(self.remove::<String>(key).await?)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Session double for unit tests.
    #[derive(Default)]
    pub struct MemorySession {
        values: Mutex<HashMap<String, String>>,
    }

    impl MemorySession {
        pub fn peek(&self, key: &str) -> Option<String> {
            self.values.lock().unwrap().get(key).cloned()
        }
    }

    #[async_trait]
    impl SessionStore for MemorySession {
        async fn put(&self, key: &str, value: &str) -> Result<(), GatewayError> {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn take(&self, key: &str) -> Result<Option<String>, GatewayError> {
            Ok(self.values.lock().unwrap().remove(key))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

    #[tokio::test]
    async fn tower_session_take_is_read_once() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);

        session.put("paypal_payment_id", "PAY-1").await.unwrap();

        assert_eq!(
            session.take("paypal_payment_id").await.unwrap().as_deref(),
            Some("PAY-1")
        );
        assert_eq!(session.take("paypal_payment_id").await.unwrap(), None);
    }
}
