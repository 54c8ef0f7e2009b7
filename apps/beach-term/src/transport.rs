use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use transport_bus::{BusError, EventBus};

/// Opens the socket every session of this client shares.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn EventBus>, BusError>;
}

/// Process-wide transport, connected on first use and handed to every session.
pub struct TransportSlot {
    connector: Arc<dyn TransportConnector>,
    transport: OnceCell<Arc<dyn EventBus>>,
}

impl TransportSlot {
    pub fn new(connector: Arc<dyn TransportConnector>) -> Self {
        Self {
            connector,
            transport: OnceCell::new(),
        }
    }

    /// Wraps an already connected transport.
    pub fn ready(transport: Arc<dyn EventBus>) -> Self {
        struct Connected(Arc<dyn EventBus>);

        #[async_trait]
        impl TransportConnector for Connected {
            async fn connect(&self) -> Result<Arc<dyn EventBus>, BusError> {
                Ok(self.0.clone())
            }
        }

        Self {
            connector: Arc::new(Connected(transport.clone())),
            transport: OnceCell::new_with(Some(transport)),
        }
    }

    /// Concurrent callers share one connect attempt. A failed attempt is not
    /// cached; the next call tries again.
    pub async fn acquire(&self) -> Result<Arc<dyn EventBus>, BusError> {
        self.transport
            .get_or_try_init(|| async {
                tracing::debug!(target: "beach_term::transport", "connecting shared transport");
                self.connector.connect().await
            })
            .await
            .cloned()
    }

    pub fn get(&self) -> Option<Arc<dyn EventBus>> {
        self.transport.get().cloned()
    }
}
