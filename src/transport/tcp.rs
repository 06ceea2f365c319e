//! TCP transport to a simulator RPC endpoint

use crate::transport::traits::TransportConnector;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::net::TcpStream;

/// TCP connector for one simulator API server
pub struct TcpConnector {
    address: String,
    name: &'static str,
}

impl TcpConnector {
    /// Connector for the multirotor API server
    pub fn multirotor(address: String) -> Self {
        Self {
            address,
            name: "multirotor",
        }
    }

    /// Connector for the car API server
    pub fn car(address: String) -> Self {
        Self {
            address,
            name: "car",
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl TransportConnector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> Result<Self::Stream> {
        let stream = TcpStream::connect(&self.address)
            .await
            .with_context(|| format!("connecting to {} endpoint at {}", self.name, self.address))?;
        // Requests are small and latency bound
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    fn name(&self) -> &str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_connector_names() {
        let drone = TcpConnector::multirotor("127.0.0.1:41451".into());
        assert_eq!(drone.name(), "multirotor");
        assert_eq!(drone.address(), "127.0.0.1:41451");

        let car = TcpConnector::car("127.0.0.1:41452".into());
        assert_eq!(car.name(), "car");
    }

    #[tokio::test]
    async fn test_connect_refused_is_error() {
        // Bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind failed");
        let address = listener.local_addr().expect("no local addr").to_string();
        drop(listener);

        let connector = TcpConnector::car(address);
        assert!(connector.connect().await.is_err());
    }
}
