//! Default connector opening real vendor sessions

use crate::adb::{AdbConnection, AdbDevice};
use crate::error::Result;
use crate::game::GameClient;
use crate::session::{AndroidSession, AppleSession, DeviceConnector, GameSession};
use crate::xctest::WdaClient;
use async_trait::async_trait;

/// Opens adb, WebDriverAgent and game SDK sessions
#[derive(Debug, Clone, Default)]
pub struct VendorConnector {
    adb: AdbConnection,
}

impl VendorConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific adb binary instead of the configured one
    pub fn with_adb_path(adb_path: impl Into<String>) -> Self {
        Self {
            adb: AdbConnection::with_path(adb_path),
        }
    }
}

#[async_trait]
impl DeviceConnector for VendorConnector {
    async fn connect_android(&self, address: &str) -> Result<Box<dyn AndroidSession>> {
        Ok(Box::new(AdbDevice::open(&self.adb, address).await?))
    }

    async fn connect_apple(&self, address: &str) -> Result<Box<dyn AppleSession>> {
        Ok(Box::new(WdaClient::open(address).await?))
    }

    async fn connect_game(&self, address: &str) -> Result<Box<dyn GameSession>> {
        Ok(Box::new(GameClient::connect(address).await?))
    }
}
