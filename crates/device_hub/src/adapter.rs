//! Platform adapters normalizing vendor sessions to one interface

use crate::error::{DeviceError, Result};
use crate::hierarchy::{android_hierarchy_to_json, ios_hierarchy_to_json};
use crate::platform::Platform;
use crate::session::{
    AndroidSession, AppleSession, DeviceConnector, ForegroundApp, GameSession, WindowSize,
};
use image::DynamicImage;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Optional operations that not every platform provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ExtendedHierarchy,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExtendedHierarchy => f.write_str("extended hierarchy dump"),
        }
    }
}

/// Capability set of one adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub extended_hierarchy: bool,
}

impl Capabilities {
    pub fn of(platform: Platform) -> Self {
        Self {
            extended_hierarchy: matches!(platform, Platform::Android | Platform::Ios),
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::ExtendedHierarchy => self.extended_hierarchy,
        }
    }
}

/// Hierarchy dump with the context needed to map it onto the screen
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyDump {
    /// Vendor-native markup, when the vendor produces markup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xml_hierarchy: Option<String>,
    pub json_hierarchy: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    /// Android package or iOS bundle id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    /// In the vendor's unit: pixels on Android, points on iOS
    pub window_size: WindowSize,
    /// Points-to-pixels ratio used for `json_hierarchy` rects (iOS)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

#[derive(Debug)]
pub struct AndroidDevice {
    session: Box<dyn AndroidSession>,
}

impl AndroidDevice {
    pub fn new(session: Box<dyn AndroidSession>) -> Self {
        Self { session }
    }

    pub async fn screenshot(&self) -> Result<DynamicImage> {
        self.session.screenshot().await
    }

    pub async fn dump_hierarchy(&self) -> Result<Value> {
        let page_xml = self.session.dump_hierarchy().await?;
        android_hierarchy_to_json(&page_xml)
    }

    pub async fn dump_hierarchy_extended(&self) -> Result<HierarchyDump> {
        let ForegroundApp { package, activity } = self.session.app_current().await?;
        let page_xml = self.session.dump_hierarchy().await?;
        let json_hierarchy = android_hierarchy_to_json(&page_xml)?;
        let window_size = self.session.window_size().await?;

        Ok(HierarchyDump {
            xml_hierarchy: Some(page_xml),
            json_hierarchy,
            activity,
            package_name: Some(package),
            window_size,
            scale: None,
        })
    }

    pub fn device(&self) -> &dyn AndroidSession {
        self.session.as_ref()
    }
}

#[derive(Debug)]
pub struct AppleDevice {
    session: Box<dyn AppleSession>,
    /// Read once when the session opened
    scale: f64,
}

impl AppleDevice {
    /// Wrap a session, capturing its display scale
    pub async fn new(session: Box<dyn AppleSession>) -> Result<Self> {
        let scale = session.scale().await?;
        if !(scale.is_finite() && scale > 0.0) {
            return Err(DeviceError::Protocol(format!("invalid display scale {}", scale)));
        }
        debug!("iOS display scale {}", scale);
        Ok(Self { session, scale })
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub async fn screenshot(&self) -> Result<DynamicImage> {
        self.session.screenshot().await
    }

    pub async fn dump_hierarchy(&self) -> Result<Value> {
        let source = self.session.source().await?;
        Ok(ios_hierarchy_to_json(source, self.scale))
    }

    pub async fn dump_hierarchy_extended(&self) -> Result<HierarchyDump> {
        let json_hierarchy = self.dump_hierarchy().await?;
        let window_size = self.session.window_size().await?;
        let app = self.session.active_app().await?;

        Ok(HierarchyDump {
            xml_hierarchy: None,
            json_hierarchy,
            activity: app.activity,
            package_name: Some(app.package),
            window_size,
            scale: Some(self.scale),
        })
    }

    pub fn device(&self) -> &dyn AppleSession {
        self.session.as_ref()
    }
}

#[derive(Debug)]
pub struct GameDevice {
    session: Box<dyn GameSession>,
}

impl GameDevice {
    pub fn new(session: Box<dyn GameSession>) -> Self {
        Self { session }
    }

    pub async fn screenshot(&self) -> Result<DynamicImage> {
        self.session.screenshot().await
    }

    pub async fn dump_hierarchy(&self) -> Result<Value> {
        self.session.dump_hierarchy().await
    }

    pub fn device(&self) -> &dyn GameSession {
        self.session.as_ref()
    }
}

/// Borrowed vendor session behind an adapter
///
/// Use `as_any()` on the session to reach the concrete vendor type
/// (`AdbDevice`, `WdaClient`, `GameClient`) for operations this crate does
/// not wrap.
#[derive(Debug, Clone, Copy)]
pub enum DeviceHandle<'a> {
    Android(&'a dyn AndroidSession),
    Apple(&'a dyn AppleSession),
    Game(&'a dyn GameSession),
}

/// A connected device of any platform
#[derive(Debug)]
pub enum DeviceAdapter {
    Android(AndroidDevice),
    Apple(AppleDevice),
    Game(GameDevice),
}

impl DeviceAdapter {
    /// Open the vendor session for `platform` and wrap it
    ///
    /// Game targets with an empty address go to `localhost`.
    pub async fn connect(
        connector: &dyn DeviceConnector,
        platform: Platform,
        address: &str,
    ) -> Result<Self> {
        let address = platform.resolve_address(address);
        debug!("opening {} session for {:?}", platform, address);

        Ok(match platform {
            Platform::Android => Self::Android(AndroidDevice::new(
                connector.connect_android(address).await?,
            )),
            Platform::Ios => {
                Self::Apple(AppleDevice::new(connector.connect_apple(address).await?).await?)
            }
            Platform::Game => Self::Game(GameDevice::new(connector.connect_game(address).await?)),
        })
    }

    pub fn platform(&self) -> Platform {
        match self {
            Self::Android(_) => Platform::Android,
            Self::Apple(_) => Platform::Ios,
            Self::Game(_) => Platform::Game,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::of(self.platform())
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities().supports(capability)
    }

    /// Capture the current screen. Never cached.
    pub async fn screenshot(&self) -> Result<DynamicImage> {
        match self {
            Self::Android(d) => d.screenshot().await,
            Self::Apple(d) => d.screenshot().await,
            Self::Game(d) => d.screenshot().await,
        }
    }

    /// Current UI tree in normalized JSON form
    pub async fn dump_hierarchy(&self) -> Result<Value> {
        match self {
            Self::Android(d) => d.dump_hierarchy().await,
            Self::Apple(d) => d.dump_hierarchy().await,
            Self::Game(d) => d.dump_hierarchy().await,
        }
    }

    /// Hierarchy plus foreground app and window size
    ///
    /// Fails with [`DeviceError::Unsupported`] on game targets; check
    /// [`supports`](Self::supports) first.
    pub async fn dump_hierarchy_extended(&self) -> Result<HierarchyDump> {
        match self {
            Self::Android(d) => d.dump_hierarchy_extended().await,
            Self::Apple(d) => d.dump_hierarchy_extended().await,
            Self::Game(_) => Err(DeviceError::Unsupported {
                platform: Platform::Game.name(),
                capability: Capability::ExtendedHierarchy,
            }),
        }
    }

    /// Raw vendor session
    pub fn device(&self) -> DeviceHandle<'_> {
        match self {
            Self::Android(d) => DeviceHandle::Android(d.device()),
            Self::Apple(d) => DeviceHandle::Apple(d.device()),
            Self::Game(d) => DeviceHandle::Game(d.device()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::any::Any;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
    use std::sync::Arc;

    pub(crate) const PAGE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<hierarchy rotation="0"><node class="android.widget.FrameLayout" package="com.android.settings" bounds="[0,0][1080,2400]" /></hierarchy>"#;

    fn blank(width: u32, height: u32) -> DynamicImage {
        DynamicImage::new_rgb8(width, height)
    }

    #[derive(Debug)]
    pub(crate) struct FakeAndroid {
        pub address: String,
    }

    #[async_trait]
    impl AndroidSession for FakeAndroid {
        async fn screenshot(&self) -> Result<DynamicImage> {
            Ok(blank(1080, 2400))
        }
        async fn dump_hierarchy(&self) -> Result<String> {
            Ok(PAGE_XML.to_string())
        }
        async fn app_current(&self) -> Result<ForegroundApp> {
            Ok(ForegroundApp {
                package: "com.android.settings".to_string(),
                activity: Some("com.android.settings.Settings".to_string()),
            })
        }
        async fn window_size(&self) -> Result<WindowSize> {
            Ok(WindowSize { width: 1080, height: 2400 })
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Scale is shared so tests can change it after connect
    #[derive(Debug)]
    pub(crate) struct FakeApple {
        pub address: String,
        pub scale_bits: Arc<AtomicU64>,
    }

    #[async_trait]
    impl AppleSession for FakeApple {
        async fn screenshot(&self) -> Result<DynamicImage> {
            Ok(blank(1170, 2532))
        }
        async fn source(&self) -> Result<Value> {
            Ok(json!({
                "type": "XCUIElementTypeApplication",
                "rect": {"x": 0, "y": 0, "width": 390, "height": 844},
                "children": [{"type": "XCUIElementTypeButton", "rect": {"x": 10, "y": 20, "width": 30, "height": 40}}]
            }))
        }
        async fn scale(&self) -> Result<f64> {
            Ok(f64::from_bits(self.scale_bits.load(Ordering::SeqCst)))
        }
        async fn window_size(&self) -> Result<WindowSize> {
            Ok(WindowSize { width: 390, height: 844 })
        }
        async fn active_app(&self) -> Result<ForegroundApp> {
            Ok(ForegroundApp {
                package: "com.apple.Preferences".to_string(),
                activity: None,
            })
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    pub(crate) struct FakeGame {
        pub address: String,
    }

    #[async_trait]
    impl GameSession for FakeGame {
        async fn screenshot(&self) -> Result<DynamicImage> {
            Ok(blank(720, 1280))
        }
        async fn dump_hierarchy(&self) -> Result<Value> {
            Ok(json!({"name": "<Root>", "payload": {"type": "Root"}}))
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Connector handing out fake sessions; addresses starting with
    /// `unreachable` fail like a dead vendor transport, as does everything
    /// once `fail_all` is set
    #[derive(Debug)]
    pub(crate) struct FakeConnector {
        pub opened: AtomicUsize,
        pub scale_bits: Arc<AtomicU64>,
        pub delay_ms: u64,
        pub fail_all: AtomicBool,
    }

    impl FakeConnector {
        pub fn new() -> Self {
            Self {
                opened: AtomicUsize::new(0),
                scale_bits: Arc::new(AtomicU64::new(3.0f64.to_bits())),
                delay_ms: 0,
                fail_all: AtomicBool::new(false),
            }
        }

        pub fn with_delay(delay_ms: u64) -> Self {
            Self {
                delay_ms,
                ..Self::new()
            }
        }

        pub fn set_scale(&self, scale: f64) {
            self.scale_bits.store(scale.to_bits(), Ordering::SeqCst);
        }

        pub fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }

        async fn open(&self, address: &str) -> Result<()> {
            if self.delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            }
            if address.starts_with("unreachable") || self.fail_all.load(Ordering::SeqCst) {
                return Err(DeviceError::ConnectionFailed {
                    address: address.to_string(),
                    reason: "Connection refused".to_string(),
                });
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl DeviceConnector for FakeConnector {
        async fn connect_android(&self, address: &str) -> Result<Box<dyn AndroidSession>> {
            self.open(address).await?;
            Ok(Box::new(FakeAndroid {
                address: address.to_string(),
            }))
        }

        async fn connect_apple(&self, address: &str) -> Result<Box<dyn AppleSession>> {
            self.open(address).await?;
            Ok(Box::new(FakeApple {
                address: address.to_string(),
                scale_bits: self.scale_bits.clone(),
            }))
        }

        async fn connect_game(&self, address: &str) -> Result<Box<dyn GameSession>> {
            self.open(address).await?;
            Ok(Box::new(FakeGame {
                address: address.to_string(),
            }))
        }
    }

    /// Address the vendor connector actually received
    pub(crate) fn vendor_address(adapter: &DeviceAdapter) -> String {
        match adapter.device() {
            DeviceHandle::Android(s) => {
                s.as_any().downcast_ref::<FakeAndroid>().unwrap().address.clone()
            }
            DeviceHandle::Apple(s) => {
                s.as_any().downcast_ref::<FakeApple>().unwrap().address.clone()
            }
            DeviceHandle::Game(s) => s.as_any().downcast_ref::<FakeGame>().unwrap().address.clone(),
        }
    }

    #[tokio::test]
    async fn test_variant_selection() {
        let connector = FakeConnector::new();

        let android = DeviceAdapter::connect(&connector, Platform::Android, "emulator-5554")
            .await
            .unwrap();
        assert_eq!(android.platform(), Platform::Android);

        let apple = DeviceAdapter::connect(&connector, Platform::Ios, "http://localhost:8100")
            .await
            .unwrap();
        assert_eq!(apple.platform(), Platform::Ios);

        let game = DeviceAdapter::connect(&connector, Platform::Game, "")
            .await
            .unwrap();
        assert_eq!(game.platform(), Platform::Game);
        assert_eq!(vendor_address(&game), "localhost");
    }

    #[tokio::test]
    async fn test_android_extended_dump() {
        let connector = FakeConnector::new();
        let adapter = DeviceAdapter::connect(&connector, Platform::Android, "")
            .await
            .unwrap();

        let dump = adapter.dump_hierarchy_extended().await.unwrap();
        assert_eq!(dump.xml_hierarchy.as_deref(), Some(PAGE_XML));
        assert_eq!(dump.json_hierarchy["_type"], "hierarchy");
        assert_eq!(dump.package_name.as_deref(), Some("com.android.settings"));
        assert_eq!(dump.activity.as_deref(), Some("com.android.settings.Settings"));
        assert_eq!(dump.window_size, WindowSize { width: 1080, height: 2400 });
        assert_eq!(dump.scale, None);

        let wire = serde_json::to_value(&dump).unwrap();
        assert!(wire.get("xmlHierarchy").is_some());
        assert!(wire.get("packageName").is_some());
        assert_eq!(wire["windowSize"]["width"], 1080);
    }

    #[tokio::test]
    async fn test_apple_scale_captured_once() {
        let connector = FakeConnector::new();
        let adapter = DeviceAdapter::connect(&connector, Platform::Ios, "wda")
            .await
            .unwrap();

        connector.set_scale(2.0);

        let dump = adapter.dump_hierarchy_extended().await.unwrap();
        assert_eq!(dump.scale, Some(3.0));
        assert_eq!(dump.window_size, WindowSize { width: 390, height: 844 });
        assert_eq!(dump.json_hierarchy["rect"]["width"].as_f64(), Some(1170.0));
        assert_eq!(
            dump.json_hierarchy["children"][0]["rect"]["x"].as_f64(),
            Some(30.0)
        );
        assert_eq!(dump.package_name.as_deref(), Some("com.apple.Preferences"));
    }

    #[tokio::test]
    async fn test_apple_rejects_zero_scale() {
        let connector = FakeConnector::new();
        connector.set_scale(0.0);
        let err = DeviceAdapter::connect(&connector, Platform::Ios, "wda")
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_game_extended_dump_unsupported() {
        let connector = FakeConnector::new();
        let adapter = DeviceAdapter::connect(&connector, Platform::Game, "localhost")
            .await
            .unwrap();

        assert!(!adapter.supports(Capability::ExtendedHierarchy));
        let err = adapter.dump_hierarchy_extended().await.unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Unsupported {
                platform: "game",
                capability: Capability::ExtendedHierarchy
            }
        ));

        let tree = adapter.dump_hierarchy().await.unwrap();
        assert_eq!(tree["name"], "<Root>");
    }

    #[tokio::test]
    async fn test_screenshot_passthrough() {
        let connector = FakeConnector::new();
        let adapter = DeviceAdapter::connect(&connector, Platform::Ios, "wda")
            .await
            .unwrap();
        let shot = adapter.screenshot().await.unwrap();
        assert_eq!((shot.width(), shot.height()), (1170, 2532));
    }

    #[test]
    fn test_capabilities_by_platform() {
        assert!(Capabilities::of(Platform::Android).supports(Capability::ExtendedHierarchy));
        assert!(Capabilities::of(Platform::Ios).supports(Capability::ExtendedHierarchy));
        assert!(!Capabilities::of(Platform::Game).supports(Capability::ExtendedHierarchy));
    }

    #[tokio::test]
    async fn test_connection_failure_propagates() {
        let connector = FakeConnector::new();
        let err = DeviceAdapter::connect(&connector, Platform::Android, "unreachable:5555")
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::ConnectionFailed { .. }));
        assert_eq!(connector.opened(), 0);
    }
}
