//! Platform notification backends.
//!
//! One [`NotificationTransport`](crate::NotificationTransport) per platform,
//! selected at compile time:
//!
//! | Platform | Transport | Handle |
//! |----------|-----------|--------|
//! | Linux | [`FreedesktopTransport`](linux::FreedesktopTransport) | daemon `u32` id |
//! | Windows | [`ToastTransport`](windows::ToastTransport) | synthetic toast handle |
//! | macOS | [`AppleScriptTransport`](macos::AppleScriptTransport) | none (untracked) |
//! | other | [`UnsupportedTransport`](unsupported::UnsupportedTransport) | none |
//!
//! The payload encoders ([`freedesktop`], [`toast_xml`], [`applescript`]) are
//! compiled on every platform.

pub mod applescript;
pub mod freedesktop;
pub mod toast_xml;
pub mod unsupported;

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(target_os = "macos")]
pub mod macos;
#[cfg(target_os = "windows")]
pub mod windows;

use horizon_notify_core::AsyncSpawner;

use crate::context::ApplicationContext;

/// The transport for the platform this crate is compiled for.
#[cfg(target_os = "linux")]
pub type PlatformTransport = linux::FreedesktopTransport;
/// The transport for the platform this crate is compiled for.
#[cfg(target_os = "windows")]
pub type PlatformTransport = windows::ToastTransport;
/// The transport for the platform this crate is compiled for.
#[cfg(target_os = "macos")]
pub type PlatformTransport = macos::AppleScriptTransport;
/// The transport for the platform this crate is compiled for.
#[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
pub type PlatformTransport = unsupported::UnsupportedTransport;

/// Create the platform transport for an application.
///
/// Backends that forward events from their own tasks spawn them on `spawner`.
#[cfg(target_os = "linux")]
pub fn platform_transport(
    _context: &ApplicationContext,
    spawner: AsyncSpawner,
) -> PlatformTransport {
    linux::FreedesktopTransport::new().with_spawner(spawner)
}

/// Create the platform transport for an application.
#[cfg(target_os = "windows")]
pub fn platform_transport(
    context: &ApplicationContext,
    _spawner: AsyncSpawner,
) -> PlatformTransport {
    windows::ToastTransport::new(context.app_user_model_id())
}

/// Create the platform transport for an application.
#[cfg(not(any(target_os = "linux", target_os = "windows")))]
pub fn platform_transport(
    _context: &ApplicationContext,
    _spawner: AsyncSpawner,
) -> PlatformTransport {
    PlatformTransport::new()
}
