//! Backend capability discovery.
//!
//! Capabilities are probed once when a service is initialized and are
//! read-only afterwards. An empty set means "unknown", not "notifications are
//! impossible": backends that cannot report capabilities (the macOS script
//! backend) still display notifications.

use bitflags::bitflags;

bitflags! {
    /// Features supported by the active notification backend.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u32 {
        /// Body text is displayed.
        const BODY_TEXT = 1 << 0;
        /// Images inside the body are displayed.
        const BODY_IMAGES = 1 << 1;
        /// Markup inside the body is rendered.
        const BODY_MARKUP = 1 << 2;
        /// Sounds can be played.
        const AUDIO = 1 << 3;
        /// An application icon is displayed.
        const ICON = 1 << 4;
    }
}

/// Freedesktop capability names and the bits they map to.
const SERVER_CAPABILITY_TABLE: &[(&str, Capabilities)] = &[
    ("body", Capabilities::BODY_TEXT),
    ("body-images", Capabilities::BODY_IMAGES),
    ("body-markup", Capabilities::BODY_MARKUP),
    ("sound", Capabilities::AUDIO),
    ("icon", Capabilities::ICON),
    ("icon-static", Capabilities::ICON),
];

impl Capabilities {
    /// Map capability names reported by a notification server to bits.
    ///
    /// Unrecognized names are ignored.
    pub fn from_server_capabilities<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .filter_map(|name| {
                SERVER_CAPABILITY_TABLE
                    .iter()
                    .find(|(key, _)| *key == name.as_ref())
                    .map(|(_, bit)| *bit)
            })
            .fold(Capabilities::empty(), |acc, bit| acc | bit)
    }

    /// The fixed set reported by Windows toast notifications.
    pub fn toast() -> Self {
        Capabilities::BODY_TEXT | Capabilities::BODY_IMAGES | Capabilities::ICON | Capabilities::AUDIO
    }

    /// Returns true if nothing is known about the backend.
    pub fn is_unknown(&self) -> bool {
        self.is_empty()
    }
}
