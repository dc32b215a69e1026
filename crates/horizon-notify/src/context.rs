//! Application identity presented to the OS notification subsystem.

use std::path::{Path, PathBuf};

use crate::error::{NotificationError, Result};

/// Identifies the calling application.
///
/// Created once per process and shared read-only by the service and its
/// backend. Registering the AppUserModelID with Windows (Start-Menu shortcut)
/// is left to the application's installer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationContext {
    name: String,
    icon: Option<PathBuf>,
    app_user_model_id: Option<String>,
}

impl ApplicationContext {
    /// Create a context with an explicit application name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: None,
            app_user_model_id: None,
        }
    }

    /// Derive the context from the running executable's file name.
    pub fn from_current_process() -> Result<Self> {
        let exe = std::env::current_exe()
            .map_err(|e| NotificationError::Context(format!("no valid process module: {e}")))?;
        Self::from_executable_path(&exe)
    }

    fn from_executable_path(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| {
                NotificationError::Context(format!(
                    "cannot derive an application name from {}",
                    path.display()
                ))
            })?;
        Ok(Self::new(name))
    }

    /// Set the icon shown by the freedesktop backend.
    pub fn with_icon(mut self, icon: impl Into<PathBuf>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Set the AppUserModelID used by the Windows backend.
    pub fn with_app_user_model_id(mut self, aumid: impl Into<String>) -> Self {
        self.app_user_model_id = Some(aumid.into());
        self
    }

    /// The application name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The application icon, if any.
    pub fn icon(&self) -> Option<&Path> {
        self.icon.as_deref()
    }

    /// The AppUserModelID, falling back to the application name.
    pub fn app_user_model_id(&self) -> &str {
        self.app_user_model_id.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let context = ApplicationContext::new("Mailer")
            .with_icon("/usr/share/icons/mailer.png")
            .with_app_user_model_id("Horizon.Mailer");

        assert_eq!(context.name(), "Mailer");
        assert_eq!(context.icon(), Some(Path::new("/usr/share/icons/mailer.png")));
        assert_eq!(context.app_user_model_id(), "Horizon.Mailer");
    }

    #[test]
    fn test_aumid_falls_back_to_name() {
        let context = ApplicationContext::new("Mailer");
        assert_eq!(context.app_user_model_id(), "Mailer");
        assert!(context.icon().is_none());
    }

    #[test]
    fn test_from_executable_path() {
        let context =
            ApplicationContext::from_executable_path(Path::new("/opt/mailer/bin/mailer.exe"))
                .unwrap();
        assert_eq!(context.name(), "mailer");

        assert!(ApplicationContext::from_executable_path(Path::new("/")).is_err());
    }

    #[test]
    fn test_from_current_process() {
        let context = ApplicationContext::from_current_process().unwrap();
        assert!(!context.name().is_empty());
    }
}
