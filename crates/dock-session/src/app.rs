//! App descriptors and device classes

use dock_surface::{ChromeOptions, NativeAppLink};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::Result;

/// A web app the shell can open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDescriptor {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub accent_color: Option<String>,
    #[serde(default)]
    pub icon_ref: Option<String>,
    /// Installed client preferred over the web app, if any
    #[serde(default)]
    pub native: Option<NativeAppLink>,
}

impl AppDescriptor {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            url: url.into(),
            accent_color: None,
            icon_ref: None,
            native: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_accent_color(mut self, color: impl Into<String>) -> Self {
        self.accent_color = Some(color.into());
        self
    }

    pub fn with_icon(mut self, icon_ref: impl Into<String>) -> Self {
        self.icon_ref = Some(icon_ref.into());
        self
    }

    pub fn with_native(mut self, link: NativeAppLink) -> Self {
        self.native = Some(link);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(SessionError::EmptyAppId);
        }
        if self.url.trim().is_empty() {
            return Err(SessionError::InvalidUrl("URL cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Surface presentation for a session: title bar plus accent color
pub(crate) fn chrome_for(title: &str, accent_color: Option<&str>) -> ChromeOptions {
    ChromeOptions::titled(title, accent_color.map(str::to_string))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    #[default]
    Phone,
    Tablet,
}

impl DeviceClass {
    pub fn from_is_tablet(is_tablet: bool) -> Self {
        if is_tablet {
            DeviceClass::Tablet
        } else {
            DeviceClass::Phone
        }
    }

    /// Resident sessions allowed at once
    pub fn capacity(&self) -> usize {
        match self {
            DeviceClass::Phone => 3,
            DeviceClass::Tablet => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Phone => "phone",
            DeviceClass::Tablet => "tablet",
        }
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(AppDescriptor::new("moodle", "https://lms.test").validate().is_ok());
        assert!(matches!(
            AppDescriptor::new(" ", "https://lms.test").validate(),
            Err(SessionError::EmptyAppId)
        ));
        assert!(matches!(
            AppDescriptor::new("moodle", "").validate(),
            Err(SessionError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_device_capacity() {
        assert_eq!(DeviceClass::from_is_tablet(false).capacity(), 3);
        assert_eq!(DeviceClass::from_is_tablet(true).capacity(), 5);
        assert!(DeviceClass::Tablet.capacity() > DeviceClass::Phone.capacity());
    }

    #[test]
    fn test_descriptor_from_json() {
        let app: AppDescriptor = serde_json::from_str(
            r##"{"id":"teams","url":"https://teams.test","accentColor":"#6264a7"}"##,
        )
        .unwrap();
        assert_eq!(app.accent_color.as_deref(), Some("#6264a7"));
        assert!(app.native.is_none());
    }
}
