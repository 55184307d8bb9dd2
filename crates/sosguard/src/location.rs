//! Location snapshots attached to an alert session.
//!
//! A location is captured once when the session is armed and reused on every
//! dispatch; the controller never re-queries the provider mid-session.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A coordinate pair with an optional human-readable label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Place name, e.g. a city.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Location {
    /// Create a location, checking that the coordinates are in range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLocation`] if latitude is outside `[-90, 90]`
    /// or longitude is outside `[-180, 180]`.
    pub fn new(latitude: f64, longitude: f64, label: Option<String>) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::InvalidLocation {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
            label,
        })
    }

    /// A map link recipients can open on any phone.
    #[must_use]
    pub fn maps_url(&self) -> String {
        format!(
            "https://maps.google.com/?q={},{}",
            self.latitude, self.longitude
        )
    }

    /// Text for sharing this location by hand, e.g. via the clipboard.
    #[must_use]
    pub fn share_text(&self) -> String {
        format!("Emergency location: {}", self.maps_url())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(
                f,
                "{label} ({:.5}, {:.5})",
                self.latitude, self.longitude
            ),
            None => write!(f, "{:.5}, {:.5}", self.latitude, self.longitude),
        }
    }
}

/// A source of the device's current position.
#[async_trait::async_trait]
pub trait LocationProvider: Send + Sync {
    /// Return the current position, or `None` if it is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying positioning service fails.
    async fn current_location(&self) -> Result<Option<Location>>;
}

/// A provider that always reports the same (possibly absent) location.
#[derive(Debug, Clone, Default)]
pub struct StaticLocation {
    location: Option<Location>,
}

impl StaticLocation {
    /// Create a provider for a fixed location.
    #[must_use]
    pub fn new(location: Option<Location>) -> Self {
        Self { location }
    }
}

#[async_trait::async_trait]
impl LocationProvider for StaticLocation {
    async fn current_location(&self) -> Result<Option<Location>> {
        Ok(self.location.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_new_valid() {
        let loc = Location::new(9.9312, 76.2673, Some("Kochi".to_string())).unwrap();
        assert_eq!(loc.label.as_deref(), Some("Kochi"));
    }

    #[test]
    fn test_location_new_out_of_range() {
        assert!(Location::new(90.5, 0.0, None).is_err());
        assert!(Location::new(0.0, -180.5, None).is_err());
        assert!(Location::new(-90.0, 180.0, None).is_ok());
    }

    #[test]
    fn test_location_display() {
        let loc = Location::new(9.9312, 76.2673, None).unwrap();
        assert_eq!(loc.to_string(), "9.93120, 76.26730");

        let labelled = Location::new(9.9312, 76.2673, Some("Kochi".to_string())).unwrap();
        assert_eq!(labelled.to_string(), "Kochi (9.93120, 76.26730)");
    }

    #[test]
    fn test_maps_url() {
        let loc = Location::new(9.9312, -76.2673, Some("Kochi".to_string())).unwrap();
        assert_eq!(loc.maps_url(), "https://maps.google.com/?q=9.9312,-76.2673");
        assert_eq!(
            loc.share_text(),
            "Emergency location: https://maps.google.com/?q=9.9312,-76.2673"
        );
    }

    #[test]
    fn test_location_serialization_skips_missing_label() {
        let loc = Location::new(1.0, 2.0, None).unwrap();
        let json = serde_json::to_string(&loc).unwrap();
        assert!(!json.contains("label"));
    }

    #[tokio::test]
    async fn test_static_location_provider() {
        let provider = StaticLocation::new(Some(Location::new(1.0, 2.0, None).unwrap()));
        let loc = provider.current_location().await.unwrap();
        assert_eq!(loc.map(|l| l.latitude), Some(1.0));

        let empty = StaticLocation::default();
        assert!(empty.current_location().await.unwrap().is_none());
    }
}
