// Device recognition - static load signature catalog
//
// Recognition is a linear first-match scan in declaration order. Ranges may
// overlap, in which case the earlier entry shadows the later one.

use std::fmt::Write;

use serde::Serialize;

use crate::error::CalibrationError;

/// A known load signature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceProfile {
    pub min_current: f32,
    pub max_current: f32,
    pub typical_current: f32,
    pub name: String,
    /// Per-device weight applied to recognition confidence
    pub confidence_boost: f32,
}

impl DeviceProfile {
    pub fn new(min: f32, max: f32, typical: f32, name: &str, confidence_boost: f32) -> Self {
        Self {
            min_current: min,
            max_current: max,
            typical_current: typical,
            name: name.to_string(),
            confidence_boost,
        }
    }

    pub fn contains(&self, current_amps: f32) -> bool {
        current_amps >= self.min_current && current_amps <= self.max_current
    }

    /// `1 - |measured - typical| / (max - min)`
    pub fn match_quality(&self, current_amps: f32) -> f32 {
        let span = self.max_current - self.min_current;
        if span <= 0.0 {
            return 1.0;
        }
        1.0 - (current_amps - self.typical_current).abs() / span
    }
}

/// Result of scoring a reading against the catalog
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recognition {
    pub profile: DeviceProfile,
    pub match_quality: f32,
    pub confidence: f32,
    /// Confidence exceeded the acceptance threshold
    pub accepted: bool,
}

/// Device catalog; entries can be appended but never removed
#[derive(Debug, Clone)]
pub struct DeviceCatalog {
    profiles: Vec<DeviceProfile>,
}

impl DeviceCatalog {
    /// Catalog of common household loads
    pub fn stock() -> Self {
        Self {
            profiles: vec![
                DeviceProfile::new(0.4, 0.7, 0.5, "60W Incandescent Bulb", 1.2),
                DeviceProfile::new(0.8, 1.2, 1.0, "100W Incandescent Bulb", 1.2),
                DeviceProfile::new(4.0, 6.0, 5.0, "Hair Dryer Low Setting", 1.5),
                DeviceProfile::new(10.0, 15.0, 12.5, "Hair Dryer High Setting", 1.5),
                DeviceProfile::new(8.0, 12.0, 10.0, "Space Heater", 1.3),
                DeviceProfile::new(12.0, 16.0, 14.0, "Microwave Oven", 1.4),
                DeviceProfile::new(6.0, 10.0, 8.0, "Coffee Maker", 1.1),
                DeviceProfile::new(0.1, 0.3, 0.2, "LED Strip/Small Electronics", 0.8),
                DeviceProfile::new(2.0, 4.0, 3.0, "Laptop/Monitor", 0.9),
                DeviceProfile::new(0.02, 0.1, 0.05, "Phone Charger/Standby", 0.5),
            ],
        }
    }

    pub fn profiles(&self) -> &[DeviceProfile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// First profile whose range contains `current_amps`
    pub fn recognize(&self, current_amps: f32) -> Option<&DeviceProfile> {
        self.profiles.iter().find(|p| p.contains(current_amps))
    }

    /// Score a reading; `None` when no profile matches
    pub fn assess(&self, current_amps: f32, sensitivity: f32, threshold: f32) -> Option<Recognition> {
        let profile = self.recognize(current_amps)?;
        let match_quality = profile.match_quality(current_amps);
        let confidence = match_quality * profile.confidence_boost * sensitivity;
        Some(Recognition {
            profile: profile.clone(),
            match_quality,
            confidence,
            accepted: confidence > threshold,
        })
    }

    /// Append a user-defined profile with neutral confidence boost
    pub fn add_custom(
        &mut self,
        min: f32,
        max: f32,
        typical: f32,
        name: &str,
    ) -> Result<(), CalibrationError> {
        if !(min.is_finite() && max.is_finite()) || min < 0.0 || max <= min {
            return Err(CalibrationError::InvalidParameter {
                name: "profile_range",
                value: max - min,
            });
        }
        if !(min..=max).contains(&typical) {
            return Err(CalibrationError::InvalidParameter {
                name: "typical_current",
                value: typical,
            });
        }

        self.profiles
            .push(DeviceProfile::new(min, max, typical, name, 1.0));
        log::info!(
            "[Recognition] Added custom device '{}' ({:.2}-{:.2}A, typ {:.2}A)",
            name,
            min,
            max,
            typical
        );
        Ok(())
    }

    /// Human-readable listing, one profile per line
    pub fn listing(&self) -> String {
        let mut out = String::from("Known devices:\n");
        for p in &self.profiles {
            let _ = writeln!(
                out,
                "  {}: {:.1}-{:.1}A (typ: {:.1}A)",
                p.name, p.min_current, p.max_current, p.typical_current
            );
        }
        out
    }
}

impl Default for DeviceCatalog {
    fn default() -> Self {
        Self::stock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_in_declaration_order() {
        let catalog = DeviceCatalog::stock();
        let profile = catalog.recognize(5.5).unwrap();
        assert_eq!(profile.name, "Hair Dryer Low Setting");
        assert!((profile.match_quality(5.5) - 0.75).abs() < 1e-6);

        // 12.0 sits in Hair Dryer High, Space Heater and Microwave; the first wins
        assert_eq!(catalog.recognize(12.0).unwrap().name, "Hair Dryer High Setting");
    }

    #[test]
    fn test_no_match_outside_all_ranges() {
        let catalog = DeviceCatalog::stock();
        assert!(catalog.recognize(1.5).is_none());
        assert!(catalog.recognize(50.0).is_none());
        assert!(catalog.assess(1.5, 0.7, 0.9).is_none());
    }

    #[test]
    fn test_confidence_gating() {
        let catalog = DeviceCatalog::stock();

        let exact = catalog.assess(5.0, 0.7, 0.9).unwrap();
        assert!((exact.match_quality - 1.0).abs() < 1e-6);
        assert!((exact.confidence - 1.05).abs() < 1e-5);
        assert!(exact.accepted);

        let off = catalog.assess(5.5, 0.7, 0.9).unwrap();
        assert!((off.confidence - 0.7875).abs() < 1e-5);
        assert!(!off.accepted);
    }

    #[test]
    fn test_add_custom_profile_appends() {
        let mut catalog = DeviceCatalog::stock();
        let before = catalog.len();
        catalog.add_custom(20.0, 25.0, 22.0, "Welder").unwrap();
        assert_eq!(catalog.len(), before + 1);

        let welder = catalog.recognize(22.0).unwrap();
        assert_eq!(welder.name, "Welder");
        assert_eq!(welder.confidence_boost, 1.0);
    }

    #[test]
    fn test_add_custom_profile_rejects_bad_ranges() {
        let mut catalog = DeviceCatalog::stock();
        assert!(catalog.add_custom(5.0, 4.0, 4.5, "Backwards").is_err());
        assert!(catalog.add_custom(1.0, 2.0, 3.0, "Outside").is_err());
        assert_eq!(catalog.len(), DeviceCatalog::stock().len());
    }

    #[test]
    fn test_listing_format() {
        let listing = DeviceCatalog::stock().listing();
        assert!(listing.starts_with("Known devices:\n"));
        assert!(listing.contains("  Hair Dryer Low Setting: 4.0-6.0A (typ: 5.0A)\n"));
        assert_eq!(listing.lines().count(), 11);
    }
}
