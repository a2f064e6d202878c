//! Coordinate reference system identifiers and UTM zone detection.

use std::fmt;

use crate::error::{GeoError, Result};

/// Representation of a coordinate reference system.
///
/// A CRS is stored internally as a definition string which can be an EPSG
/// identifier (`"EPSG:4326"`) or any Proj4 or WKT definition understood by
/// PROJ. When created from an EPSG code the numeric value is retained.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Crs {
    definition: String,
    epsg: Option<u32>,
}

impl Crs {
    /// Creates a new CRS from the given EPSG code.
    pub fn from_epsg(code: u32) -> Self {
        Self {
            definition: format!("EPSG:{}", code),
            epsg: Some(code),
        }
    }

    /// Creates a CRS from a Proj4 or WKT definition string.
    pub fn from_definition(definition: &str) -> Self {
        Self {
            definition: definition.to_string(),
            epsg: None,
        }
    }

    /// Parses a user supplied code such as `"EPSG:32614"`, `"epsg:4326"` or
    /// `"32614"`. Proj4 (`+proj=...`) and WKT strings are accepted verbatim;
    /// whether PROJ knows the system is only checked when a transform is built.
    pub fn parse(code: &str) -> Result<Self> {
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(GeoError::Projection("empty CRS code".into()));
        }
        if trimmed.starts_with("+proj") || trimmed.contains('[') {
            return Ok(Self::from_definition(trimmed));
        }
        let digits = match trimmed.split_once(':') {
            Some((authority, rest)) if authority.eq_ignore_ascii_case("epsg") => rest.trim(),
            Some(_) => "",
            None => trimmed,
        };
        digits
            .parse::<u32>()
            .map(Self::from_epsg)
            .map_err(|_| GeoError::Projection(format!("unrecognised CRS code '{trimmed}'")))
    }

    /// Returns the EPSG code for this CRS, if available.
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Returns the underlying definition string.
    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Common global CRS definition: WGS84 (EPSG:4326).
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Common global CRS definition: Web Mercator (EPSG:3857).
    pub fn web_mercator() -> Self {
        Self::from_epsg(3857)
    }

    /// WGS84 / UTM for the given zone.
    pub fn utm(zone: UtmZone) -> Self {
        Self::from_epsg(zone.epsg())
    }

    /// `true` for longitude/latitude systems expressed in degrees.
    pub fn is_geographic(&self) -> bool {
        matches!(self.epsg, Some(4326) | Some(4269) | Some(4258) | Some(4617))
    }

    /// UTM zone encoded in the EPSG code (WGS84 326xx/327xx, NAD83 269xx).
    pub fn utm_zone(&self) -> Option<UtmZone> {
        let code = self.epsg?;
        let (number, north) = match code {
            32601..=32660 => (code - 32600, true),
            32701..=32760 => (code - 32700, false),
            26901..=26923 => (code - 26900, true),
            _ => return None,
        };
        Some(UtmZone {
            number: number as u8,
            north,
        })
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.definition)
    }
}

/// One of the 60 six-degree UTM longitude bands plus its hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct UtmZone {
    pub number: u8,
    pub north: bool,
}

impl UtmZone {
    /// Zone containing the given location. Longitude 180° folds into zone 60
    /// and the equator counts as northern.
    pub fn from_lon_lat(lon: f64, lat: f64) -> Self {
        let number = (((lon + 180.0) / 6.0).floor() as i64 + 1).clamp(1, 60) as u8;
        Self {
            number,
            north: lat >= 0.0,
        }
    }

    /// WGS84 / UTM EPSG code for this zone.
    pub fn epsg(&self) -> u32 {
        if self.north {
            32600 + self.number as u32
        } else {
            32700 + self.number as u32
        }
    }

    /// Central meridian in degrees.
    pub fn central_meridian(&self) -> f64 {
        -183.0 + 6.0 * self.number as f64
    }
}

impl fmt::Display for UtmZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.number, if self.north { 'N' } else { 'S' })
    }
}
