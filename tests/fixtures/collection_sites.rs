//! Real Las Vegas / Henderson locations for realistic test fixtures.
//!
//! Coordinates sourced from OpenStreetMap via Overpass API.

use fleet_router::model::{Coordinate, Stop};

/// A named site with coordinates.
#[derive(Debug, Clone)]
pub struct Site {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Site {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng).expect("fixture coordinates are valid")
    }

    pub fn stop(&self) -> Stop {
        Stop::new(self.name, self.coordinate())
    }
}

/// Driver start positions.
pub const DEPOTS: &[Site] = &[
    Site::new("Wynn Las Vegas", 36.1263781, -115.1658180),
    Site::new("MGM Grand", 36.1023654, -115.1688720),
    Site::new("Longhorn Casino", 36.1070664, -115.0591256),
];

pub const STRIP_SITES: &[Site] = &[
    Site::new("Hard Rock Cafe", 36.1041592, -115.1722166),
    Site::new("SW Steakhouse", 36.1262145, -115.1669146),
    Site::new("Public House", 36.1219193, -115.1689317),
    Site::new("Brooklyn Bowl", 36.1175388, -115.1695094),
    Site::new("Gordon Ramsay BurGR", 36.1107195, -115.1720818),
    Site::new("Spago by Wolfgang Puck", 36.1139368, -115.1741462),
    Site::new("Otto Pizzeria", 36.1231219, -115.1684514),
    Site::new("Bacchanal Buffet", 36.1159581, -115.1762929),
    Site::new("Il Fornaio", 36.1024474, -115.1740110),
    Site::new("Strip Steak", 36.0908722, -115.1776176),
];

pub const HENDERSON_SITES: &[Site] = &[
    Site::new("I Love Sushi Henderson", 35.9916660, -115.1028343),
    Site::new("Islander's Grill", 36.0335058, -114.9856162),
    Site::new("Naga", 36.0137634, -114.9928676),
    Site::new("RibCage", 35.9949754, -115.0999810),
    Site::new("Green Valley Ranch Area", 36.0308, -115.0825),
    Site::new("Sunset Station Area", 36.0614, -115.0631),
];

pub fn all_sites() -> Vec<Site> {
    STRIP_SITES.iter().chain(HENDERSON_SITES).cloned().collect()
}
