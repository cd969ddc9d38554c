//! Lost/found map: pins and the initial viewport handed to the maps SDK.
use crate::error::{AppError, AppResult};
use crate::models::animal::{Animal, AnimalStatus, Species};
use serde::Serialize;

/// Center of Mendoza, Argentina.
pub const DEFAULT_CENTER: LatLng = LatLng {
    lat: -32.8895,
    lng: -68.8458,
};
pub const DEFAULT_ZOOM: u8 = 12;
pub const SINGLE_PIN_ZOOM: u8 = 14;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Parse form fields into a coordinate. Both must be present and in range.
    pub fn parse(lat: &str, lng: &str) -> AppResult<LatLng> {
        let parse = |v: &str| v.trim().parse::<f64>().ok().filter(|x| x.is_finite());
        let (Some(lat), Some(lng)) = (parse(lat), parse(lng)) else {
            return Err(AppError::InvalidInput("Coordenadas inválidas.".into()));
        };
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(AppError::InvalidInput("Coordenadas fuera de rango.".into()));
        }
        Ok(LatLng { lat, lng })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn from_point(p: LatLng) -> Self {
        Bounds {
            south: p.lat,
            west: p.lng,
            north: p.lat,
            east: p.lng,
        }
    }

    pub fn extend(&mut self, p: LatLng) {
        self.south = self.south.min(p.lat);
        self.north = self.north.max(p.lat);
        self.west = self.west.min(p.lng);
        self.east = self.east.max(p.lng);
    }

    pub fn center(&self) -> LatLng {
        LatLng {
            lat: (self.south + self.north) / 2.0,
            lng: (self.west + self.east) / 2.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MapPin {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub photo: Option<String>,
    pub status: AnimalStatus,
    pub species: Species,
    pub description: String,
    pub color: &'static str,
}

impl MapPin {
    /// Only lost/found animals with both coordinates become pins.
    pub fn from_animal(animal: &Animal) -> Option<MapPin> {
        if !matches!(animal.status, AnimalStatus::Lost | AnimalStatus::Found) {
            return None;
        }
        let (lat, lng) = (animal.last_seen_lat?, animal.last_seen_long?);
        Some(MapPin {
            id: animal.id.clone(),
            name: animal.name.clone(),
            lat,
            lng,
            photo: animal.photos.first().map(str::to_string),
            status: animal.status,
            species: animal.species,
            description: animal.description.clone(),
            color: pin_color(animal.status),
        })
    }

    pub fn position(&self) -> LatLng {
        LatLng {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

pub fn pin_color(status: AnimalStatus) -> &'static str {
    match status {
        AnimalStatus::Found => "#3b82f6",
        _ => "#fb3c46",
    }
}

/// Initial viewport for the map.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum MapView {
    Center { center: LatLng, zoom: u8 },
    Fit { bounds: Bounds },
}

impl MapView {
    /// No pins: the city at zoom 12. One pin: that pin at zoom 14.
    /// Several: bounds starting at the city center and covering every pin.
    pub fn fit(pins: &[MapPin]) -> MapView {
        match pins {
            [] => MapView::Center {
                center: DEFAULT_CENTER,
                zoom: DEFAULT_ZOOM,
            },
            [only] => MapView::Center {
                center: only.position(),
                zoom: SINGLE_PIN_ZOOM,
            },
            many => {
                let mut bounds = Bounds::from_point(DEFAULT_CENTER);
                for pin in many {
                    bounds.extend(pin.position());
                }
                MapView::Fit { bounds }
            }
        }
    }
}
