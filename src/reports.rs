//! Listing and report forms. Each draft is checked before anything is written.
use crate::error::{AppError, AppResult};
use crate::geo::LatLng;
use crate::models::animal::{
    AnimalStatus, AnimalUpdate, NewAnimal, Photos, Sex, Size, Species, UNKNOWN_AGE, format_age,
};
use std::collections::HashMap;

pub const MISSING_PHOTO: &str = "Por favor sube una foto de la mascota.";
pub const MISSING_LOCATION: &str = "Por favor marca la ubicación en el mapa.";
pub const MISSING_SIGHTING_LOCATION: &str = "Por favor marca dónde viste a la mascota.";
pub const SIGHTING_NAME: &str = "Avistamiento";
pub const SIGHTING_PREFIX: &str = "AVISTAMIENTO: ";

fn field(form: &HashMap<String, String>, key: &str) -> Option<String> {
    form.get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn text(form: &HashMap<String, String>, key: &str) -> String {
    field(form, key).unwrap_or_default()
}

fn number(form: &HashMap<String, String>, key: &str) -> u32 {
    field(form, key).and_then(|v| v.parse().ok()).unwrap_or(0)
}

fn required(value: &str, message: &str) -> AppResult<()> {
    if value.is_empty() {
        return Err(AppError::Validation(message.to_string()));
    }
    Ok(())
}

/// `lat`/`lng` form fields. Both blank means no pin was dropped.
fn location(form: &HashMap<String, String>, missing: &str) -> AppResult<LatLng> {
    match (field(form, "lat"), field(form, "lng")) {
        (Some(lat), Some(lng)) => LatLng::parse(&lat, &lng)
            .map_err(|_| AppError::Validation("La ubicación marcada no es válida.".into())),
        _ => Err(AppError::Validation(missing.to_string())),
    }
}

/// New adoption listing.
#[derive(Clone, Debug, Default)]
pub struct AdoptionDraft {
    pub name: String,
    pub species: Option<Species>,
    pub breed: String,
    pub sex: Option<Sex>,
    pub age_years: u32,
    pub age_months: u32,
    pub size: Option<Size>,
    pub description: String,
    pub medical_notes: String,
    pub photo_url: Option<String>,
}

impl AdoptionDraft {
    pub fn from_form(form: &HashMap<String, String>) -> Self {
        AdoptionDraft {
            name: text(form, "name"),
            species: field(form, "species").and_then(|v| Species::parse(&v)),
            breed: text(form, "breed"),
            sex: field(form, "sex").and_then(|v| Sex::parse(&v)),
            age_years: number(form, "age_years"),
            age_months: number(form, "age_months"),
            size: field(form, "size").and_then(|v| Size::parse(&v)),
            description: text(form, "description"),
            medical_notes: text(form, "medical_notes"),
            photo_url: field(form, "photo_url"),
        }
    }

    pub fn validate(self, owner_id: &str) -> AppResult<NewAnimal> {
        required(&self.name, "El nombre es obligatorio.")?;
        let photo = self
            .photo_url
            .ok_or_else(|| AppError::Validation(MISSING_PHOTO.into()))?;

        let mut age = format_age(self.age_years, self.age_months);
        if age.is_empty() {
            age = UNKNOWN_AGE.to_string();
        }

        Ok(NewAnimal {
            name: self.name,
            species: self.species.unwrap_or(Species::Dog),
            breed: self.breed,
            sex: self.sex.unwrap_or(Sex::Unknown),
            age_approx: age,
            size: Some(self.size.unwrap_or(Size::Medium)),
            description: self.description,
            medical_notes: self.medical_notes,
            photos: Photos(vec![photo]),
            status: AnimalStatus::Adoptable,
            last_seen: None,
            owner_id: Some(owner_id.to_string()),
            shelter_id: None,
        })
    }
}

/// "I lost my pet" report.
#[derive(Clone, Debug, Default)]
pub struct LostReportDraft {
    pub name: String,
    pub species: Option<Species>,
    pub breed: String,
    pub sex: Option<Sex>,
    pub description: String,
    pub photo_url: Option<String>,
    pub form: HashMap<String, String>,
}

impl LostReportDraft {
    pub fn from_form(form: &HashMap<String, String>) -> Self {
        LostReportDraft {
            name: text(form, "name"),
            species: field(form, "species").and_then(|v| Species::parse(&v)),
            breed: text(form, "breed"),
            sex: field(form, "sex").and_then(|v| Sex::parse(&v)),
            description: text(form, "description"),
            photo_url: field(form, "photo_url"),
            form: form.clone(),
        }
    }

    pub fn validate(self, owner_id: &str) -> AppResult<NewAnimal> {
        required(&self.name, "El nombre es obligatorio.")?;
        required(&self.description, "Describe la situación de la mascota.")?;
        let photo = self
            .photo_url
            .ok_or_else(|| AppError::Validation(MISSING_PHOTO.into()))?;
        let at = location(&self.form, MISSING_LOCATION)?;

        Ok(NewAnimal {
            name: self.name,
            species: self.species.unwrap_or(Species::Dog),
            breed: self.breed,
            sex: self.sex.unwrap_or(Sex::Unknown),
            age_approx: String::new(),
            size: None,
            description: self.description,
            medical_notes: String::new(),
            photos: Photos(vec![photo]),
            status: AnimalStatus::Lost,
            last_seen: Some((at.lat, at.lng)),
            owner_id: Some(owner_id.to_string()),
            shelter_id: None,
        })
    }
}

/// "I saw a pet" sighting. The photo is optional; the location is not.
#[derive(Clone, Debug, Default)]
pub struct SightingDraft {
    pub species: Option<Species>,
    pub description: String,
    pub photo_url: Option<String>,
    pub form: HashMap<String, String>,
}

impl SightingDraft {
    pub fn from_form(form: &HashMap<String, String>) -> Self {
        SightingDraft {
            species: field(form, "species").and_then(|v| Species::parse(&v)),
            description: text(form, "description"),
            photo_url: field(form, "photo_url"),
            form: form.clone(),
        }
    }

    pub fn validate(self, reporter_id: &str) -> AppResult<NewAnimal> {
        let at = location(&self.form, MISSING_SIGHTING_LOCATION)?;
        Ok(NewAnimal {
            name: SIGHTING_NAME.to_string(),
            species: self.species.unwrap_or(Species::Dog),
            breed: String::new(),
            sex: Sex::Unknown,
            age_approx: String::new(),
            size: None,
            description: format!("{}{}", SIGHTING_PREFIX, self.description),
            medical_notes: String::new(),
            photos: Photos(self.photo_url.into_iter().collect()),
            status: AnimalStatus::Found,
            last_seen: Some((at.lat, at.lng)),
            owner_id: Some(reporter_id.to_string()),
            shelter_id: None,
        })
    }
}

/// Edit form. Only keys present in the submitted form become part of the update.
#[derive(Clone, Debug, Default)]
pub struct EditDraft {
    form: HashMap<String, String>,
}

impl EditDraft {
    pub fn from_form(form: &HashMap<String, String>) -> Self {
        EditDraft { form: form.clone() }
    }

    fn present(&self, key: &str) -> Option<String> {
        self.form.get(key).map(|v| v.trim().to_string())
    }

    pub fn validate(&self, current_status: AnimalStatus) -> AppResult<AnimalUpdate> {
        let name = self.present("name");
        if name.as_deref() == Some("") {
            return Err(AppError::Validation("El nombre es obligatorio.".into()));
        }

        let age_approx = if self.form.contains_key("age_years") || self.form.contains_key("age_months") {
            let age = format_age(number(&self.form, "age_years"), number(&self.form, "age_months"));
            Some(if age.is_empty() && current_status == AnimalStatus::Adoptable {
                UNKNOWN_AGE.to_string()
            } else {
                age
            })
        } else {
            None
        };

        let last_seen = match (field(&self.form, "lat"), field(&self.form, "lng")) {
            (Some(lat), Some(lng)) => {
                let at = LatLng::parse(&lat, &lng).map_err(|_| {
                    AppError::Validation("La ubicación marcada no es válida.".into())
                })?;
                Some((at.lat, at.lng))
            }
            _ => None,
        };

        Ok(AnimalUpdate {
            name,
            species: self.present("species").and_then(|v| Species::parse(&v)),
            breed: self.present("breed"),
            sex: self.present("sex").and_then(|v| Sex::parse(&v)),
            age_approx,
            size: self.present("size").and_then(|v| Size::parse(&v)),
            description: self.present("description"),
            medical_notes: self.present("medical_notes"),
            photos: field(&self.form, "photo_url").map(|url| Photos(vec![url])),
            status: None,
            last_seen,
        })
    }
}
