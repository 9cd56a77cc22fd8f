use crate::modules::catalog::domain::entities::{Country, Location, Province};
use crate::schema::{countries, locations, provinces};
use diesel::prelude::*;

// ================== COUNTRY MODELS ==================

/// DB row model (read)
#[derive(Queryable, Identifiable, Debug, Clone)]
#[diesel(table_name = countries)]
pub struct CountryModel {
    pub id: i32,
    pub country: String,
}

/// Insert payload (write)
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = countries)]
pub struct NewCountryRow {
    pub country: String,
}

impl From<CountryModel> for Country {
    fn from(model: CountryModel) -> Self {
        Country {
            id: model.id,
            name: model.country,
        }
    }
}

// ================== PROVINCE MODELS ==================

/// DB row model (read)
#[derive(Queryable, Identifiable, Associations, Debug, Clone)]
#[diesel(table_name = provinces)]
#[diesel(belongs_to(CountryModel, foreign_key = country_id))]
pub struct ProvinceModel {
    pub id: i32,
    pub province: String,
    pub country_id: i32,
}

/// Insert payload (write)
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = provinces)]
pub struct NewProvinceRow {
    pub province: String,
    pub country_id: i32,
}

impl From<ProvinceModel> for Province {
    fn from(model: ProvinceModel) -> Self {
        Province {
            id: model.id,
            name: model.province,
            country_id: model.country_id,
        }
    }
}

// ================== LOCATION MODELS ==================

/// DB row model (read)
#[derive(Queryable, Identifiable, Associations, Debug, Clone)]
#[diesel(table_name = locations)]
#[diesel(belongs_to(ProvinceModel, foreign_key = province_id))]
pub struct LocationModel {
    pub id: i32,
    pub location: String,
    pub mgrs: String,
    pub province_id: i32,
}

/// Insert payload (write)
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = locations)]
pub struct NewLocationRow {
    pub location: String,
    pub mgrs: String,
    pub province_id: i32,
}

impl From<LocationModel> for Location {
    fn from(model: LocationModel) -> Self {
        Location {
            id: model.id,
            name: model.location,
            mgrs: model.mgrs,
            province_id: model.province_id,
        }
    }
}
