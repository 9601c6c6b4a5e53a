use axum::extract::Query;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::catalog::{find_specialty, hospitals, hospitals_for, specialties};
use crate::models::{Hospital, Specialty};

pub async fn get_specialties() -> Json<Vec<Specialty>> {
    Json(specialties())
}

#[derive(Deserialize)]
pub struct HospitalsQuery {
    pub specialty_id: Option<u32>,
}

pub async fn get_hospitals(
    Query(query): Query<HospitalsQuery>,
) -> Result<Json<Vec<Hospital>>, AppError> {
    let list = match query.specialty_id {
        Some(id) => {
            find_specialty(id).ok_or_else(|| AppError::NotFound(format!("specialty {id}")))?;
            hospitals_for(id)
        }
        None => hospitals(),
    };
    Ok(Json(list))
}
