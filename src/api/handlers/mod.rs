//! REST endpoint handlers organized by resource.

pub mod resource;
pub mod system;

use axum::Router;

use crate::app_state::AppState;
use crate::models::{
    Anamnesis, Answer, Clinic, Desk, Document, Holiday, License, LicenseUser, Log, Patient,
    Payment, Permission, Plan, PlanTreatment, Profile, Question, Scheduler, Specialty, Treatment,
    TreatmentPatient, Urgency,
};

/// Composes all resource routes under `/api/v1`.
///
/// Users and tokens are not exposed: their writes need password hashing
/// and token issuance that belong to the host application.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(resource::routes::<Clinic>("clinic"))
        .merge(resource::routes::<License>("clinic"))
        .merge(resource::routes::<LicenseUser>("clinic"))
        .merge(resource::routes::<Payment>("clinic"))
        .merge(resource::routes::<Desk>("clinic"))
        .merge(resource::routes::<Scheduler>("clinic"))
        .merge(resource::routes::<Holiday>("clinic"))
        .merge(resource::routes::<Profile>("auth"))
        .merge(resource::routes::<Permission>("auth"))
        .merge(resource::routes::<Patient>("care"))
        .merge(resource::routes::<Document>("care"))
        .merge(resource::routes::<Treatment>("care"))
        .merge(resource::routes::<TreatmentPatient>("care"))
        .merge(resource::routes::<Urgency>("care"))
        .merge(resource::routes::<Anamnesis>("care"))
        .merge(resource::routes::<Question>("care"))
        .merge(resource::routes::<Answer>("care"))
        .merge(resource::routes::<Plan>("care"))
        .merge(resource::routes::<Specialty>("care"))
        .merge(resource::routes::<PlanTreatment>("care"))
        .merge(resource::read_only_routes::<Log>("auth"))
}
