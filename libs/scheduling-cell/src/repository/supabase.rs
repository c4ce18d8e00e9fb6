// libs/scheduling-cell/src/repository/supabase.rs
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentFilters, Availability, AvailabilityFilters, AvailabilityStatus,
    SchedulingError, TimeSlot,
};
use crate::repository::{AppointmentRepository, AvailabilityRepository};

fn representation_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

fn parse_rows<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, SchedulingError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| SchedulingError::RepositoryFailure(format!("Failed to parse rows: {}", e)))
}

pub struct SupabaseAvailabilityRepository {
    supabase: Arc<SupabaseClient>,
    service_token: Option<String>,
}

impl SupabaseAvailabilityRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            supabase,
            service_token: None,
        }
    }

    pub fn with_service_token(supabase: Arc<SupabaseClient>, token: impl Into<String>) -> Self {
        Self {
            supabase,
            service_token: Some(token.into()),
        }
    }

    fn token(&self) -> Option<&str> {
        self.service_token.as_deref()
    }
}

#[async_trait]
impl AvailabilityRepository for SupabaseAvailabilityRepository {
    async fn save(&self, availability: &Availability) -> Result<Availability, SchedulingError> {
        let body = serde_json::to_value(availability)
            .map_err(|e| SchedulingError::RepositoryFailure(e.to_string()))?;

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/availabilities",
                self.token(),
                Some(body),
                Some(representation_headers()),
            )
            .await
            .map_err(|e| SchedulingError::RepositoryFailure(e.to_string()))?;

        parse_rows::<Availability>(result)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                SchedulingError::RepositoryFailure("Failed to create availability".to_string())
            })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Availability>, SchedulingError> {
        let path = format!("/rest/v1/availabilities?availability_id=eq.{}", id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(|e| SchedulingError::RepositoryFailure(e.to_string()))?;

        Ok(parse_rows::<Availability>(result)?.into_iter().next())
    }

    async fn find_by_filters(
        &self,
        filters: &AvailabilityFilters,
    ) -> Result<Vec<Availability>, SchedulingError> {
        let mut query_parts = Vec::new();

        if let Some(doctor_id) = &filters.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", urlencoding::encode(doctor_id)));
        }
        if let Some(facility_id) = &filters.facility_id {
            query_parts.push(format!("facility_id=eq.{}", urlencoding::encode(facility_id)));
        }
        if let Some(service_type_id) = &filters.service_type_id {
            query_parts.push(format!(
                "service_type_id=eq.{}",
                urlencoding::encode(service_type_id)
            ));
        }
        if let Some(status) = filters.status {
            query_parts.push(format!("status=eq.{}", status));
        }

        query_parts.push("order=start_date_time.asc".to_string());
        let path = format!("/rest/v1/availabilities?{}", query_parts.join("&"));

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(|e| SchedulingError::RepositoryFailure(e.to_string()))?;

        parse_rows(result)
    }

    async fn update(
        &self,
        availability: &Availability,
    ) -> Result<Option<Availability>, SchedulingError> {
        let body = serde_json::to_value(availability)
            .map_err(|e| SchedulingError::RepositoryFailure(e.to_string()))?;

        let path = format!(
            "/rest/v1/availabilities?availability_id=eq.{}",
            availability.id
        );
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                self.token(),
                Some(body),
                Some(representation_headers()),
            )
            .await
            .map_err(|e| SchedulingError::RepositoryFailure(e.to_string()))?;

        Ok(parse_rows::<Availability>(result)?.into_iter().next())
    }

    async fn check_overlap(
        &self,
        doctor_id: &str,
        time_slot: &TimeSlot,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, SchedulingError> {
        // Narrow server-side to the doctor's non-cancelled slots, then apply
        // the pairwise half-open overlap test on the rows.
        let mut query_parts = vec![
            format!("doctor_id=eq.{}", urlencoding::encode(doctor_id)),
            format!("status=neq.{}", AvailabilityStatus::Cancelled),
        ];
        if let Some(exclude) = exclude_id {
            query_parts.push(format!("availability_id=neq.{}", exclude));
        }

        let path = format!("/rest/v1/availabilities?{}", query_parts.join("&"));
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(|e| SchedulingError::RepositoryFailure(e.to_string()))?;

        let existing = parse_rows::<Availability>(result)?;
        Ok(existing.iter().any(|a| a.time_slot.overlaps(time_slot)))
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: AvailabilityStatus,
        next: AvailabilityStatus,
    ) -> Result<Availability, SchedulingError> {
        expected.ensure_transition(next)?;

        // Conditional single-row update: the status filter is the
        // compare-and-set guard. PostgREST applies the PATCH only to rows
        // matching the WHERE, and `return=representation` echoes the rows it
        // touched; an empty echo means the guard failed.
        let path = format!(
            "/rest/v1/availabilities?availability_id=eq.{}&status=eq.{}",
            id, expected
        );
        let body = json!({ "status": next });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                self.token(),
                Some(body),
                Some(representation_headers()),
            )
            .await
            .map_err(|e| SchedulingError::RepositoryFailure(e.to_string()))?;

        if let Some(updated) = parse_rows::<Availability>(result)?.into_iter().next() {
            debug!("Availability {} transitioned {} -> {}", id, expected, next);
            return Ok(updated);
        }

        // Guard failed: distinguish a lost race from an unknown id.
        match self.find_by_id(id).await? {
            Some(current) => {
                warn!(
                    "Conditional update lost on availability {}: expected {}, found {}",
                    id, expected, current.status
                );
                Err(SchedulingError::SlotUnavailable)
            }
            None => Err(SchedulingError::AvailabilityNotFound),
        }
    }
}

pub struct SupabaseAppointmentRepository {
    supabase: Arc<SupabaseClient>,
    service_token: Option<String>,
}

impl SupabaseAppointmentRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            supabase,
            service_token: None,
        }
    }

    pub fn with_service_token(supabase: Arc<SupabaseClient>, token: impl Into<String>) -> Self {
        Self {
            supabase,
            service_token: Some(token.into()),
        }
    }

    fn token(&self) -> Option<&str> {
        self.service_token.as_deref()
    }
}

#[async_trait]
impl AppointmentRepository for SupabaseAppointmentRepository {
    async fn save(&self, appointment: &Appointment) -> Result<Appointment, SchedulingError> {
        let body = serde_json::to_value(appointment)
            .map_err(|e| SchedulingError::RepositoryFailure(e.to_string()))?;

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                self.token(),
                Some(body),
                Some(representation_headers()),
            )
            .await
            .map_err(|e| SchedulingError::RepositoryFailure(e.to_string()))?;

        parse_rows::<Appointment>(result)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                SchedulingError::RepositoryFailure("Failed to create appointment".to_string())
            })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        let path = format!("/rest/v1/appointments?appointment_id=eq.{}", id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(|e| SchedulingError::RepositoryFailure(e.to_string()))?;

        Ok(parse_rows::<Appointment>(result)?.into_iter().next())
    }

    async fn find_by_filters(
        &self,
        filters: &AppointmentFilters,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut query_parts = Vec::new();

        if let Some(patient_id) = &filters.patient_id {
            query_parts.push(format!("patient_id=eq.{}", urlencoding::encode(patient_id)));
        }
        if let Some(status) = filters.status {
            query_parts.push(format!("status=eq.{}", status));
        }

        query_parts.push("order=created_at.asc".to_string());
        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(|e| SchedulingError::RepositoryFailure(e.to_string()))?;

        parse_rows(result)
    }

    async fn update(
        &self,
        appointment: &Appointment,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let body = serde_json::to_value(appointment)
            .map_err(|e| SchedulingError::RepositoryFailure(e.to_string()))?;

        let path = format!("/rest/v1/appointments?appointment_id=eq.{}", appointment.id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                self.token(),
                Some(body),
                Some(representation_headers()),
            )
            .await
            .map_err(|e| SchedulingError::RepositoryFailure(e.to_string()))?;

        Ok(parse_rows::<Appointment>(result)?.into_iter().next())
    }
}
