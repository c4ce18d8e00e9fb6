use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::NaiveDate;

use scheduling_cell::models::{
    AvailabilityFilters, AvailabilityStatus, CreateAvailabilityRequest, SchedulingError, TimeSlot,
    UpdateAvailabilityRequest,
};
use scheduling_cell::repository::{AvailabilityRepository, InMemoryScheduleStore};
use scheduling_cell::services::AvailabilityService;

fn slot(hour: u32, minute: u32, duration_minutes: i32) -> TimeSlot {
    TimeSlot::new(
        NaiveDate::from_ymd_opt(2026, 1, 10)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap(),
        duration_minutes,
    )
    .unwrap()
}

fn create_request(doctor_id: &str, time_slot: TimeSlot) -> CreateAvailabilityRequest {
    CreateAvailabilityRequest {
        doctor_id: doctor_id.to_string(),
        facility_id: "facility-1".to_string(),
        service_type_id: "general-visit".to_string(),
        time_slot,
    }
}

fn setup() -> (AvailabilityService, Arc<InMemoryScheduleStore>) {
    let store = Arc::new(InMemoryScheduleStore::new());
    let service = AvailabilityService::new(store.clone());
    (service, store)
}

#[tokio::test]
async fn overlapping_slot_for_same_doctor_is_rejected() {
    let (service, _) = setup();

    service
        .create_availability(create_request("doctor-1", slot(9, 0, 30)))
        .await
        .unwrap();

    // 09:15-09:45 overlaps 09:00-09:30
    let result = service
        .create_availability(create_request("doctor-1", slot(9, 15, 30)))
        .await;
    assert_matches!(result, Err(SchedulingError::OverlapDetected));

    // 09:30-10:00 is adjacent: half-open intervals, no overlap
    let adjacent = service
        .create_availability(create_request("doctor-1", slot(9, 30, 30)))
        .await;
    assert!(adjacent.is_ok());
}

#[tokio::test]
async fn same_slot_for_other_doctor_is_allowed() {
    let (service, _) = setup();

    service
        .create_availability(create_request("doctor-1", slot(9, 0, 30)))
        .await
        .unwrap();

    let other_doctor = service
        .create_availability(create_request("doctor-2", slot(9, 0, 30)))
        .await;
    assert!(other_doctor.is_ok());
}

#[tokio::test]
async fn cancelled_slot_does_not_block_reuse_of_its_time() {
    let (service, _) = setup();

    let published = service
        .create_availability(create_request("doctor-1", slot(9, 0, 30)))
        .await
        .unwrap();
    service.cancel_availability(published.id).await.unwrap();

    let reuse = service
        .create_availability(create_request("doctor-1", slot(9, 0, 30)))
        .await;
    assert!(reuse.is_ok());
}

#[tokio::test]
async fn check_overlap_with_own_id_excluded_is_false() {
    let (service, store) = setup();

    let published = service
        .create_availability(create_request("doctor-1", slot(9, 0, 30)))
        .await
        .unwrap();

    let against_itself = store
        .check_overlap("doctor-1", &published.time_slot, Some(published.id))
        .await
        .unwrap();
    assert!(!against_itself);

    let without_exclusion = store
        .check_overlap("doctor-1", &published.time_slot, None)
        .await
        .unwrap();
    assert!(without_exclusion);
}

#[tokio::test]
async fn update_moves_slot_and_keeps_unspecified_fields() {
    let (service, _) = setup();

    let published = service
        .create_availability(create_request("doctor-1", slot(9, 0, 30)))
        .await
        .unwrap();

    let updated = service
        .update_availability(
            published.id,
            UpdateAvailabilityRequest {
                facility_id: Some("facility-2".to_string()),
                service_type_id: None,
                time_slot: Some(slot(14, 0, 45)),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.facility_id, "facility-2");
    assert_eq!(updated.service_type_id, "general-visit");
    assert_eq!(updated.time_slot, slot(14, 0, 45));
    assert_eq!(updated.status, AvailabilityStatus::Available);
}

#[tokio::test]
async fn update_onto_another_slot_of_same_doctor_is_rejected() {
    let (service, _) = setup();

    service
        .create_availability(create_request("doctor-1", slot(9, 0, 30)))
        .await
        .unwrap();
    let second = service
        .create_availability(create_request("doctor-1", slot(11, 0, 30)))
        .await
        .unwrap();

    let result = service
        .update_availability(
            second.id,
            UpdateAvailabilityRequest {
                facility_id: None,
                service_type_id: None,
                time_slot: Some(slot(9, 15, 30)),
            },
        )
        .await;
    assert_matches!(result, Err(SchedulingError::OverlapDetected));
}

#[tokio::test]
async fn update_with_malformed_duration_fails_validation_not_overlap() {
    let (service, _) = setup();

    service
        .create_availability(create_request("doctor-1", slot(9, 0, 30)))
        .await
        .unwrap();
    let second = service
        .create_availability(create_request("doctor-1", slot(11, 0, 30)))
        .await
        .unwrap();

    // The requested window collides with the 09:00 slot, but the malformed
    // duration must be rejected first: an overlap verdict would prove the
    // storage query ran on unvalidated input.
    let result = service
        .update_availability(
            second.id,
            UpdateAvailabilityRequest {
                facility_id: None,
                service_type_id: None,
                time_slot: Some(TimeSlot {
                    start_date_time: slot(9, 15, 30).start_date_time,
                    duration_minutes: 0,
                }),
            },
        )
        .await;
    assert_matches!(result, Err(SchedulingError::InvalidDuration(0)));
}

#[tokio::test]
async fn update_keeping_own_time_is_not_a_self_conflict() {
    let (service, _) = setup();

    let published = service
        .create_availability(create_request("doctor-1", slot(9, 0, 30)))
        .await
        .unwrap();

    // Same time slot, new facility: the exclude-own-id rule applies.
    let result = service
        .update_availability(
            published.id,
            UpdateAvailabilityRequest {
                facility_id: Some("facility-2".to_string()),
                service_type_id: None,
                time_slot: Some(slot(9, 0, 30)),
            },
        )
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn booked_slot_cannot_be_updated_or_cancelled_directly() {
    let (service, store) = setup();

    let published = service
        .create_availability(create_request("doctor-1", slot(9, 0, 30)))
        .await
        .unwrap();
    store
        .transition_status(
            published.id,
            AvailabilityStatus::Available,
            AvailabilityStatus::Booked,
        )
        .await
        .unwrap();

    let update = service
        .update_availability(
            published.id,
            UpdateAvailabilityRequest {
                facility_id: Some("facility-2".to_string()),
                service_type_id: None,
                time_slot: None,
            },
        )
        .await;
    assert_matches!(
        update,
        Err(SchedulingError::InvalidAvailabilityTransition(
            AvailabilityStatus::Booked
        ))
    );

    let cancel = service.cancel_availability(published.id).await;
    assert_matches!(
        cancel,
        Err(SchedulingError::InvalidAvailabilityTransition(
            AvailabilityStatus::Booked
        ))
    );
}

#[tokio::test]
async fn blank_or_oversized_identifiers_never_reach_storage() {
    let (service, store) = setup();

    let blank = service
        .create_availability(create_request("  ", slot(9, 0, 30)))
        .await;
    assert_matches!(blank, Err(SchedulingError::ValidationError(_)));

    let oversized = service
        .create_availability(create_request(&"d".repeat(51), slot(9, 0, 30)))
        .await;
    assert_matches!(oversized, Err(SchedulingError::ValidationError(_)));

    let all = store
        .find_by_filters(&AvailabilityFilters::default())
        .await
        .unwrap();
    assert!(all.is_empty());
}

#[tokio::test]
async fn filters_are_and_combined() {
    let (service, _) = setup();

    service
        .create_availability(CreateAvailabilityRequest {
            doctor_id: "doctor-1".to_string(),
            facility_id: "facility-1".to_string(),
            service_type_id: "general-visit".to_string(),
            time_slot: slot(9, 0, 30),
        })
        .await
        .unwrap();
    service
        .create_availability(CreateAvailabilityRequest {
            doctor_id: "doctor-1".to_string(),
            facility_id: "facility-2".to_string(),
            service_type_id: "cardiology".to_string(),
            time_slot: slot(11, 0, 30),
        })
        .await
        .unwrap();
    service
        .create_availability(CreateAvailabilityRequest {
            doctor_id: "doctor-2".to_string(),
            facility_id: "facility-1".to_string(),
            service_type_id: "general-visit".to_string(),
            time_slot: slot(9, 0, 30),
        })
        .await
        .unwrap();

    let by_doctor = service
        .list_availabilities(&AvailabilityFilters {
            doctor_id: Some("doctor-1".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_doctor.len(), 2);

    let by_doctor_and_facility = service
        .list_availabilities(&AvailabilityFilters {
            doctor_id: Some("doctor-1".to_string()),
            facility_id: Some("facility-1".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_doctor_and_facility.len(), 1);
    assert_eq!(by_doctor_and_facility[0].service_type_id, "general-visit");

    let by_status = service
        .list_availabilities(&AvailabilityFilters {
            status: Some(AvailabilityStatus::Available),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_status.len(), 3);

    // Results come back in stable start-time order.
    let starts: Vec<_> = by_status
        .iter()
        .map(|a| a.time_slot.start_date_time)
        .collect();
    let mut sorted = starts.clone();
    sorted.sort();
    assert_eq!(starts, sorted);
}

#[tokio::test]
async fn unknown_availability_is_reported_as_not_found() {
    let (service, _) = setup();

    let result = service.get_availability(uuid::Uuid::new_v4()).await;
    assert_matches!(result, Err(SchedulingError::AvailabilityNotFound));
}
