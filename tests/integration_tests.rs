//! Integration tests for the OPD queue service
//!
//! These tests drive the queue engine through whole front-desk and doctor
//! workflows:
//! - booking, check-in, and calling across wards
//! - doctor breaks and the ward clock
//! - day rollover
//! - event delivery to display boards

mod fixtures;

use fixtures::{create_test_state, nth_phone, phone_for, TestSystem};
use opd_queue::error::QueueError;
use opd_queue::events::QueueEvent;
use opd_queue::types::{EstimatedTime, MinuteOfDay, Vitals, Ward};
use tokio_test::{assert_err, assert_ok};

fn at(hour: u32, minute: u32) -> EstimatedTime {
    EstimatedTime::At(MinuteOfDay::from_hm(hour, minute))
}

fn error_kind<T: std::fmt::Debug>(result: opd_queue::Result<T>) -> QueueError {
    let err = assert_err!(result);
    QueueError::from_anyhow(&err)
        .cloned()
        .expect("expected a queue error")
}

#[tokio::test]
async fn test_front_desk_to_doctor_workflow() {
    let system = TestSystem::at(10, 0);

    // Patient A books a regular slot, patient B arrives as an emergency
    let a = system.book("Asha", Ward::General).await;
    assert_eq!(a.position, 1);
    assert_eq!(a.token.estimated_time, at(10, 0));

    let b = system.book_with("Bhavesh", Ward::General, true).await;
    assert_eq!(b.position, 1);

    let snapshot = assert_ok!(system.manager.get_queue(Ward::General).await);
    assert_eq!(snapshot.queue[0].token, b.token.token);
    assert_eq!(snapshot.queue[1].token, a.token.token);
    assert!(snapshot.queue[0].estimated_time.minute() <= snapshot.queue[1].estimated_time.minute());
    assert_eq!(snapshot.queue[1].estimated_time, at(10, 20));

    // Only A has reached the ward
    let checked = assert_ok!(system.manager.check_in(&a.token.token, None).await);
    assert!(checked.checked_in);

    let served = assert_ok!(system.manager.call_next(Ward::General).await);
    assert_eq!(served.token, a.token.token);

    let snapshot = assert_ok!(system.manager.get_queue(Ward::General).await);
    assert_eq!(snapshot.now_serving.map(|t| t.token), Some(a.token.token.clone()));
    assert_eq!(snapshot.queue.len(), 1);
    assert_eq!(snapshot.queue[0].token, b.token.token);
    // Doctor is busy with A until 10:10
    assert_eq!(snapshot.queue[0].estimated_time, at(10, 10));

    let finished = assert_ok!(system.manager.finish_consultation(Ward::General).await);
    assert_eq!(finished.map(|t| t.token), Some(a.token.token));

    let stats = assert_ok!(system.manager.stats().await);
    assert_eq!(stats.patients_served_today, 1);
    assert_eq!(stats.tokens_booked, 2);
    assert_eq!(stats.emergency_bookings, 1);
    assert_eq!(stats.check_ins, 1);
}

#[tokio::test]
async fn test_phone_is_unique_across_wards() {
    let system = TestSystem::at(10, 0);
    let phone = nth_phone(1);

    assert_ok!(
        system
            .manager
            .book_token("Meera", &phone, Ward::Dermatology, false)
            .await
    );

    let duplicate = system
        .manager
        .book_token("Meera", &phone, Ward::Orthopedic, false)
        .await;
    assert!(matches!(
        error_kind(duplicate),
        QueueError::DuplicateBooking { .. }
    ));

    // Once called, the phone is free to book again
    assert_ok!(system.manager.check_in(&phone_token(&system, Ward::Dermatology).await, None).await);
    assert_ok!(system.manager.call_next(Ward::Dermatology).await);
    assert_ok!(
        system
            .manager
            .book_token("Meera", &phone, Ward::Orthopedic, false)
            .await
    );
}

async fn phone_token(system: &TestSystem, ward: Ward) -> String {
    system.order(ward).await.remove(0)
}

#[tokio::test]
async fn test_prefixes_keep_wards_apart() {
    let system = TestSystem::at(10, 0);

    let gy = system.book("Gita", Ward::Gynecologist).await;
    let g = system.book("Gopal", Ward::General).await;
    let o = system.book("Omkar", Ward::Orthopedic).await;
    let d = system.book("Divya", Ward::Dermatology).await;

    assert_eq!(gy.token.token, "GY1");
    assert_eq!(g.token.token, "G1");
    assert_eq!(o.token.token, "O1");
    assert_eq!(d.token.token, "D1");

    // A lookup for G1 never lands on GY1
    let checked = assert_ok!(system.manager.check_in("g1", None).await);
    assert_eq!(checked.ward, Ward::General);
}

#[tokio::test]
async fn test_qr_check_in_with_vitals() {
    let system = TestSystem::at(10, 0);
    let receipt = system.book("Kiran", Ward::Orthopedic).await;
    let payload = format!("OPD-{}-{}", receipt.token.token, phone_for("Kiran"));

    let vitals = Vitals {
        temperature: Some("99.1".to_string()),
        blood_pressure: Some("130/85".to_string()),
    };
    let patient = assert_ok!(system.manager.check_in(&payload, Some(vitals.clone())).await);
    assert!(patient.checked_in);
    assert_eq!(patient.vitals, Some(vitals));

    // A forged phone in the payload does not match
    let forged = format!("OPD-{}-9000000000", receipt.token.token);
    assert!(matches!(
        error_kind(system.manager.check_in(&forged, None).await),
        QueueError::TokenNotFound { .. }
    ));

    // Checking in again keeps the earlier vitals when none are given
    let again = assert_ok!(system.manager.check_in(&receipt.token.token, None).await);
    assert!(again.vitals.is_some());
    assert_eq!(assert_ok!(system.manager.stats().await).check_ins, 1);
}

#[tokio::test]
async fn test_call_next_skips_absent_patients() {
    let system = TestSystem::at(10, 0);

    let absent = system.book("Arjun", Ward::General).await;
    let present = system.arrive("Bela", Ward::General, false).await;

    let served = assert_ok!(system.manager.call_next(Ward::General).await);
    assert_eq!(served.token, present.token.token);

    // The absent patient keeps the head of the queue
    assert_eq!(system.order(Ward::General).await, vec![absent.token.token]);

    let before = assert_ok!(system.manager.get_queue(Ward::General).await);
    assert!(matches!(
        error_kind(system.manager.call_next(Ward::General).await),
        QueueError::NoArrivedPatients { .. }
    ));
    let after = assert_ok!(system.manager.get_queue(Ward::General).await);
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_break_holds_the_ward_clock() {
    let system = TestSystem::at(10, 0);
    let patient = system.arrive("Chitra", Ward::Dermatology, false).await;

    let state = assert_ok!(system.manager.toggle_break(Ward::Dermatology).await);
    assert!(state.on_break);
    assert_eq!(state.break_ends_at, Some(MinuteOfDay::from_hm(10, 30)));

    // Waiting patients are pushed behind the break
    let snapshot = assert_ok!(system.manager.get_queue(Ward::Dermatology).await);
    assert_eq!(snapshot.queue[0].estimated_time, at(10, 30));
    assert!(snapshot.doctor.break_state.on_break);

    let before = snapshot.queue.clone();
    assert!(matches!(
        error_kind(system.manager.call_next(Ward::Dermatology).await),
        QueueError::DoctorOnBreak { .. }
    ));
    assert_eq!(
        assert_ok!(system.manager.get_queue(Ward::Dermatology).await).queue,
        before
    );

    // Ending the break early leaves the clock at the break end
    system.clock.set_time(10, 5);
    let state = assert_ok!(system.manager.toggle_break(Ward::Dermatology).await);
    assert!(!state.on_break);
    assert_eq!(state.break_ends_at, None);
    let snapshot = assert_ok!(system.manager.get_queue(Ward::Dermatology).await);
    assert_eq!(snapshot.queue[0].estimated_time, at(10, 30));

    // Calling resets the clock from the call time
    let served = assert_ok!(system.manager.call_next(Ward::Dermatology).await);
    assert_eq!(served.token, patient.token.token);
    let next = system.book("Dev", Ward::Dermatology).await;
    assert_eq!(next.token.estimated_time, at(10, 15));
}

#[tokio::test]
async fn test_late_bookings_are_closed() {
    let system = TestSystem::at(16, 45);

    let first = system.book("Esha", Ward::Gynecologist).await;
    let second = system.book("Farah", Ward::Gynecologist).await;
    let third = system.book("Gauri", Ward::Gynecologist).await;

    assert_eq!(first.token.estimated_time, at(16, 45));
    assert_eq!(second.token.estimated_time, at(16, 55));
    assert_eq!(third.token.estimated_time, EstimatedTime::Closed);

    // An emergency still only gets a slot inside the operating hours
    let emergency = system.book_with("Hema", Ward::Gynecologist, true).await;
    assert_eq!(emergency.position, 1);
    assert_eq!(emergency.token.estimated_time, at(16, 45));

    let snapshot = assert_ok!(system.manager.get_queue(Ward::Gynecologist).await);
    let estimates: Vec<_> = snapshot.queue.iter().map(|t| t.estimated_time).collect();
    assert_eq!(
        estimates,
        vec![
            at(16, 45),
            EstimatedTime::Closed,
            EstimatedTime::Closed,
            EstimatedTime::Closed
        ]
    );
}

#[tokio::test]
async fn test_day_rollover() {
    let system = TestSystem::at(16, 0);

    let yesterday = system.arrive("Ishaan", Ward::General, false).await;
    let leftover = system.book("Jaya", Ward::General).await;
    assert_ok!(system.manager.call_next(Ward::General).await);
    assert_eq!(assert_ok!(system.manager.stats().await).patients_served_today, 1);

    // Next morning at 09:00
    system.clock.advance_minutes(17 * 60);
    assert_eq!(assert_ok!(system.manager.stats().await).patients_served_today, 0);

    let today = system.book("Kabir", Ward::General).await;
    assert_ne!(today.token.token, leftover.token.token);
    assert_ne!(today.token.token, yesterday.token.token);

    // Yesterday's leftover is scheduled from opening time again
    let snapshot = assert_ok!(system.manager.get_queue(Ward::General).await);
    assert_eq!(snapshot.queue[0].token, leftover.token.token);
    assert_eq!(snapshot.queue[0].estimated_time, at(10, 0));
    assert_eq!(snapshot.queue[1].estimated_time, at(10, 10));
}

#[tokio::test]
async fn test_events_follow_the_workflow() {
    let system = TestSystem::at(10, 0);

    let receipt = system.arrive("Lata", Ward::Orthopedic, true).await;
    assert_ok!(system.manager.call_next(Ward::Orthopedic).await);
    assert_ok!(system.manager.toggle_break(Ward::Orthopedic).await);
    assert_ok!(system.manager.finish_consultation(Ward::Orthopedic).await);

    let kinds: Vec<_> = system
        .events
        .get_published_events()
        .iter()
        .map(|e| e.kind())
        .collect();
    assert_eq!(
        kinds,
        vec![
            "TokenBooked",
            "PatientCheckedIn",
            "PatientCalled",
            "BreakToggled",
            "ConsultationFinished"
        ]
    );

    match &system.events.get_published_events()[2] {
        QueueEvent::PatientCalled {
            ward,
            token,
            emergency,
            ..
        } => {
            assert_eq!(*ward, Ward::Orthopedic);
            assert_eq!(*token, receipt.token.token);
            assert!(*emergency);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_display_board_receives_broadcast() {
    let (state, _clock) = create_test_state(10, 0).await;
    let mut receiver = state.event_publisher().subscribe();

    let receipt = assert_ok!(
        state
            .queue_manager()
            .book_token("Manav", &nth_phone(7), Ward::General, false)
            .await
    );

    let envelope = assert_ok!(receiver.recv().await);
    match envelope.event.clone() {
        QueueEvent::TokenBooked {
            token, position, ..
        } => {
            assert_eq!(token, receipt.token.token);
            assert_eq!(position, 1);
        }
        other => panic!("unexpected event {:?}", other),
    }

    let json = assert_ok!(envelope.to_json());
    assert!(json.contains("\"type\":\"TokenBooked\""));

    assert_ok!(state.shutdown().await);
}

#[tokio::test]
async fn test_metrics_track_engine_activity() {
    let system = TestSystem::at(10, 0);

    system.arrive("Nandini", Ward::General, false).await;
    assert_ok!(system.manager.call_next(Ward::General).await);
    let _ = system.manager.book_token("", "123", Ward::General, false).await;

    let queue = system.metrics.queue();
    assert_eq!(
        queue
            .tokens_booked_total
            .with_label_values(&["general", "normal"])
            .get(),
        1
    );
    assert_eq!(
        queue.patients_served_total.with_label_values(&["general"]).get(),
        1
    );
    assert_eq!(
        queue
            .bookings_rejected_total
            .with_label_values(&["validation"])
            .get(),
        1
    );
}
