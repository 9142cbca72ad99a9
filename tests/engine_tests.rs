//! End-to-end engine tests against a real SQLite store: allocation order,
//! booking lifecycle, pricing, capacity resizing, lot deletion, dashboards,
//! history pagination, and exports.

mod support;

use chrono::{Duration, Utc};
use parking_system::models::lot::LotUpdate;
use parking_system::services::export_service::{ExportJobStatus, ExportJobs, history_csv};
use parking_system::services::parking_service::{HistoryParams, ParkingError};
use support::{
    backdate_booking, create_lot, new_lot, set_booking_window, spot_numbers, test_service,
};
use uuid::Uuid;

#[tokio::test]
async fn creating_a_lot_fans_out_its_spots() {
    let (service, _dir) = test_service().await;
    let lot = create_lot(&service, "harbor", 4, 15.0).await;

    assert_eq!(lot.capacity, 4);
    assert_eq!(spot_numbers(&service, lot.id).await, vec![1, 2, 3, 4]);

    let summary = service.lot_summary(lot.id).await.unwrap();
    assert_eq!(summary.total_spots, 4);
    assert_eq!(summary.available_spots, 4);
    assert_eq!(summary.occupied_spots, 0);
}

#[tokio::test]
async fn lot_validation_rejects_bad_input() {
    let (service, _dir) = test_service().await;

    assert!(matches!(
        service.create_lot(new_lot("downtown", 0, 10.0)).await,
        Err(ParkingError::InvalidCapacity(0))
    ));
    assert!(matches!(
        service.create_lot(new_lot("downtown", 3, -1.0)).await,
        Err(ParkingError::InvalidPrice(_))
    ));

    create_lot(&service, "downtown", 2, 10.0).await;
    assert!(matches!(
        service.create_lot(new_lot("downtown", 2, 10.0)).await,
        Err(ParkingError::DuplicateLotName(_))
    ));
}

#[tokio::test]
async fn booking_takes_the_lowest_numbered_spot() {
    let (service, _dir) = test_service().await;
    let lot = create_lot(&service, "harbor", 3, 10.0).await;

    let first = service.book(lot.id, Uuid::new_v4()).await.unwrap();
    assert_eq!(first.spot_number, 1);
    assert_eq!(first.lot_name, "harbor");
    assert!(first.is_open());

    let second = service.book(lot.id, Uuid::new_v4()).await.unwrap();
    assert_eq!(second.spot_number, 2);
}

#[tokio::test]
async fn a_user_holds_at_most_one_open_booking() {
    let (service, _dir) = test_service().await;
    let lot_a = create_lot(&service, "lot-a", 2, 10.0).await;
    let lot_b = create_lot(&service, "lot-b", 2, 10.0).await;
    let user = Uuid::new_v4();

    service.book(lot_a.id, user).await.unwrap();
    assert!(matches!(
        service.book(lot_a.id, user).await,
        Err(ParkingError::AlreadyBooked(_))
    ));
    // the check is system-wide, not per lot
    assert!(matches!(
        service.book(lot_b.id, user).await,
        Err(ParkingError::AlreadyBooked(_))
    ));
}

#[tokio::test]
async fn booking_a_full_lot_is_rejected() {
    let (service, _dir) = test_service().await;
    let lot = create_lot(&service, "tiny", 1, 10.0).await;

    service.book(lot.id, Uuid::new_v4()).await.unwrap();
    assert!(matches!(
        service.book(lot.id, Uuid::new_v4()).await,
        Err(ParkingError::LotFull(_))
    ));
}

#[tokio::test]
async fn booking_an_unknown_lot_is_not_found() {
    let (service, _dir) = test_service().await;
    assert!(matches!(
        service.book(Uuid::new_v4(), Uuid::new_v4()).await,
        Err(ParkingError::LotNotFound(_))
    ));
}

#[tokio::test]
async fn release_prices_partial_hours_rounded_up() {
    let (service, _dir) = test_service().await;
    let lot = create_lot(&service, "harbor", 2, 20.0).await;
    let user = Uuid::new_v4();

    let booking = service.book(lot.id, user).await.unwrap();
    backdate_booking(&service, booking.id, Utc::now() - Duration::minutes(61)).await;

    let receipt = service.release(user).await.unwrap();
    assert_eq!(receipt.id, booking.id);
    assert_eq!(receipt.cost, Some(40.0)); // 61 min at 20/hr rounds up to 2 hours
    assert_eq!(receipt.spot_number, 1);
    assert_eq!(receipt.lot_address, "12 Harbor Road");
    assert!(receipt.end_time.unwrap() >= receipt.start_time);

    // the spot is free again and hands out the same number next
    let again = service.book(lot.id, user).await.unwrap();
    assert_eq!(again.spot_number, 1);
}

#[tokio::test]
async fn release_is_idempotent() {
    let (service, _dir) = test_service().await;
    let lot = create_lot(&service, "harbor", 1, 10.0).await;
    let user = Uuid::new_v4();

    let booking = service.book(lot.id, user).await.unwrap();
    backdate_booking(&service, booking.id, Utc::now() - Duration::minutes(30)).await;
    let receipt = service.release(user).await.unwrap();
    assert_eq!(receipt.cost, Some(10.0));

    assert!(matches!(
        service.release(user).await,
        Err(ParkingError::NoActiveBooking)
    ));

    // no duplicate charge
    let summary = service.user_summary(user).await.unwrap();
    assert_eq!(summary.total_bookings, 1);
    assert_eq!(summary.total_spent, 10.0);
}

#[tokio::test]
async fn active_booking_reflects_the_open_booking_only() {
    let (service, _dir) = test_service().await;
    let lot = create_lot(&service, "harbor", 1, 10.0).await;
    let user = Uuid::new_v4();

    assert!(matches!(
        service.active_booking(user).await,
        Err(ParkingError::NoActiveBooking)
    ));

    let booking = service.book(lot.id, user).await.unwrap();
    let active = service.active_booking(user).await.unwrap();
    assert_eq!(active.id, booking.id);
    assert!(active.is_open());

    service.release(user).await.unwrap();
    assert!(matches!(
        service.active_booking(user).await,
        Err(ParkingError::NoActiveBooking)
    ));
}

#[tokio::test]
async fn grow_adds_spots_above_the_highest_number() {
    let (service, _dir) = test_service().await;
    let lot = create_lot(&service, "harbor", 2, 10.0).await;

    let grown = service.resize_lot(lot.id, 4).await.unwrap();
    assert_eq!(grown.capacity, 4);
    assert_eq!(spot_numbers(&service, lot.id).await, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn shrink_cuts_the_highest_numbers_and_keeps_low_spots() {
    let (service, _dir) = test_service().await;
    let lot = create_lot(&service, "harbor", 4, 10.0).await;

    let user = Uuid::new_v4();
    let booking = service.book(lot.id, user).await.unwrap();
    assert_eq!(booking.spot_number, 1);

    let shrunk = service.resize_lot(lot.id, 2).await.unwrap();
    assert_eq!(shrunk.capacity, 2);
    assert_eq!(spot_numbers(&service, lot.id).await, vec![1, 2]);
}

#[tokio::test]
async fn shrink_is_blocked_by_an_occupied_spot_in_the_removed_range() {
    let (service, _dir) = test_service().await;
    let lot = create_lot(&service, "harbor", 3, 10.0).await;

    let (u1, u2, u3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    service.book(lot.id, u1).await.unwrap();
    service.book(lot.id, u2).await.unwrap();
    service.book(lot.id, u3).await.unwrap(); // spot 3
    service.release(u1).await.unwrap();
    service.release(u2).await.unwrap();

    // spots 1 and 2 are free, but the shrink must take spot 3
    let err = service.resize_lot(lot.id, 2).await.unwrap_err();
    assert!(matches!(
        err,
        ParkingError::InsufficientRemovableSpots {
            needed: 1,
            removable: 0
        }
    ));
    // nothing changed
    assert_eq!(spot_numbers(&service, lot.id).await, vec![1, 2, 3]);
    assert_eq!(service.get_lot(lot.id).await.unwrap().capacity, 3);

    service.release(u3).await.unwrap();
    let shrunk = service.resize_lot(lot.id, 2).await.unwrap();
    assert_eq!(shrunk.capacity, 2);
    assert_eq!(spot_numbers(&service, lot.id).await, vec![1, 2]);
}

#[tokio::test]
async fn resize_to_current_capacity_is_a_noop() {
    let (service, _dir) = test_service().await;
    let lot = create_lot(&service, "harbor", 3, 10.0).await;

    let same = service.resize_lot(lot.id, 3).await.unwrap();
    assert_eq!(same.capacity, 3);
    assert_eq!(spot_numbers(&service, lot.id).await, vec![1, 2, 3]);

    assert!(matches!(
        service.resize_lot(lot.id, 0).await,
        Err(ParkingError::InvalidCapacity(0))
    ));
}

#[tokio::test]
async fn update_lot_edits_fields_and_resizes_atomically() {
    let (service, _dir) = test_service().await;
    let lot = create_lot(&service, "harbor", 2, 10.0).await;
    create_lot(&service, "airport", 2, 10.0).await;

    let updated = service
        .update_lot(
            lot.id,
            LotUpdate {
                name: Some("harbor-west".into()),
                price_per_hour: Some(12.5),
                capacity: Some(3),
                ..LotUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "harbor-west");
    assert_eq!(updated.price_per_hour, 12.5);
    assert_eq!(updated.capacity, 3);
    assert_eq!(spot_numbers(&service, lot.id).await, vec![1, 2, 3]);

    // renaming onto an existing lot name is a conflict
    assert!(matches!(
        service
            .update_lot(
                lot.id,
                LotUpdate {
                    name: Some("airport".into()),
                    ..LotUpdate::default()
                }
            )
            .await,
        Err(ParkingError::DuplicateLotName(_))
    ));
}

#[tokio::test]
async fn delete_lot_is_blocked_while_any_spot_is_occupied() {
    let (service, _dir) = test_service().await;
    let lot = create_lot(&service, "harbor", 2, 10.0).await;
    let user = Uuid::new_v4();

    service.book(lot.id, user).await.unwrap();
    assert!(matches!(
        service.delete_lot(lot.id).await,
        Err(ParkingError::LotHasOccupiedSpots(1))
    ));
    // untouched
    assert_eq!(spot_numbers(&service, lot.id).await, vec![1, 2]);

    service.release(user).await.unwrap();
    service.delete_lot(lot.id).await.unwrap();

    assert!(matches!(
        service.get_lot(lot.id).await,
        Err(ParkingError::LotNotFound(_))
    ));
    assert!(service.list_lots().await.unwrap().is_empty());

    // history cleanup went with the lot
    let summary = service.user_summary(user).await.unwrap();
    assert_eq!(summary.total_bookings, 0);
    assert!(summary.recent_booking.is_none());
}

/// The full walk: two users fill a 2-spot lot, a third bounces, a timed
/// release costs one hour, the shrink is blocked until the tail spot frees
/// up, then succeeds and takes its closed history with it.
#[tokio::test]
async fn booking_lifecycle_end_to_end() {
    let (service, _dir) = test_service().await;
    let lot = create_lot(&service, "A", 2, 10.0).await;
    let (u1, u2, u3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let b1 = service.book(lot.id, u1).await.unwrap();
    assert_eq!(b1.spot_number, 1);
    let b2 = service.book(lot.id, u2).await.unwrap();
    assert_eq!(b2.spot_number, 2);
    assert!(matches!(
        service.book(lot.id, u3).await,
        Err(ParkingError::LotFull(_))
    ));

    backdate_booking(&service, b1.id, Utc::now() - Duration::minutes(30)).await;
    let receipt = service.release(u1).await.unwrap();
    assert_eq!(receipt.cost, Some(10.0)); // half an hour billed as one

    // spot 2 is still occupied, so the shrink to 1 cannot take it
    assert!(matches!(
        service.resize_lot(lot.id, 1).await,
        Err(ParkingError::InsufficientRemovableSpots { .. })
    ));

    service.release(u2).await.unwrap();
    let shrunk = service.resize_lot(lot.id, 1).await.unwrap();
    assert_eq!(shrunk.capacity, 1);
    assert_eq!(spot_numbers(&service, lot.id).await, vec![1]);

    // removing spot 2 removed u2's closed booking with it; u1's survives
    assert_eq!(service.user_summary(u2).await.unwrap().total_bookings, 0);
    assert_eq!(service.user_summary(u1).await.unwrap().total_bookings, 1);
}

#[tokio::test]
async fn system_summary_rolls_up_per_lot_occupancy() {
    let (service, _dir) = test_service().await;
    let harbor = create_lot(&service, "harbor", 2, 10.0).await;
    create_lot(&service, "airport", 3, 30.0).await;

    service.book(harbor.id, Uuid::new_v4()).await.unwrap();

    let summary = service.system_summary().await.unwrap();
    assert_eq!(summary.total_lots, 2);
    assert_eq!(summary.total_spots, 5);
    assert_eq!(summary.occupied_spots, 1);
    assert_eq!(summary.available_spots, 4);

    // breakdown is ordered by lot name
    assert_eq!(summary.lot_occupancy.len(), 2);
    assert_eq!(summary.lot_occupancy[0].lot_name, "airport");
    assert_eq!(summary.lot_occupancy[0].occupied_spots, 0);
    assert_eq!(summary.lot_occupancy[1].lot_name, "harbor");
    assert_eq!(summary.lot_occupancy[1].occupied_spots, 1);
    assert_eq!(summary.lot_occupancy[1].available_spots, 1);
}

#[tokio::test]
async fn list_lots_reports_live_availability() {
    let (service, _dir) = test_service().await;
    let lot = create_lot(&service, "harbor", 2, 10.0).await;
    let user = Uuid::new_v4();

    service.book(lot.id, user).await.unwrap();
    let lots = service.list_lots().await.unwrap();
    assert_eq!(lots.len(), 1);
    assert_eq!(lots[0].available_spots, 1);

    service.release(user).await.unwrap();
    let lots = service.list_lots().await.unwrap();
    assert_eq!(lots[0].available_spots, 2);
}

#[tokio::test]
async fn spot_statuses_show_the_occupant() {
    let (service, _dir) = test_service().await;
    let lot = create_lot(&service, "harbor", 2, 10.0).await;
    let user = Uuid::new_v4();
    let booking = service.book(lot.id, user).await.unwrap();

    let statuses = service.spot_statuses().await.unwrap();
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0].spot_number, 1);
    assert_eq!(statuses[0].occupant_user_id, Some(user));
    assert_eq!(statuses[0].booking_id, Some(booking.id));
    assert_eq!(statuses[1].spot_number, 2);
    assert!(statuses[1].occupant_user_id.is_none());
}

#[tokio::test]
async fn history_pages_walk_closed_bookings_most_recent_first() {
    let (service, _dir) = test_service().await;
    let lot = create_lot(&service, "harbor", 1, 10.0).await;
    let user = Uuid::new_v4();

    for _ in 0..5 {
        service.book(lot.id, user).await.unwrap();
        service.release(user).await.unwrap();
    }

    // pin each closed booking to a distinct window, newest at base
    let base = Utc::now();
    let all = service.bookings_for_user(user, None).await.unwrap();
    assert_eq!(all.len(), 5);
    let mut expected = Vec::new();
    for (i, booking) in all.iter().enumerate() {
        let end = base - Duration::hours(i as i64);
        set_booking_window(&service, booking.id, end - Duration::minutes(30), end).await;
        expected.push(booking.id);
    }

    let mut seen = Vec::new();
    let mut cursor = None;
    let mut pages = 0;
    loop {
        let page = service
            .booking_history(
                user,
                HistoryParams {
                    cursor,
                    max_items: 2,
                },
            )
            .await
            .unwrap();
        seen.extend(page.bookings.iter().map(|b| b.id));
        pages += 1;
        assert!(page.bookings.iter().all(|b| !b.is_open()));
        match page.next_cursor {
            Some(next) => {
                assert!(page.is_truncated);
                cursor = Some(next);
            }
            None => {
                assert!(!page.is_truncated);
                break;
            }
        }
    }

    assert_eq!(pages, 3); // 2 + 2 + 1
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn history_excludes_the_open_booking() {
    let (service, _dir) = test_service().await;
    let lot = create_lot(&service, "harbor", 2, 10.0).await;
    let user = Uuid::new_v4();

    service.book(lot.id, user).await.unwrap();
    service.release(user).await.unwrap();
    service.book(lot.id, user).await.unwrap();

    let page = service
        .booking_history(
            user,
            HistoryParams {
                cursor: None,
                max_items: 10,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.bookings.len(), 1);
    assert!(!page.bookings[0].is_open());
}

#[tokio::test]
async fn bookings_for_user_filters_by_since() {
    let (service, _dir) = test_service().await;
    let lot = create_lot(&service, "harbor", 1, 10.0).await;
    let user = Uuid::new_v4();

    for _ in 0..2 {
        service.book(lot.id, user).await.unwrap();
        service.release(user).await.unwrap();
    }
    let all = service.bookings_for_user(user, None).await.unwrap();
    assert_eq!(all.len(), 2);

    let old_start = Utc::now() - Duration::days(40);
    set_booking_window(&service, all[1].id, old_start, old_start + Duration::hours(1)).await;

    let recent = service
        .bookings_for_user(user, Some(Utc::now() - Duration::days(30)))
        .await
        .unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, all[0].id);
}

#[tokio::test]
async fn export_job_renders_the_history_csv() {
    let (service, _dir) = test_service().await;
    let lot = create_lot(&service, "harbor", 1, 10.0).await;
    let user = Uuid::new_v4();

    service.book(lot.id, user).await.unwrap();
    service.release(user).await.unwrap();

    let jobs = ExportJobs::start(service.clone());
    let task_id = jobs.enqueue_history_export(user).await;

    let mut status = jobs.status(task_id).expect("job is registered");
    for _ in 0..100 {
        if !matches!(status, ExportJobStatus::Pending) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        status = jobs.status(task_id).expect("job is registered");
    }

    match status {
        ExportJobStatus::Completed {
            filename,
            content_type,
            content,
        } => {
            assert!(filename.starts_with(&format!("parking_history_{user}")));
            assert_eq!(content_type, "text/csv");
            let expected = history_csv(&service.bookings_for_user(user, None).await.unwrap());
            assert_eq!(content, expected);
            assert!(content.contains("harbor"));
        }
        other => panic!("export did not complete: {other:?}"),
    }
}
