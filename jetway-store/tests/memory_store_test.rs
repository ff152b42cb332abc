use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Utc};
use jetway_core::booking::{
    Direction, Gender, NewBooking, NewLeg, NewTicket, PassengerInfo, PassengerType, TripType,
};
use jetway_core::{BookingStatus, BookingStore, CabinClass, Flight, FlightCatalog, FlightRef, StoreError};
use jetway_core::flight::{CabinFares, CabinSeats, FlightStatus, SeatCount};
use jetway_store::MemoryStore;
use rust_decimal::Decimal;
use uuid::Uuid;

fn flight(id: FlightRef, economy_seats: i32) -> Flight {
    Flight {
        id,
        flight_no: "VN123".to_string(),
        airline: "Jetway".to_string(),
        origin: "HAN".to_string(),
        destination: "SGN".to_string(),
        depart_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        depart_weekday: 0,
        duration_minutes: 130,
        fares: CabinFares {
            economy: Decimal::from(50),
            ..Default::default()
        },
        seats: CabinSeats {
            economy: SeatCount::new(economy_seats),
            ..Default::default()
        },
        delay_minutes: 0,
        status: FlightStatus::OnTime,
    }
}

fn new_booking(user_id: i64, flight_id: FlightRef) -> NewBooking {
    NewBooking {
        booking_number: Uuid::new_v4(),
        user_id,
        trip_type: TripType::OneWay,
        cabin_class: "ECONOMY".to_string(),
        total_amount: Decimal::from(50),
        legs: vec![NewLeg {
            flight_id,
            direction: Direction::Outbound,
            cabin_class: CabinClass::Economy,
            departs_at: Utc::now() + chrono::Duration::days(7),
            fare_amount: Decimal::from(50),
        }],
        passengers: vec![PassengerInfo {
            first_name: "Hoa".to_string(),
            last_name: "Le".to_string(),
            passenger_type: PassengerType::Adult,
            gender: Gender::Female,
            dob: NaiveDate::from_ymd_opt(1988, 8, 8).unwrap(),
            passport_number: None,
            passport_expiry: None,
            nationality: None,
        }],
    }
}

#[tokio::test]
async fn test_guarded_seat_update_stays_in_range() {
    let store = MemoryStore::new();
    let d1 = FlightRef::domestic(1);
    store.add_flight(flight(d1, 2));

    let mut uow = store.begin().await.unwrap();
    assert_eq!(uow.adjust_seats(d1, CabinClass::Economy, -2).await.unwrap(), 0);

    let err = uow.adjust_seats(d1, CabinClass::Economy, -1).await.unwrap_err();
    assert!(matches!(err, StoreError::SeatUpdateRejected { delta: -1, .. }));

    // Cannot give back more than the cabin holds.
    let err = uow.adjust_seats(d1, CabinClass::Economy, 3).await.unwrap_err();
    assert!(matches!(err, StoreError::SeatUpdateRejected { .. }));

    let err = uow
        .adjust_seats(FlightRef::international(1), CabinClass::Economy, -1)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));

    uow.commit().await.unwrap();
    assert_eq!(store.flight(d1).unwrap().seats.economy.available, 0);
}

#[tokio::test]
async fn test_uncommitted_work_leaves_nothing_behind() {
    let store = MemoryStore::new();
    let d1 = FlightRef::domestic(1);
    store.add_flight(flight(d1, 10));

    {
        let mut uow = store.begin().await.unwrap();
        uow.insert_booking(&new_booking(1, d1)).await.unwrap();
        uow.adjust_seats(d1, CabinClass::Economy, -1).await.unwrap();
        // dropped without commit
    }
    assert_eq!(store.booking_count(), 0);
    assert_eq!(store.flight(d1).unwrap().seats.economy.available, 10);

    let mut uow = store.begin().await.unwrap();
    uow.adjust_seats(d1, CabinClass::Economy, -4).await.unwrap();
    uow.rollback().await.unwrap();
    assert_eq!(store.flight(d1).unwrap().seats.economy.available, 10);
}

#[tokio::test]
async fn test_committed_booking_and_tickets_are_visible() {
    let store = MemoryStore::new();
    let d1 = FlightRef::domestic(1);
    store.add_flight(flight(d1, 10));

    let mut uow = store.begin().await.unwrap();
    let booking = uow.insert_booking(&new_booking(7, d1)).await.unwrap();
    let passenger_id = booking.passengers[0].id;
    uow.insert_tickets(&[NewTicket {
        ticket_number: "TKT-0000AAAA".to_string(),
        booking_id: booking.id,
        passenger_id,
        flight_id: d1,
        leg_id: booking.legs[0].id,
        seat_number: "Y12C".to_string(),
        gate: "G4".to_string(),
        barcode: "BAR-0000AAAA0000".to_string(),
    }])
    .await
    .unwrap();

    // Not visible before commit.
    assert!(store.find_booking(booking.booking_number, 7).await.unwrap().is_none());
    uow.commit().await.unwrap();

    let stored = store.find_booking(booking.booking_number, 7).await.unwrap().unwrap();
    assert_eq!(stored.passengers[0].tickets.len(), 1);
    assert!(store.find_booking(booking.booking_number, 8).await.unwrap().is_none());

    let found = store.find_ticket("TKT-0000AAAA").await.unwrap().unwrap();
    assert_eq!(found.ticket.seat_number, "Y12C");

    // Reusing a ticket number collides.
    let mut uow = store.begin().await.unwrap();
    let err = uow
        .insert_tickets(&[NewTicket {
            ticket_number: "TKT-0000AAAA".to_string(),
            booking_id: booking.id,
            passenger_id,
            flight_id: d1,
            leg_id: booking.legs[0].id,
            seat_number: "Y1A".to_string(),
            gate: "G1".to_string(),
            barcode: "BAR-FFFF0000FFFF".to_string(),
        }])
        .await
        .unwrap_err();
    assert!(err.is_contention());
}

#[tokio::test]
async fn test_commit_with_dangling_ticket_applies_nothing() {
    let store = MemoryStore::new();
    let d1 = FlightRef::domestic(1);
    store.add_flight(flight(d1, 10));

    let mut uow = store.begin().await.unwrap();
    let booking = uow.insert_booking(&new_booking(5, d1)).await.unwrap();
    uow.adjust_seats(d1, CabinClass::Economy, -1).await.unwrap();
    uow.insert_tickets(&[NewTicket {
        ticket_number: "TKT-0000BBBB".to_string(),
        booking_id: booking.id,
        passenger_id: booking.passengers[0].id + 1000,
        flight_id: d1,
        leg_id: booking.legs[0].id,
        seat_number: "Y3D".to_string(),
        gate: "G2".to_string(),
        barcode: "BAR-0000BBBB0000".to_string(),
    }])
    .await
    .unwrap();

    let err = uow.commit().await.unwrap_err();
    assert!(matches!(err, StoreError::Backend(_)));

    // The booking staged ahead of the bad ticket was not applied either.
    assert_eq!(store.booking_count(), 0);
    assert_eq!(store.ticket_count(), 0);
    assert!(store.find_booking(booking.booking_number, 5).await.unwrap().is_none());
    assert_eq!(store.flight(d1).unwrap().seats.economy.available, 10);
}

#[tokio::test]
async fn test_lock_booking_serializes_writers() {
    let store = MemoryStore::new();
    let d1 = FlightRef::domestic(1);
    store.add_flight(flight(d1, 10));

    let mut uow = store.begin().await.unwrap();
    let booking = uow.insert_booking(&new_booking(3, d1)).await.unwrap();
    uow.commit().await.unwrap();

    let mut first = store.begin().await.unwrap();
    let locked = first.lock_booking(booking.booking_number, 3).await.unwrap().unwrap();
    first.set_booking_status(locked.id, BookingStatus::Cancelled).await.unwrap();

    let contender = store.clone();
    let number = booking.booking_number;
    let waiter = tokio::spawn(async move {
        let mut second = contender.begin().await.unwrap();
        let seen = second.lock_booking(number, 3).await.unwrap().unwrap();
        second.rollback().await.unwrap();
        seen.status
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());

    first.commit().await.unwrap();
    assert_eq!(waiter.await.unwrap(), BookingStatus::Cancelled);
}

#[tokio::test]
async fn test_flight_catalog_lookup() {
    let store = MemoryStore::new();
    store.add_flight(flight(FlightRef::international(4), 5));
    assert!(store.get_flight(FlightRef::international(4)).await.unwrap().is_some());
    assert!(store.get_flight(FlightRef::domestic(4)).await.unwrap().is_none());
}
