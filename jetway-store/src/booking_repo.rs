use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use jetway_core::booking::{
    Booking, BookingHistoryQuery, BookingLeg, BookingPassenger, BookingStatus, NewBooking,
    NewTicket, SortOrder, Ticket, TicketHolder, TicketStatus, TicketWithLeg,
};
use jetway_core::error::StoreError;
use jetway_core::flight::{CabinClass, Flight, FlightKind, FlightRef, FlightStatus};
use jetway_core::repository::{BookingStore, FlightCatalog, UnitOfWork};
use jetway_shared::Masked;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::database::db_err;
use crate::flight_repo::{self, parse_column};

const BOOKING_COLUMNS: &str =
    "id, booking_number, user_id, trip_type, cabin_class, total_amount, status, created_at";
const TICKET_COLUMNS: &str =
    "id, ticket_number, booking_id, passenger_id, flight_id, leg_id, seat_number, gate, barcode, status";

/// PostgreSQL-backed booking store. Every unit of work is one database transaction.
#[derive(Clone)]
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal row structs for runtime-checked queries
#[derive(sqlx::FromRow)]
struct BookingRow {
    id: i64,
    booking_number: Uuid,
    user_id: i64,
    trip_type: String,
    cabin_class: String,
    total_amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct LegRow {
    id: i64,
    booking_id: i64,
    flight_id: String,
    flight_type: String,
    direction: String,
    cabin_class: String,
    departs_at: DateTime<Utc>,
    fare_amount: Decimal,
}

#[derive(sqlx::FromRow)]
struct PassengerRow {
    id: i64,
    booking_id: i64,
    first_name: String,
    last_name: String,
    passenger_type: String,
    gender: String,
    dob: NaiveDate,
    passport_number: Option<String>,
    passport_expiry: Option<NaiveDate>,
    nationality: Option<String>,
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: i64,
    ticket_number: String,
    booking_id: i64,
    passenger_id: i64,
    flight_id: String,
    leg_id: i64,
    seat_number: String,
    gate: String,
    barcode: String,
    status: String,
}

impl TicketRow {
    fn into_ticket(self) -> Result<Ticket, StoreError> {
        Ok(Ticket {
            id: self.id,
            flight_id: parse_column(&self.flight_id, "ticket flight_id")?,
            status: parse_column(&self.status, "ticket status")?,
            ticket_number: self.ticket_number,
            booking_id: self.booking_id,
            passenger_id: self.passenger_id,
            leg_id: self.leg_id,
            seat_number: self.seat_number,
            gate: self.gate,
            barcode: self.barcode,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TicketLegRow {
    #[sqlx(flatten)]
    ticket: TicketRow,
    departs_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct HolderRow {
    user_id: i64,
    ticket_number: String,
    passenger_name: String,
    departs_at: DateTime<Utc>,
}

/// Load legs, passengers and tickets for a set of booking rows and build the aggregates,
/// preserving the order of `rows`.
async fn assemble(conn: &mut PgConnection, rows: Vec<BookingRow>) -> Result<Vec<Booking>, StoreError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

    let legs: Vec<LegRow> = sqlx::query_as(
        "SELECT id, booking_id, flight_id, flight_type, direction, cabin_class, departs_at, fare_amount \
         FROM booking_flights WHERE booking_id = ANY($1) ORDER BY id",
    )
    .bind(ids.as_slice())
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;

    let passengers: Vec<PassengerRow> = sqlx::query_as(
        "SELECT id, booking_id, first_name, last_name, passenger_type, gender, dob, \
         passport_number, passport_expiry, nationality \
         FROM booking_passengers WHERE booking_id = ANY($1) ORDER BY id",
    )
    .bind(ids.as_slice())
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;

    let ticket_sql = format!(
        "SELECT {} FROM tickets WHERE booking_id = ANY($1) ORDER BY id",
        TICKET_COLUMNS
    );
    let tickets: Vec<TicketRow> = sqlx::query_as(&ticket_sql)
        .bind(ids.as_slice())
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err)?;

    let mut legs_by_booking: HashMap<i64, Vec<BookingLeg>> = HashMap::new();
    for leg in legs {
        legs_by_booking.entry(leg.booking_id).or_default().push(BookingLeg {
            id: leg.id,
            booking_id: leg.booking_id,
            flight_id: parse_column(&leg.flight_id, "leg flight_id")?,
            flight_kind: parse_column(&leg.flight_type, "leg flight_type")?,
            direction: parse_column(&leg.direction, "leg direction")?,
            cabin_class: parse_column(&leg.cabin_class, "leg cabin_class")?,
            departs_at: leg.departs_at,
            fare_amount: leg.fare_amount,
        });
    }

    let mut tickets_by_passenger: HashMap<i64, Vec<Ticket>> = HashMap::new();
    for ticket in tickets {
        let ticket = ticket.into_ticket()?;
        tickets_by_passenger.entry(ticket.passenger_id).or_default().push(ticket);
    }

    let mut passengers_by_booking: HashMap<i64, Vec<BookingPassenger>> = HashMap::new();
    for p in passengers {
        passengers_by_booking.entry(p.booking_id).or_default().push(BookingPassenger {
            id: p.id,
            booking_id: p.booking_id,
            passenger_type: parse_column(&p.passenger_type, "passenger_type")?,
            gender: parse_column(&p.gender, "gender")?,
            tickets: tickets_by_passenger.remove(&p.id).unwrap_or_default(),
            first_name: p.first_name,
            last_name: p.last_name,
            dob: p.dob,
            passport_number: p.passport_number.map(Masked),
            passport_expiry: p.passport_expiry,
            nationality: p.nationality,
        });
    }

    rows.into_iter()
        .map(|row| -> Result<Booking, StoreError> {
            Ok(Booking {
                id: row.id,
                booking_number: row.booking_number,
                user_id: row.user_id,
                trip_type: parse_column(&row.trip_type, "trip_type")?,
                cabin_class: row.cabin_class,
                total_amount: row.total_amount,
                status: parse_column(&row.status, "booking status")?,
                created_at: row.created_at,
                legs: legs_by_booking.remove(&row.id).unwrap_or_default(),
                passengers: passengers_by_booking.remove(&row.id).unwrap_or_default(),
            })
        })
        .collect()
}

fn push_history_filters(qb: &mut QueryBuilder<'_, Postgres>, user_id: i64, query: &BookingHistoryQuery) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(trip_type) = query.trip_type {
        qb.push(" AND trip_type = ").push_bind(trip_type.as_str());
    }
}

#[async_trait]
impl FlightCatalog for PgBookingStore {
    async fn get_flight(&self, id: FlightRef) -> Result<Option<Flight>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        flight_repo::fetch_flight(&mut conn, id).await
    }

    async fn search_flights(
        &self,
        origin: &str,
        destination: &str,
        weekday: i32,
    ) -> Result<Vec<Flight>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        let mut flights = Vec::new();
        for kind in FlightKind::ALL {
            flights.extend(flight_repo::search(&mut conn, kind, origin, destination, weekday).await?);
        }
        Ok(flights)
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn find_booking(&self, booking_number: Uuid, user_id: i64) -> Result<Option<Booking>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        let sql = format!(
            "SELECT {} FROM bookings WHERE booking_number = $1 AND user_id = $2",
            BOOKING_COLUMNS
        );
        let row: Option<BookingRow> = sqlx::query_as(&sql)
            .bind(booking_number)
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => Ok(assemble(&mut conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_bookings(
        &self,
        user_id: i64,
        query: &BookingHistoryQuery,
    ) -> Result<(Vec<Booking>, u64), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM bookings");
        push_history_filters(&mut count_qb, user_id, query);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&mut *conn)
            .await
            .map_err(db_err)?;

        let direction = match query.sort_order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM bookings", BOOKING_COLUMNS));
        push_history_filters(&mut qb, user_id, query);
        qb.push(format!(" ORDER BY created_at {d}, id {d}", d = direction));
        qb.push(" LIMIT ").push_bind(query.limit.max(1) as i64);
        qb.push(" OFFSET ").push_bind(query.offset() as i64);

        let rows: Vec<BookingRow> = qb
            .build_query_as()
            .fetch_all(&mut *conn)
            .await
            .map_err(db_err)?;

        let bookings = assemble(&mut conn, rows).await?;
        Ok((bookings, total.max(0) as u64))
    }

    async fn find_ticket(&self, ticket_number: &str) -> Result<Option<TicketWithLeg>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        let row: Option<TicketLegRow> = sqlx::query_as(
            "SELECT t.id, t.ticket_number, t.booking_id, t.passenger_id, t.flight_id, t.leg_id, \
                    t.seat_number, t.gate, t.barcode, t.status, bf.departs_at \
             FROM tickets t \
             JOIN booking_flights bf ON bf.id = t.leg_id \
             WHERE t.ticket_number = $1",
        )
        .bind(ticket_number)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;

        row.map(|r| -> Result<TicketWithLeg, StoreError> {
            Ok(TicketWithLeg {
                ticket: r.ticket.into_ticket()?,
                departs_at: r.departs_at,
            })
        })
        .transpose()
    }

    async fn ticket_holders(
        &self,
        flight: FlightRef,
        after: DateTime<Utc>,
    ) -> Result<Vec<TicketHolder>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        let rows: Vec<HolderRow> = sqlx::query_as(
            "SELECT b.user_id, t.ticket_number, \
                    p.first_name || ' ' || p.last_name AS passenger_name, bf.departs_at \
             FROM tickets t \
             JOIN bookings b ON b.id = t.booking_id \
             JOIN booking_passengers p ON p.id = t.passenger_id \
             JOIN booking_flights bf ON bf.id = t.leg_id \
             WHERE t.flight_id = $1 AND t.status = $2 AND bf.departs_at > $3 \
             ORDER BY b.user_id, t.id",
        )
        .bind(flight.to_string())
        .bind(BookingStatus::Confirmed.as_str())
        .bind(after)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|r| TicketHolder {
                user_id: r.user_id,
                ticket_number: r.ticket_number,
                passenger_name: r.passenger_name,
                departs_at: r.departs_at,
            })
            .collect())
    }

    async fn user_email(&self, user_id: i64) -> Result<Option<String>, StoreError> {
        sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }
}

/// One database transaction. Dropped without `commit`, sqlx rolls it back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn insert_booking(&mut self, booking: &NewBooking) -> Result<Booking, StoreError> {
        let (id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
            "INSERT INTO bookings (booking_number, user_id, trip_type, cabin_class, total_amount, status) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, created_at",
        )
        .bind(booking.booking_number)
        .bind(booking.user_id)
        .bind(booking.trip_type.as_str())
        .bind(&booking.cabin_class)
        .bind(booking.total_amount)
        .bind(BookingStatus::Confirmed.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err)?;

        let mut legs = Vec::with_capacity(booking.legs.len());
        for leg in &booking.legs {
            let leg_id: i64 = sqlx::query_scalar(
                "INSERT INTO booking_flights \
                 (booking_id, flight_id, flight_type, direction, cabin_class, departs_at, fare_amount) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 RETURNING id",
            )
            .bind(id)
            .bind(leg.flight_id.to_string())
            .bind(leg.flight_id.kind.as_str())
            .bind(leg.direction.as_str())
            .bind(leg.cabin_class.as_str())
            .bind(leg.departs_at)
            .bind(leg.fare_amount)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_err)?;

            legs.push(BookingLeg {
                id: leg_id,
                booking_id: id,
                flight_id: leg.flight_id,
                flight_kind: leg.flight_id.kind,
                direction: leg.direction,
                cabin_class: leg.cabin_class,
                departs_at: leg.departs_at,
                fare_amount: leg.fare_amount,
            });
        }

        let mut passengers = Vec::with_capacity(booking.passengers.len());
        for p in &booking.passengers {
            let passenger_id: i64 = sqlx::query_scalar(
                "INSERT INTO booking_passengers \
                 (booking_id, first_name, last_name, passenger_type, gender, dob, \
                  passport_number, passport_expiry, nationality) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                 RETURNING id",
            )
            .bind(id)
            .bind(&p.first_name)
            .bind(&p.last_name)
            .bind(p.passenger_type.as_str())
            .bind(p.gender.as_str())
            .bind(p.dob)
            .bind(p.passport_number.as_ref().map(|m| m.expose().clone()))
            .bind(p.passport_expiry)
            .bind(&p.nationality)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_err)?;

            passengers.push(BookingPassenger {
                id: passenger_id,
                booking_id: id,
                first_name: p.first_name.clone(),
                last_name: p.last_name.clone(),
                passenger_type: p.passenger_type,
                gender: p.gender,
                dob: p.dob,
                passport_number: p.passport_number.clone(),
                passport_expiry: p.passport_expiry,
                nationality: p.nationality.clone(),
                tickets: Vec::new(),
            });
        }

        Ok(Booking {
            id,
            booking_number: booking.booking_number,
            user_id: booking.user_id,
            trip_type: booking.trip_type,
            cabin_class: booking.cabin_class.clone(),
            total_amount: booking.total_amount,
            status: BookingStatus::Confirmed,
            created_at,
            legs,
            passengers,
        })
    }

    async fn insert_tickets(&mut self, tickets: &[NewTicket]) -> Result<Vec<Ticket>, StoreError> {
        let mut issued = Vec::with_capacity(tickets.len());
        for t in tickets {
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO tickets \
                 (ticket_number, booking_id, passenger_id, flight_id, leg_id, seat_number, gate, barcode, status) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                 RETURNING id",
            )
            .bind(&t.ticket_number)
            .bind(t.booking_id)
            .bind(t.passenger_id)
            .bind(t.flight_id.to_string())
            .bind(t.leg_id)
            .bind(&t.seat_number)
            .bind(&t.gate)
            .bind(&t.barcode)
            .bind(BookingStatus::Confirmed.as_str())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_err)?;

            issued.push(Ticket {
                id,
                ticket_number: t.ticket_number.clone(),
                booking_id: t.booking_id,
                passenger_id: t.passenger_id,
                flight_id: t.flight_id,
                leg_id: t.leg_id,
                seat_number: t.seat_number.clone(),
                gate: t.gate.clone(),
                barcode: t.barcode.clone(),
                status: BookingStatus::Confirmed,
            });
        }
        Ok(issued)
    }

    async fn adjust_seats(
        &mut self,
        flight: FlightRef,
        cabin: CabinClass,
        delta: i32,
    ) -> Result<i32, StoreError> {
        flight_repo::adjust_seats(&mut self.tx, flight, cabin, delta).await
    }

    async fn lock_booking(&mut self, booking_number: Uuid, user_id: i64) -> Result<Option<Booking>, StoreError> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE booking_number = $1 AND user_id = $2 FOR UPDATE",
            BOOKING_COLUMNS
        );
        let row: Option<BookingRow> = sqlx::query_as(&sql)
            .bind(booking_number)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => Ok(assemble(&mut self.tx, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn set_booking_status(&mut self, booking_id: i64, status: BookingStatus) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE bookings SET status = $2 WHERE id = $1")
            .bind(booking_id)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("booking id {}", booking_id)));
        }
        Ok(())
    }

    async fn set_ticket_status(&mut self, booking_id: i64, status: TicketStatus) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE tickets SET status = $2 WHERE booking_id = $1")
            .bind(booking_id)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn set_flight_delay(
        &mut self,
        flight: FlightRef,
        delay_minutes: i32,
        status: FlightStatus,
    ) -> Result<Option<Flight>, StoreError> {
        flight_repo::set_delay(&mut self.tx, flight, delay_minutes, status).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(db_err)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(db_err)
    }
}
