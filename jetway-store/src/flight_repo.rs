use std::fmt::Display;
use std::str::FromStr;

use chrono::NaiveTime;
use jetway_core::error::StoreError;
use jetway_core::flight::{
    CabinClass, CabinFares, CabinSeats, Flight, FlightKind, FlightRef, FlightStatus, SeatCount,
};
use rust_decimal::Decimal;
use sqlx::PgConnection;

use crate::database::db_err;

const FLIGHT_COLUMNS: &str = "id, flight_no, airline, origin, destination, depart_time, depart_weekday, \
     duration_minutes, economy_fare, business_fare, first_fare, economy_total, economy_available, \
     business_total, business_available, first_total, first_available, delay_minutes, status";

/// Backing table for a flight partition.
pub(crate) fn table(kind: FlightKind) -> &'static str {
    match kind {
        FlightKind::Domestic => "domestic_flights",
        FlightKind::International => "international_flights",
    }
}

/// `(available, total)` column names for a cabin.
fn seat_columns(cabin: CabinClass) -> (&'static str, &'static str) {
    match cabin {
        CabinClass::Economy => ("economy_available", "economy_total"),
        CabinClass::Business => ("business_available", "business_total"),
        CabinClass::First => ("first_available", "first_total"),
    }
}

pub(crate) fn parse_column<T, E>(value: &str, column: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = E>,
    E: Display,
{
    value
        .parse()
        .map_err(|e| StoreError::Backend(format!("corrupt {} value {:?}: {}", column, value, e)))
}

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: i64,
    flight_no: String,
    airline: String,
    origin: String,
    destination: String,
    depart_time: NaiveTime,
    depart_weekday: i32,
    duration_minutes: i32,
    economy_fare: Decimal,
    business_fare: Decimal,
    first_fare: Decimal,
    economy_total: i32,
    economy_available: i32,
    business_total: i32,
    business_available: i32,
    first_total: i32,
    first_available: i32,
    delay_minutes: i32,
    status: String,
}

impl FlightRow {
    fn into_flight(self, kind: FlightKind) -> Result<Flight, StoreError> {
        let number = u32::try_from(self.id)
            .map_err(|_| StoreError::Backend(format!("flight id {} out of range", self.id)))?;
        Ok(Flight {
            id: FlightRef { kind, number },
            flight_no: self.flight_no,
            airline: self.airline,
            origin: self.origin,
            destination: self.destination,
            depart_time: self.depart_time,
            depart_weekday: self.depart_weekday,
            duration_minutes: self.duration_minutes,
            fares: CabinFares {
                economy: self.economy_fare,
                business: self.business_fare,
                first: self.first_fare,
            },
            seats: CabinSeats {
                economy: SeatCount { total: self.economy_total, available: self.economy_available },
                business: SeatCount { total: self.business_total, available: self.business_available },
                first: SeatCount { total: self.first_total, available: self.first_available },
            },
            delay_minutes: self.delay_minutes,
            status: parse_column(&self.status, "flight status")?,
        })
    }
}

pub(crate) async fn fetch_flight(conn: &mut PgConnection, id: FlightRef) -> Result<Option<Flight>, StoreError> {
    let sql = format!("SELECT {} FROM {} WHERE id = $1", FLIGHT_COLUMNS, table(id.kind));
    let row: Option<FlightRow> = sqlx::query_as(&sql)
        .bind(id.number as i64)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;
    row.map(|r| r.into_flight(id.kind)).transpose()
}

/// One partition's flights on a route for a schedule weekday.
pub(crate) async fn search(
    conn: &mut PgConnection,
    kind: FlightKind,
    origin: &str,
    destination: &str,
    weekday: i32,
) -> Result<Vec<Flight>, StoreError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE origin = $1 AND destination = $2 AND depart_weekday = $3 ORDER BY id",
        FLIGHT_COLUMNS,
        table(kind)
    );
    let rows: Vec<FlightRow> = sqlx::query_as(&sql)
        .bind(origin)
        .bind(destination)
        .bind(weekday)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err)?;
    rows.into_iter().map(|r| r.into_flight(kind)).collect()
}

/// Guarded `available += delta`. The WHERE clause keeps the counter inside `[0, total]`;
/// a lost race matches no row and is reported as `SeatUpdateRejected`.
pub(crate) async fn adjust_seats(
    conn: &mut PgConnection,
    flight: FlightRef,
    cabin: CabinClass,
    delta: i32,
) -> Result<i32, StoreError> {
    let (available, total) = seat_columns(cabin);
    let sql = format!(
        "UPDATE {table} SET {available} = {available} + $2 \
         WHERE id = $1 AND {available} + $2 >= 0 AND {available} + $2 <= {total} \
         RETURNING {available}",
        table = table(flight.kind),
        available = available,
        total = total,
    );

    let remaining: Option<i32> = sqlx::query_scalar(&sql)
        .bind(flight.number as i64)
        .bind(delta)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;

    match remaining {
        Some(remaining) => Ok(remaining),
        None => {
            let exists_sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)", table(flight.kind));
            let exists: bool = sqlx::query_scalar(&exists_sql)
                .bind(flight.number as i64)
                .fetch_one(&mut *conn)
                .await
                .map_err(db_err)?;
            if exists {
                Err(StoreError::SeatUpdateRejected { flight, cabin, delta })
            } else {
                Err(StoreError::NotFound(format!("flight {}", flight)))
            }
        }
    }
}

pub(crate) async fn set_delay(
    conn: &mut PgConnection,
    flight: FlightRef,
    delay_minutes: i32,
    status: FlightStatus,
) -> Result<Option<Flight>, StoreError> {
    let sql = format!(
        "UPDATE {} SET delay_minutes = $2, status = $3 WHERE id = $1 RETURNING {}",
        table(flight.kind),
        FLIGHT_COLUMNS
    );
    let row: Option<FlightRow> = sqlx::query_as(&sql)
        .bind(flight.number as i64)
        .bind(delay_minutes)
        .bind(status.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;
    row.map(|r| r.into_flight(flight.kind)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_routing() {
        assert_eq!(table(FlightRef::domestic(1).kind), "domestic_flights");
        assert_eq!(table(FlightRef::international(1).kind), "international_flights");
        assert_eq!(seat_columns(CabinClass::Business), ("business_available", "business_total"));
    }

    #[test]
    fn test_parse_column_reports_corruption() {
        let ok: FlightStatus = parse_column("DELAYED", "flight status").unwrap();
        assert_eq!(ok, FlightStatus::Delayed);
        let err = parse_column::<FlightStatus, _>("LATE", "flight status").unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
