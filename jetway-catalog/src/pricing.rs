use jetway_core::booking::{PassengerInfo, PassengerType};
use jetway_core::error::{BookingError, BookingResult};
use jetway_core::flight::{CabinClass, Flight};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FareConfig {
    /// Share of the adult fare a child pays.
    pub child_fare_ratio: Decimal,

    /// Decimal places totals are rounded to.
    pub currency_scale: u32,
}

impl Default for FareConfig {
    fn default() -> Self {
        Self {
            child_fare_ratio: Decimal::new(75, 2),
            currency_scale: 2,
        }
    }
}

/// Pure fare computation. No I/O, no clock.
#[derive(Debug, Clone, Default)]
pub struct FareEngine {
    config: FareConfig,
}

impl FareEngine {
    pub fn new(config: FareConfig) -> Self {
        Self { config }
    }

    /// Per-passenger fare for one leg. A zero fare means the cabin is not sold.
    pub fn fare(&self, flight: &Flight, cabin: CabinClass) -> BookingResult<Decimal> {
        let fare = flight.fares.get(cabin);
        if fare.is_zero() {
            return Err(BookingError::UnavailableCabinClass {
                flight: flight.id,
                cabin,
            });
        }
        Ok(fare)
    }

    /// What a passenger of the given type pays for a base fare.
    pub fn passenger_fare(&self, base: Decimal, passenger_type: PassengerType) -> Decimal {
        match passenger_type {
            PassengerType::Adult => base,
            PassengerType::Child => base * self.config.child_fare_ratio,
        }
    }

    /// Sum of outbound and return fares, once per passenger, with the child discount.
    pub fn total_price(
        &self,
        outbound: (&Flight, CabinClass),
        inbound: Option<(&Flight, CabinClass)>,
        passengers: &[PassengerInfo],
    ) -> BookingResult<Decimal> {
        let outbound_fare = self.fare(outbound.0, outbound.1)?;
        let return_fare = match inbound {
            Some((flight, cabin)) => self.fare(flight, cabin)?,
            None => Decimal::ZERO,
        };
        let per_passenger = outbound_fare + return_fare;

        let total: Decimal = passengers
            .iter()
            .map(|p| self.passenger_fare(per_passenger, p.passenger_type))
            .sum();

        Ok(total.round_dp_with_strategy(
            self.config.currency_scale,
            RoundingStrategy::MidpointAwayFromZero,
        ))
    }
}
