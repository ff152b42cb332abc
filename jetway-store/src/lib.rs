pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod events;
mod flight_repo;
pub mod memory;
pub mod redis_repo;

pub use app_config::Config;
pub use booking_repo::PgBookingStore;
pub use database::DbClient;
pub use events::{EventProducer, KafkaNotificationSink};
pub use memory::MemoryStore;
pub use redis_repo::RedisClient;
