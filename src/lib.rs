pub mod bus;
pub mod config;
pub mod crc;
pub mod error;
pub mod frame;
pub mod metrics;
pub mod monitor;
pub mod registers;
pub mod stream;
pub mod transaction;


pub use bus::{Bus, LiveBus};
pub use config::Config;
pub use error::{FinitudeError, Result};
pub use frame::{Address, AssembledFrame, Function, ParsedFrame};
pub use monitor::{MonitorBuilder, MonitorHandle, MonitorSnapshot};
pub use registers::{DecodedRegister, Value};
pub use stream::BusStream;
