//! Dataset loading. The analytical core never knows which source the
//! records came from.

pub mod payload;
pub mod provider;

pub use payload::{parse_api_payload, parse_payload_value, save_fallback, FallbackFile};
pub use provider::{CsvProvider, DataProvider, JsonFileProvider, ProviderChain, SampleProvider};
