//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements         | Connects to              |
//! |-------------|--------------------|--------------------------|
//! | `hardware`  | SensorPort         | I²C / DHT22 / 1-Wire     |
//! |             | ActuatorPort       | Relay GPIOs              |
//! | `journal`   | RecordJournal      | StoragePort slot ring    |
//! | `log_sink`  | EventSink          | Serial log output        |
//! | `nvs`       | ConfigPort         | NVS / in-memory store    |
//! |             | CalibrationPort    |                          |
//! |             | StoragePort        |                          |
//! | `time`      | Clock              | ESP32 system timer       |
//! | `device_id` | -                  | eFuse MAC, hardware RNG  |

pub mod device_id;
pub mod hardware;
pub mod journal;
pub mod log_sink;
pub mod nvs;
pub mod time;
