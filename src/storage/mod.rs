mod key_value;
mod model;

pub use key_value::{FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore, StoreError};
pub use model::{
    ALARMS_KEY, AlarmRecord, DecodedAlarms, SETTINGS_KEY, SETTINGS_VERSION, SettingsRecord,
    decode_alarms, decode_settings, encode_alarms, encode_settings,
};
