//! MQTT transport for occupancy events.
//!
//! `MqttBus` is the production `EventBus`. Endpoint parsing, the loopback
//! policy and TLS material loading live in `endpoint`.

mod endpoint;
mod mqtt;

pub use endpoint::{
    build_transport, check_broker_policy, parse_mqtt_endpoint, MqttEndpoint, TlsMaterials,
};
pub use mqtt::MqttBus;
