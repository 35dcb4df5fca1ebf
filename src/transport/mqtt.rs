//! MQTT event bus.
//!
//! The rumqttc connection is driven on its own thread; publishing only queues
//! a request and never blocks the caller. Messages go out at QoS 0 and are not
//! retained.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rumqttc::v5::{mqttbytes::QoS, Client, Connection, Event, MqttOptions};

use super::endpoint::{build_transport, check_broker_policy, parse_mqtt_endpoint, TlsMaterials};
use crate::config::MqttSettings;
use crate::publish::EventBus;

/// Outgoing requests buffered between the client and its event loop.
const REQUEST_CAPACITY: usize = 64;
const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

pub struct MqttBus {
    client: Client,
    closing: Arc<AtomicBool>,
    connection_handle: Option<JoinHandle<()>>,
}

impl MqttBus {
    /// Validate the endpoint, build the transport and start the event loop.
    pub fn connect(settings: &MqttSettings) -> Result<Self> {
        let endpoint = parse_mqtt_endpoint(&settings.broker_addr, settings.use_tls)?;
        check_broker_policy(&endpoint, settings.allow_remote)?;
        let tls = TlsMaterials::from_settings(settings)?;

        let mut options = MqttOptions::new(&settings.client_id, &endpoint.host, endpoint.port);
        options.set_keep_alive(settings.keep_alive);
        options.set_clean_start(true);
        if let Some(user) = settings.username.as_deref() {
            options.set_credentials(user, settings.password.as_deref().unwrap_or_default());
        }
        options.set_transport(build_transport(&endpoint, &tls)?);

        let (client, connection) = Client::new(options, REQUEST_CAPACITY);
        let closing = Arc::new(AtomicBool::new(false));
        let handle = spawn_connection(connection, closing.clone())?;

        log::info!(
            "MQTT event bus started for {} (auth: {})",
            endpoint,
            settings.username.is_some()
        );
        Ok(Self {
            client,
            closing,
            connection_handle: Some(handle),
        })
    }

    /// Send a DISCONNECT and wait for the event loop to finish.
    pub fn disconnect(mut self) -> Result<()> {
        self.closing.store(true, Ordering::SeqCst);
        self.client
            .disconnect()
            .map_err(|e| anyhow!("MQTT disconnect failed: {}", e))?;
        if let Some(handle) = self.connection_handle.take() {
            let _ = handle.join();
        }
        log::info!("MQTT event bus disconnected");
        Ok(())
    }
}

impl EventBus for MqttBus {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .map_err(|e| anyhow!("MQTT publish queue rejected message: {}", e))
    }
}

fn spawn_connection(mut connection: Connection, closing: Arc<AtomicBool>) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("mqtt-connection".to_string())
        .spawn(move || {
            for event in connection.iter() {
                match event {
                    Ok(Event::Incoming(_)) | Ok(Event::Outgoing(_)) => {}
                    Err(e) => {
                        if closing.load(Ordering::SeqCst) {
                            break;
                        }
                        log::warn!("MQTT connection error: {}", e);
                        std::thread::sleep(RECONNECT_BACKOFF);
                    }
                }
            }
        })
        .context("spawn MQTT connection thread")
}
