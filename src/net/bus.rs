//! The bus contract (`spec.md` §6.3): connect/reconnect, subscribe,
//! publish, and an inbound message callback.
//!
//! # Design
//! `spec.md` §9 calls for the bus client to be modelled as a shared-
//! ownership value whose methods are internally synchronized, with
//! Publisher and Dispatcher both holding references and calling
//! concurrently. [`rumqttc::Client`] already has exactly that shape: it is
//! a cheap `Clone`-able handle backed by a channel to the client's own
//! event-loop thread, the hosted-ecosystem equivalent of the teacher's
//! `minimq::MqttClient` used across `NetworkUsers`'s `telemetry` and
//! `miniconf` members. `minimq` targets `embedded-nal` sockets and cannot
//! run on a hosted OS; `rumqttc` covers the same MQTT v3.1.1 concern
//! (pub/sub, QoS 0/1, automatic reconnect) over a standard TCP stack, so it
//! is the crate substituted here (see `DESIGN.md`).
/// Delivery guarantee for a published message, per `spec.md` §6.3/§6.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
}

impl From<Qos> for rumqttc::QoS {
    fn from(qos: Qos) -> Self {
        match qos {
            Qos::AtMostOnce => rumqttc::QoS::AtMostOnce,
            Qos::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        }
    }
}

/// A bus publish/subscribe client, narrowed to the operations the core
/// uses. A trait so the Publisher and Dispatcher can be exercised against
/// an in-memory fake without a live broker.
pub trait BusClient: Send + Sync {
    fn publish(&self, topic: &str, payload: &[u8], qos: Qos, retained: bool) -> Result<(), String>;
    fn subscribe(&self, topic: &str, qos: Qos) -> Result<(), String>;
    /// Force the underlying connection closed, unblocking a thread parked
    /// on the event loop so shutdown can join it.
    fn disconnect(&self);
}

/// A [`BusClient`] backed by a live `rumqttc` MQTT connection.
#[derive(Clone)]
pub struct RumqttcBus {
    client: rumqttc::Client,
}

impl RumqttcBus {
    pub fn new(client: rumqttc::Client) -> Self {
        Self { client }
    }
}

impl BusClient for RumqttcBus {
    fn publish(&self, topic: &str, payload: &[u8], qos: Qos, retained: bool) -> Result<(), String> {
        self.client
            .clone()
            .publish(topic, qos.into(), retained, payload.to_vec())
            .map_err(|err| err.to_string())
    }

    fn subscribe(&self, topic: &str, qos: Qos) -> Result<(), String> {
        self.client
            .clone()
            .subscribe(topic, qos.into())
            .map_err(|err| err.to_string())
    }

    fn disconnect(&self) {
        let _ = self.client.clone().disconnect();
    }
}
