//! Wireless link: advertising, the single peer connection, and the
//! outbound frame queue with its drain task

mod manager;
mod radio;

pub use manager::{LinkError, LinkManager, LinkSettings};
pub use radio::{
    AdvertisingData, ConnectionHandle, PeerScript, RadioDriver, RadioError, RadioEvent,
    SimulatedRadio, CHARACTERISTIC_UUID, SERVICE_UUID,
};
