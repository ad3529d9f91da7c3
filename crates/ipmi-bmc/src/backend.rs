//! Adapter between decoded in-session requests and user command handlers.

use std::net::SocketAddr;

use ipmi_msg::{CC_INVALID_COMMAND, LanMessage};
use ipmi_transport::PacketSink;

use crate::session::Session;

/// A decoded in-session IPMI request, as handed to a [`BmcBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub net_fn: u8,
    pub command: u8,
    pub data: Vec<u8>,
}

impl From<&LanMessage> for Request {
    fn from(msg: &LanMessage) -> Self {
        Self {
            net_fn: msg.net_fn,
            command: msg.command,
            data: msg.data.clone(),
        }
    }
}

/// Handle a backend uses to answer on the originating session.
pub struct SessionRef<'a> {
    session: &'a mut Session,
    sink: &'a dyn PacketSink,
    request: &'a LanMessage,
    responded: bool,
    close_requested: bool,
}

impl<'a> SessionRef<'a> {
    pub(crate) fn new(
        session: &'a mut Session,
        sink: &'a dyn PacketSink,
        request: &'a LanMessage,
    ) -> Self {
        Self {
            session,
            sink,
            request,
            responded: false,
            close_requested: false,
        }
    }

    /// Sends an IPMI response with the given completion code and body.
    pub fn send_response(&mut self, code: u8, data: &[u8]) -> crate::Result<()> {
        self.session
            .send_response(self.request, code, data, self.sink)?;
        self.responded = true;
        Ok(())
    }

    /// Tears the session down once the current packet is finished.
    pub fn close(&mut self) {
        self.close_requested = true;
    }

    pub fn peer(&self) -> SocketAddr {
        self.session.peer()
    }

    /// Privilege level currently negotiated on the session.
    pub fn privilege(&self) -> u8 {
        self.session.privilege()
    }

    pub(crate) fn responded(&self) -> bool {
        self.responded
    }

    pub(crate) fn close_requested(&self) -> bool {
        self.close_requested
    }
}

/// Command handler behind the session layer. Requests arrive fully
/// decoded and authenticated; responses go back sealed.
pub trait BmcBackend {
    fn handle_raw_request(
        &mut self,
        request: &Request,
        session: &mut SessionRef<'_>,
    ) -> crate::Result<()>;
}

/// Default backend: answers every command with completion 0xC1
/// ("invalid command").
#[derive(Debug, Default)]
pub struct RejectAllBackend;

impl BmcBackend for RejectAllBackend {
    fn handle_raw_request(
        &mut self,
        _request: &Request,
        session: &mut SessionRef<'_>,
    ) -> crate::Result<()> {
        session.send_response(CC_INVALID_COMMAND, &[])
    }
}

/// Identity reported by Get Device ID.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub device_id: u8,
    pub revision: u8,
    pub firmware_major: u8,
    pub firmware_minor: u8,
    pub manufacturer_id: u32,
    pub product_id: u32,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            device_id: 0,
            revision: 0,
            firmware_major: 1,
            firmware_minor: 0,
            manufacturer_id: 0,
            product_id: 0,
        }
    }
}

impl DeviceInfo {
    /// IPMI version byte reported alongside the identity.
    pub const IPMI_VERSION: u8 = 2;

    /// Get Device ID response body, completion code excluded.
    pub fn response_bytes(&self) -> Vec<u8> {
        let mut out = vec![
            self.device_id,
            self.revision,
            self.firmware_major,
            self.firmware_minor,
            Self::IPMI_VERSION,
            0, // no additional device support
        ];
        out.extend_from_slice(&self.manufacturer_id.to_le_bytes());
        out.extend_from_slice(&self.product_id.to_le_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_info_layout() {
        let info = DeviceInfo {
            device_id: 0x23,
            manufacturer_id: 0x1234,
            product_id: 2,
            ..Default::default()
        };
        assert_eq!(
            info.response_bytes(),
            vec![0x23, 0, 1, 0, 2, 0, 0x34, 0x12, 0, 0, 0x02, 0, 0, 0]
        );
    }
}
