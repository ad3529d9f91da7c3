//! Demo backend: enough of an application layer to satisfy `ipmitool`
//! probes. Everything beyond Get Device ID is refused.

use ipmi_bmc::msg::{CC_INVALID_COMMAND, CC_OK, CMD_GET_DEVICE_ID, NETFN_APP};
use ipmi_bmc::{BmcBackend, DeviceInfo, Request, SessionRef};

#[derive(Default)]
pub struct DemoBackend {
    device: DeviceInfo,
}

impl BmcBackend for DemoBackend {
    fn handle_raw_request(
        &mut self,
        request: &Request,
        session: &mut SessionRef<'_>,
    ) -> ipmi_bmc::Result<()> {
        if request.net_fn == NETFN_APP && request.command == CMD_GET_DEVICE_ID {
            log::debug!("{}: get device id", session.peer());
            session.send_response(CC_OK, &self.device.response_bytes())
        } else {
            log::debug!(
                "{}: refusing netfn {:#04x} cmd {:#04x}",
                session.peer(),
                request.net_fn,
                request.command
            );
            session.send_response(CC_INVALID_COMMAND, &[])
        }
    }
}
