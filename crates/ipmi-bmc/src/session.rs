//! Server-side RMCP+ session: the RAKP handshake and active-session
//! command dispatch.

mod keys;
mod seal;

pub use keys::SessionKeys;

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use binrw::BinRead;
use ipmi_msg::{
    AlgorithmPayload, CC_OK, CC_PRIVILEGE_LIMIT, CMD_CLOSE_SESSION,
    CMD_SET_SESSION_PRIVILEGE_LEVEL, LanMessage, NETFN_APP, OpenSessionResponse, PRIVILEGE_ADMIN,
    PRIVILEGE_CALLBACK, PayloadKind, RAKP_STATUS_NO_ERRORS, RakpMessage1, RakpMessage2,
    RakpMessage3, RakpMessage4, V2Packet,
};
use ipmi_transport::PacketSink;

use crate::auth::AuthStore;
use crate::backend::{BmcBackend, Request, SessionRef};
use crate::crypto::EntropySource;
use crate::event::{ProtocolEvent, ProtocolObserver};
use crate::Error;

/// Lifecycle of a server-side session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Open-session exchange done, waiting for RAKP1.
    AwaitRakp1,
    /// RAKP2 sent, waiting for the console to prove itself.
    AwaitRakp3,
    /// Keys derived; payloads are sealed both ways.
    Active,
    /// A reply could not be transmitted to the peer; the table drops the
    /// session without a word on the wire.
    Broken,
    /// Closed by request or displaced by a new open-session exchange.
    Closed,
}

/// What the session table should do with a session after it handled a
/// packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Keep,
    Close,
}

/// Collaborators a session needs while handling one packet. Owned by the
/// server, borrowed for the duration of the dispatch.
pub(crate) struct SessionCtx<'a> {
    pub auth: &'a dyn AuthStore,
    pub kg: Option<&'a [u8]>,
    pub entropy: &'a mut dyn EntropySource,
    pub backend: &'a mut dyn BmcBackend,
    pub observer: &'a mut dyn ProtocolObserver,
    pub sink: &'a dyn PacketSink,
}

/// One console's session, from open-session exchange to close.
pub struct Session {
    peer: SocketAddr,
    /// Session id chosen by the console, echoed in every reply and used as
    /// the outbound session id once active.
    remote_session_id: u32,
    /// Server-chosen id, kept as raw wire bytes; inbound packets carry its
    /// little-endian u32 reading.
    managed_session_id: [u8; 4],
    guid: [u8; 16],
    /// Role byte from RAKP1; the low three bits cap the privilege level.
    role: u8,
    username: Vec<u8>,
    k_uid: Vec<u8>,
    k_g: Vec<u8>,
    remote_random: [u8; 16],
    managed_random: [u8; 16],
    keys: Option<SessionKeys>,
    state: SessionState,
    privilege: u8,
    seq_out: u32,
    /// Highest inbound sequence number accepted so far; anything at or
    /// below it is treated as replay.
    seq_in_floor: u32,
    last_seen: Instant,
}

impl Session {
    pub(crate) fn new(
        peer: SocketAddr,
        remote_session_id: u32,
        managed_session_id: [u8; 4],
        guid: [u8; 16],
        now: Instant,
    ) -> Self {
        Self {
            peer,
            remote_session_id,
            managed_session_id,
            guid,
            role: 0,
            username: Vec::new(),
            k_uid: Vec::new(),
            k_g: Vec::new(),
            remote_random: [0; 16],
            managed_random: [0; 16],
            keys: None,
            state: SessionState::AwaitRakp1,
            privilege: PRIVILEGE_CALLBACK,
            seq_out: 0,
            seq_in_floor: 0,
            last_seen: now,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn privilege(&self) -> u8 {
        self.privilege
    }

    pub(crate) fn managed_session_id(&self) -> [u8; 4] {
        self.managed_session_id
    }

    /// Maximum privilege the console asked for in RAKP1.
    pub fn max_privilege(&self) -> u8 {
        self.role & 0b111
    }

    pub(crate) fn expired(&self, now: Instant, timeout: Duration) -> bool {
        now.duration_since(self.last_seen) > timeout
    }

    pub(crate) fn mark_closed(&mut self) {
        self.state = SessionState::Closed;
    }

    pub(crate) fn mark_broken(&mut self) {
        self.state = SessionState::Broken;
    }

    /// Open Session Response payload for this session. Cipher suite 3 is
    /// the only thing on offer, whatever the console proposed.
    pub(crate) fn open_session_response(&self, tag: u8) -> OpenSessionResponse {
        let (authentication, integrity, confidentiality) = AlgorithmPayload::suite3();
        OpenSessionResponse {
            message_tag: tag,
            status: RAKP_STATUS_NO_ERRORS,
            max_privilege: PRIVILEGE_ADMIN,
            remote_session_id: self.remote_session_id,
            managed_session_id: u32::from_le_bytes(self.managed_session_id),
            authentication,
            integrity,
            confidentiality,
        }
    }

    /// Handles one inbound packet addressed to this session.
    pub(crate) fn handle_payload(
        &mut self,
        datagram: &[u8],
        packet: &V2Packet,
        ctx: &mut SessionCtx<'_>,
        now: Instant,
    ) -> crate::Result<Disposition> {
        self.last_seen = now;
        match packet.header.payload.kind()? {
            PayloadKind::Rakp1 => self.handle_rakp1(&packet.payload, ctx),
            PayloadKind::Rakp3 => self.handle_rakp3(&packet.payload, ctx),
            PayloadKind::IpmiMessage => self.handle_request(datagram, packet, ctx),
            _ => {
                // RAKP2/RAKP4/open-session responses have no business
                // arriving at a responder.
                ctx.observer
                    .observe(ProtocolEvent::OutOfOrderHandshake, self.peer);
                Ok(Disposition::Keep)
            }
        }
    }

    fn handle_rakp1(
        &mut self,
        payload: &[u8],
        ctx: &mut SessionCtx<'_>,
    ) -> crate::Result<Disposition> {
        // A duplicate RAKP1 while awaiting RAKP3 restarts the exchange
        // with a fresh R_c; consoles retransmit when RAKP2 gets lost.
        if !matches!(
            self.state,
            SessionState::AwaitRakp1 | SessionState::AwaitRakp3
        ) {
            ctx.observer
                .observe(ProtocolEvent::OutOfOrderHandshake, self.peer);
            return Ok(Disposition::Keep);
        }
        let msg = RakpMessage1::read(&mut std::io::Cursor::new(payload))
            .map_err(|_| ipmi_msg::IpmiMsgError::MalformedPayload("RAKP1"))?;

        if msg.username.is_empty() {
            log::debug!("{}: anonymous RAKP1 rejected", self.peer);
            ctx.observer
                .observe(ProtocolEvent::AnonymousLoginRejected, self.peer);
            return Ok(Disposition::Keep);
        }
        let Some(password) = ctx.auth.password_for(&msg.username) else {
            log::debug!("{}: RAKP1 for unknown user", self.peer);
            ctx.observer.observe(ProtocolEvent::UnknownUser, self.peer);
            return Ok(Disposition::Keep);
        };

        self.remote_random = msg.remote_random;
        self.role = msg.role;
        self.username = msg.username;
        self.k_uid = password;
        self.k_g = match ctx.kg {
            Some(kg) => kg.to_vec(),
            None => self.k_uid.clone(),
        };
        ctx.entropy.fill(&mut self.managed_random);

        // RAKP makes the BMC present this HMAC before the console proves
        // anything, handing an offline guessing target to whoever asks.
        // The nonce is not optional; weak passwords are simply broken
        // under this protocol.
        let authcode = keys::rakp2_authcode(
            &self.k_uid,
            self.remote_session_id,
            &self.managed_session_id,
            &self.remote_random,
            &self.managed_random,
            &self.guid,
            self.role,
            &self.username,
        );
        let reply = RakpMessage2 {
            message_tag: msg.message_tag,
            status: RAKP_STATUS_NO_ERRORS,
            remote_session_id: self.remote_session_id,
            managed_random: self.managed_random,
            guid: self.guid,
            authcode,
        };
        self.send_handshake(PayloadKind::Rakp2, reply.to_bytes(), ctx)?;
        self.state = SessionState::AwaitRakp3;
        log::debug!("{}: RAKP2 sent, awaiting RAKP3", self.peer);
        Ok(Disposition::Keep)
    }

    fn handle_rakp3(
        &mut self,
        payload: &[u8],
        ctx: &mut SessionCtx<'_>,
    ) -> crate::Result<Disposition> {
        if self.state != SessionState::AwaitRakp3 {
            ctx.observer
                .observe(ProtocolEvent::OutOfOrderHandshake, self.peer);
            return Ok(Disposition::Keep);
        }
        let msg = RakpMessage3::read(&mut std::io::Cursor::new(payload))
            .map_err(|_| ipmi_msg::IpmiMsgError::MalformedPayload("RAKP3"))?;

        let derived = keys::derive(
            &self.k_g,
            &self.remote_random,
            &self.managed_random,
            self.role,
            &self.username,
        );
        let expected = keys::rakp3_authcode(
            &self.k_uid,
            &self.managed_random,
            self.remote_session_id,
            self.role,
            &self.username,
        );
        if !crate::crypto::ct_eq(&expected, &msg.authcode) {
            // A wrong Kg also lands here even when RAKP2 looked fine, so
            // the console may retry with a corrected RAKP3.
            // TODO: answer with an RMCP+ status code once common consoles
            // are known to handle an error here better than a timeout.
            log::debug!("{}: RAKP3 authcode mismatch", self.peer);
            ctx.observer
                .observe(ProtocolEvent::BadRakp3Authcode, self.peer);
            return Ok(Disposition::Keep);
        }
        if msg.status != RAKP_STATUS_NO_ERRORS {
            // The console rejected our RAKP2. Dropped like any other bad
            // RAKP3: the session stays put for a retry, and the
            // inactivity sweep collects the leftovers.
            log::debug!(
                "{}: console abandoned handshake (status {:#04x})",
                self.peer,
                msg.status
            );
            ctx.observer
                .observe(ProtocolEvent::HandshakeAbandoned, self.peer);
            return Ok(Disposition::Keep);
        }

        let reply = RakpMessage4 {
            message_tag: msg.message_tag,
            status: RAKP_STATUS_NO_ERRORS,
            remote_session_id: self.remote_session_id,
            integrity_check: keys::rakp4_integrity_check(
                &derived.sik,
                &self.remote_random,
                &self.managed_session_id,
                &self.guid,
            ),
        };
        self.send_handshake(PayloadKind::Rakp4, reply.to_bytes(), ctx)?;
        self.keys = Some(derived);
        self.state = SessionState::Active;
        self.seq_out = 1;
        log::debug!(
            "{}: session active for user {:?}, max privilege {}",
            self.peer,
            String::from_utf8_lossy(&self.username),
            self.max_privilege()
        );
        Ok(Disposition::Keep)
    }

    fn handle_request(
        &mut self,
        datagram: &[u8],
        packet: &V2Packet,
        ctx: &mut SessionCtx<'_>,
    ) -> crate::Result<Disposition> {
        let Some(keys) = self.keys.clone() else {
            // Sealed payloads before RAKP completes.
            ctx.observer
                .observe(ProtocolEvent::OutOfOrderHandshake, self.peer);
            return Ok(Disposition::Keep);
        };
        if !packet.header.payload.encrypted() || !packet.header.payload.authenticated() {
            ctx.observer
                .observe(ProtocolEvent::MalformedPacket, self.peer);
            return Ok(Disposition::Keep);
        }
        if packet.header.session_id != u32::from_le_bytes(self.managed_session_id) {
            ctx.observer
                .observe(ProtocolEvent::MalformedPacket, self.peer);
            return Ok(Disposition::Keep);
        }
        let seq = packet.header.session_seq;
        if seq <= self.seq_in_floor {
            return Err(Error::StaleSequence {
                got: seq,
                floor: self.seq_in_floor,
            });
        }

        let lan_bytes = seal::unseal(datagram, packet, &keys)?;
        // The floor only moves for packets that passed the integrity
        // check, so garbage cannot burn sequence numbers.
        self.seq_in_floor = seq;
        log::trace!("{}: request bytes {:x?}", self.peer, lan_bytes);
        let msg = LanMessage::parse(&lan_bytes)?;

        match (msg.net_fn, msg.command) {
            (NETFN_APP, CMD_SET_SESSION_PRIVILEGE_LEVEL) => {
                let requested = msg.data.first().copied().unwrap_or(0);
                let (code, level) = self.set_privilege(requested);
                self.send_response(&msg, code, &[level], ctx.sink)?;
                Ok(Disposition::Keep)
            }
            (NETFN_APP, CMD_CLOSE_SESSION) => {
                self.send_response(&msg, CC_OK, &[], ctx.sink)?;
                self.state = SessionState::Closed;
                log::debug!("{}: session closed by request", self.peer);
                Ok(Disposition::Close)
            }
            _ => {
                let request = Request::from(&msg);
                let mut handle = SessionRef::new(self, ctx.sink, &msg);
                if let Err(e) = ctx.backend.handle_raw_request(&request, &mut handle) {
                    log::debug!("backend rejected {request:?}: {e}");
                    if !handle.responded() {
                        handle.send_response(ipmi_msg::CC_INVALID_COMMAND, &[])?;
                    }
                }
                if handle.close_requested() {
                    self.state = SessionState::Closed;
                    Ok(Disposition::Close)
                } else {
                    Ok(Disposition::Keep)
                }
            }
        }
    }

    /// Set Session Privilege Level: level 0 reads back the current value,
    /// levels above the RAKP1 role cap are refused with 0x81.
    fn set_privilege(&mut self, requested: u8) -> (u8, u8) {
        if requested > PRIVILEGE_CALLBACK {
            if requested > self.max_privilege() {
                return (CC_PRIVILEGE_LIMIT, self.privilege);
            }
            self.privilege = requested;
        }
        (CC_OK, self.privilege)
    }

    /// Seals and sends an in-session response, reusing the requester's
    /// sequence and addressing.
    pub(crate) fn send_response(
        &mut self,
        request: &LanMessage,
        code: u8,
        data: &[u8],
        sink: &dyn PacketSink,
    ) -> crate::Result<()> {
        let Some(keys) = &self.keys else {
            return Err(Error::WrongState);
        };
        let reply = request.respond(code, data);
        let datagram = seal::seal(self.remote_session_id, self.seq_out, &reply.to_bytes(), keys)?;
        sink.send(&datagram, self.peer)?;
        self.seq_out = self.seq_out.wrapping_add(1);
        Ok(())
    }

    /// Handshake payloads travel unprotected outside any session id.
    fn send_handshake(
        &self,
        kind: PayloadKind,
        body: Vec<u8>,
        ctx: &SessionCtx<'_>,
    ) -> crate::Result<()> {
        let packet = V2Packet::plain(kind, 0, 0, body);
        ctx.sink.send(&packet.to_bytes(), self.peer)?;
        Ok(())
    }
}
