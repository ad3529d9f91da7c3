//! The IPMI server: session table ownership, sessionless handling, and
//! the dispatch loop.

use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::time::Instant;

use binrw::BinRead;
use ipmi_msg::{
    CMD_GET_CHANNEL_AUTH_CAPABILITIES, CMD_GET_CHANNEL_CIPHER_SUITES, FORMAT_IPMI_V2,
    IpmiMsgError, LanMessage, NETFN_APP, OpenSessionRequest, PayloadKind, V2Packet, V15Header,
    encode_v15_sessionless, strip_rmcp,
};
use ipmi_transport::{PacketSink, PacketSource, TransportError};

use crate::auth::AuthStore;
use crate::backend::BmcBackend;
use crate::clock::Clock;
use crate::config::ServerConfig;
use crate::crypto::{EntropySource, OsEntropy};
use crate::event::{NullObserver, ProtocolEvent, ProtocolObserver};
use crate::payloads::StaticPayloads;
use crate::session::{Disposition, Session, SessionCtx, SessionState};
use crate::Error;

/// Shortest datagram worth looking at: RMCP envelope, v1.5 session
/// header, and a LAN message with two data bytes.
const MIN_PACKET: usize = 22;

/// Channel number meaning "the channel this request arrived on".
const CHANNEL_CURRENT: u8 = 0x0e;

/// A listening software BMC. Owns the session table exclusively; all
/// packet handling runs on the caller's thread, one datagram at a time.
pub struct IpmiServer {
    config: ServerConfig,
    uuid: [u8; 16],
    auth: Box<dyn AuthStore>,
    backend: Box<dyn BmcBackend>,
    payloads: StaticPayloads,
    observer: Box<dyn ProtocolObserver>,
    entropy: Box<dyn EntropySource>,
    sessions: HashMap<SocketAddr, Session>,
}

impl IpmiServer {
    pub fn new(
        config: ServerConfig,
        auth: Box<dyn AuthStore>,
        backend: Box<dyn BmcBackend>,
    ) -> Self {
        let uuid = config
            .bmc_uuid
            .unwrap_or_else(|| uuid::Uuid::new_v4().into_bytes());
        Self {
            config,
            uuid,
            auth,
            backend,
            payloads: StaticPayloads::default(),
            observer: Box::new(NullObserver),
            entropy: Box::new(OsEntropy),
            sessions: HashMap::new(),
        }
    }

    /// Replaces the event observer.
    pub fn with_observer(mut self, observer: Box<dyn ProtocolObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replaces the entropy source. Meant for deterministic tests.
    pub fn with_entropy(mut self, entropy: Box<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    pub fn uuid(&self) -> &[u8; 16] {
        &self.uuid
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn session_state(&self, peer: &SocketAddr) -> Option<SessionState> {
        self.sessions.get(peer).map(Session::state)
    }

    /// Handles one inbound datagram. Packet-scoped failures are logged,
    /// reported to the observer, and swallowed.
    pub fn handle_datagram(
        &mut self,
        datagram: &[u8],
        peer: SocketAddr,
        sink: &dyn PacketSink,
        now: Instant,
    ) {
        if let Err(e) = self.try_handle(datagram, peer, sink, now) {
            log::debug!("dropping packet from {peer}: {e}");
            let event = match &e {
                Error::IntegrityMismatch => Some(ProtocolEvent::IntegrityFailure),
                Error::StaleSequence { .. } => Some(ProtocolEvent::ReplayDropped),
                Error::Message(IpmiMsgError::UnknownPayloadType(_)) => {
                    Some(ProtocolEvent::UnknownPayload)
                }
                // Our side failed, not the peer's traffic.
                Error::Transport(_) => None,
                _ => Some(ProtocolEvent::MalformedPacket),
            };
            if let Some(event) = event {
                self.observer.observe(event, peer);
            }
        }
    }

    fn try_handle(
        &mut self,
        datagram: &[u8],
        peer: SocketAddr,
        sink: &dyn PacketSink,
        now: Instant,
    ) -> crate::Result<()> {
        if datagram.len() < MIN_PACKET {
            return Err(IpmiMsgError::ShortPacket(datagram.len()).into());
        }
        let inner = strip_rmcp(datagram)?;

        if inner[0] == FORMAT_IPMI_V2 {
            let packet = V2Packet::parse(datagram)?;
            let kind = packet.header.payload.kind()?;

            // A fresh open-session exchange always wins, displacing any
            // session the tuple already had.
            if kind == PayloadKind::OpenSessionRequest {
                return self.open_session(&packet.payload, peer, sink, now);
            }
            if self.sessions.contains_key(&peer) {
                return self.dispatch_to_session(datagram, &packet, peer, sink, now);
            }
            if kind == PayloadKind::IpmiMessage
                && packet.header.session_id == 0
                && !packet.header.payload.encrypted()
                && !packet.header.payload.authenticated()
            {
                return self.sessionless_lan(&packet.payload, peer, sink);
            }
            // RAKP without a session, or a sealed message for a session
            // that no longer exists.
            self.observer
                .observe(ProtocolEvent::OutOfOrderHandshake, peer);
            Ok(())
        } else {
            // IPMI v1.5 framing is accepted for sessionless discovery
            // only.
            let header = V15Header::read(&mut Cursor::new(inner))
                .map_err(|_| IpmiMsgError::MalformedPayload("session header"))?;
            if header.auth_type != 0 || header.session_id != 0 {
                return Err(IpmiMsgError::MalformedPayload("session header").into());
            }
            let start = V15Header::PAYLOAD_OFFSET;
            let end = start + header.msg_len as usize;
            if datagram.len() < end {
                return Err(IpmiMsgError::ShortPacket(datagram.len()).into());
            }
            self.sessionless_lan(&datagram[start..end], peer, sink)
        }
    }

    /// Serves the discovery commands a console issues before opening a
    /// session. Anything else is dropped.
    fn sessionless_lan(
        &mut self,
        lan_bytes: &[u8],
        peer: SocketAddr,
        sink: &dyn PacketSink,
    ) -> crate::Result<()> {
        let msg = LanMessage::parse(lan_bytes)?;
        if msg.net_fn != NETFN_APP {
            self.observer.observe(ProtocolEvent::UnknownPayload, peer);
            return Ok(());
        }
        match msg.command {
            CMD_GET_CHANNEL_AUTH_CAPABILITIES => {
                if msg.data.len() < 2 {
                    return Err(IpmiMsgError::MalformedPayload("auth capabilities").into());
                }
                let ver_channel = msg.data[0];
                // The console must ask for IPMI v2 data on the current
                // channel; anything else is not ours to answer.
                if ver_channel & 0x80 == 0 || ver_channel & 0x0f != CHANNEL_CURRENT {
                    return Ok(());
                }
                let body = self.payloads.auth_capabilities();
                let reply = msg.respond(body[0], &body[1..]);
                sink.send(&encode_v15_sessionless(&reply.to_bytes()), peer)?;
                log::debug!("{peer}: served auth capabilities");
            }
            CMD_GET_CHANNEL_CIPHER_SUITES => {
                let body = self.payloads.cipher_suites();
                let reply = msg.respond(body[0], &body[1..]);
                let packet = V2Packet::plain(PayloadKind::IpmiMessage, 0, 0, reply.to_bytes());
                sink.send(&packet.to_bytes(), peer)?;
                log::debug!("{peer}: served cipher suites");
            }
            _ => {
                self.observer.observe(ProtocolEvent::UnknownPayload, peer);
            }
        }
        Ok(())
    }

    fn open_session(
        &mut self,
        payload: &[u8],
        peer: SocketAddr,
        sink: &dyn PacketSink,
        now: Instant,
    ) -> crate::Result<()> {
        let request = OpenSessionRequest::read(&mut Cursor::new(payload))
            .map_err(|_| IpmiMsgError::MalformedPayload("open session request"))?;

        if let Some(mut old) = self.sessions.remove(&peer) {
            old.mark_closed();
            log::debug!("{peer}: open session request displaced existing session");
            self.observer.observe(ProtocolEvent::SessionReplaced, peer);
        }

        let managed_session_id = self.fresh_managed_session_id();
        let session = Session::new(peer, request.remote_session_id, managed_session_id, self.uuid, now);
        let response = session.open_session_response(request.message_tag);
        let packet = V2Packet::plain(
            PayloadKind::OpenSessionResponse,
            0,
            0,
            response.to_bytes(),
        );
        sink.send(&packet.to_bytes(), peer)?;
        self.sessions.insert(peer, session);
        log::debug!("{peer}: session spawned, awaiting RAKP1");
        Ok(())
    }

    /// Draws a managed session id that is non-zero and unique across live
    /// sessions.
    fn fresh_managed_session_id(&mut self) -> [u8; 4] {
        loop {
            let mut sid = [0u8; 4];
            self.entropy.fill(&mut sid);
            if sid == [0; 4] {
                continue;
            }
            if self.sessions.values().any(|s| s.managed_session_id() == sid) {
                continue;
            }
            return sid;
        }
    }

    fn dispatch_to_session(
        &mut self,
        datagram: &[u8],
        packet: &V2Packet,
        peer: SocketAddr,
        sink: &dyn PacketSink,
        now: Instant,
    ) -> crate::Result<()> {
        let Some(mut session) = self.sessions.remove(&peer) else {
            return Ok(());
        };
        let mut ctx = SessionCtx {
            auth: &*self.auth,
            kg: self.config.kg.as_deref(),
            entropy: &mut *self.entropy,
            backend: &mut *self.backend,
            observer: &mut *self.observer,
            sink,
        };
        match session.handle_payload(datagram, packet, &mut ctx, now) {
            Ok(Disposition::Keep) => {
                self.sessions.insert(peer, session);
                Ok(())
            }
            Ok(Disposition::Close) => Ok(()),
            Err(e @ Error::Transport(_)) => {
                // The reply never made it onto the wire; the session is
                // unusable.
                session.mark_broken();
                log::debug!("{peer}: session broken, reply not sent");
                Err(e)
            }
            Err(e) => {
                // Packet-scoped failure; the session stays for the
                // console to try again or time out.
                self.sessions.insert(peer, session);
                Err(e)
            }
        }
    }

    /// Inactivity sweep. The host decides the cadence; sessions idle
    /// longer than the configured timeout are dropped without a close
    /// packet.
    pub fn tick(&mut self, now: Instant) {
        let timeout = self.config.inactivity_timeout;
        let expired: Vec<SocketAddr> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.expired(now, timeout))
            .map(|(peer, _)| *peer)
            .collect();
        for peer in expired {
            self.sessions.remove(&peer);
            log::debug!("{peer}: session expired");
            self.observer.observe(ProtocolEvent::SessionExpired, peer);
        }
    }

    /// Receives and dispatches datagrams until the transport fails.
    /// Configure a receive timeout on the transport so the sweep also
    /// runs while the socket is idle.
    pub fn run<T>(&mut self, transport: &mut T, clock: &dyn Clock) -> crate::Result<()>
    where
        T: PacketSource + PacketSink,
    {
        loop {
            match transport.recv() {
                Ok((datagram, peer)) => {
                    self.handle_datagram(&datagram, peer, &*transport, clock.now());
                }
                Err(TransportError::Timeout) => {}
                Err(e) => return Err(e.into()),
            }
            self.tick(clock.now());
        }
    }
}
