//! Test doubles and a minimal RMCP+ initiator for exercising the server
//! end to end.

#![allow(dead_code)]

use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Instant;

use binrw::BinRead;
use ipmi_bmc::crypto::{self, EntropySource};
use ipmi_bmc::msg::{
    AlgorithmPayload, LanMessage, OpenSessionRequest, OpenSessionResponse, PayloadField,
    PayloadKind, RMCP_HEADER_LEN, RakpMessage1, RakpMessage2, RakpMessage3, RakpMessage4,
    V2Packet,
};
use ipmi_bmc::transport::{PacketSink, TransportError};
use ipmi_bmc::{
    IpmiServer, ProtocolEvent, ProtocolObserver, RejectAllBackend, ServerConfig, StaticAuth,
};

pub const TEST_UUID: [u8; 16] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
    0xff,
];

pub const CLIENT_SID: u32 = u32::from_le_bytes([0xf1, 0xf2, 0xf3, 0xf4]);

pub fn peer() -> SocketAddr {
    "10.1.2.3:50623".parse().unwrap()
}

/// Captures everything the server sends.
#[derive(Default)]
pub struct VecSink {
    frames: RefCell<Vec<(Vec<u8>, SocketAddr)>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Vec<u8>> {
        self.frames
            .borrow_mut()
            .drain(..)
            .map(|(data, _)| data)
            .collect()
    }

    /// The single frame the server was expected to emit.
    pub fn take_one(&self) -> Vec<u8> {
        let mut frames = self.take();
        assert_eq!(frames.len(), 1, "expected exactly one reply");
        frames.pop().unwrap()
    }

    pub fn assert_silent(&self) {
        assert!(self.take().is_empty(), "expected no reply");
    }
}

impl PacketSink for VecSink {
    fn send(&self, datagram: &[u8], peer: SocketAddr) -> Result<(), TransportError> {
        self.frames.borrow_mut().push((datagram.to_vec(), peer));
        Ok(())
    }
}

/// A sink whose sends always fail, for driving the broken-session path.
pub struct FailingSink;

impl PacketSink for FailingSink {
    fn send(&self, _datagram: &[u8], _peer: SocketAddr) -> Result<(), TransportError> {
        Err(TransportError::Io(std::io::Error::other("send failed")))
    }
}

/// Deterministic entropy: an incrementing byte stream, so session ids and
/// nonces are predictable yet distinct.
#[derive(Debug, Default)]
pub struct CountingEntropy {
    next: u8,
}

impl EntropySource for CountingEntropy {
    fn fill(&mut self, buf: &mut [u8]) {
        for byte in buf {
            self.next = self.next.wrapping_add(1);
            *byte = self.next;
        }
    }
}

/// Observer that appends into a shared log.
pub struct EventLog(pub Rc<RefCell<Vec<ProtocolEvent>>>);

impl ProtocolObserver for EventLog {
    fn observe(&mut self, event: ProtocolEvent, _peer: SocketAddr) {
        self.0.borrow_mut().push(event);
    }
}

pub type Events = Rc<RefCell<Vec<ProtocolEvent>>>;

pub fn assert_event(events: &Events, expected: ProtocolEvent) {
    assert!(
        events.borrow().contains(&expected),
        "expected {expected:?} in {:?}",
        events.borrow()
    );
}

/// A server with `admin`/`admin` configured, a fixed GUID, deterministic
/// entropy, and an inspectable event log.
pub fn test_server() -> (IpmiServer, Events) {
    let events: Events = Rc::new(RefCell::new(Vec::new()));
    let config = ServerConfig {
        bmc_uuid: Some(TEST_UUID),
        ..Default::default()
    };
    let server = IpmiServer::new(
        config,
        Box::new(StaticAuth::new().with_user("admin", "admin")),
        Box::new(RejectAllBackend),
    )
    .with_observer(Box::new(EventLog(events.clone())))
    .with_entropy(Box::new(CountingEntropy::default()));
    (server, events)
}

pub fn now() -> Instant {
    Instant::now()
}

// ---- initiator-side packet construction ----

pub fn suite3_proposals() -> Vec<u8> {
    let (auth, integ, conf) = AlgorithmPayload::suite3();
    let mut out = auth.to_bytes();
    out.extend(integ.to_bytes());
    out.extend(conf.to_bytes());
    out
}

pub fn open_session_datagram(tag: u8, max_privilege: u8, client_sid: u32) -> Vec<u8> {
    let request = OpenSessionRequest {
        message_tag: tag,
        max_privilege,
        remote_session_id: client_sid,
        proposals: suite3_proposals(),
    };
    V2Packet::plain(PayloadKind::OpenSessionRequest, 0, 0, request.to_bytes()).to_bytes()
}

pub fn rakp1_datagram(
    tag: u8,
    managed_sid: u32,
    remote_random: [u8; 16],
    role: u8,
    username: &[u8],
) -> Vec<u8> {
    let msg = RakpMessage1 {
        message_tag: tag,
        managed_session_id: managed_sid,
        remote_random,
        role,
        username: username.to_vec(),
    };
    V2Packet::plain(PayloadKind::Rakp1, 0, 0, msg.to_bytes()).to_bytes()
}

pub fn rakp3_datagram(tag: u8, status: u8, managed_sid: u32, authcode: &[u8]) -> Vec<u8> {
    let msg = RakpMessage3 {
        message_tag: tag,
        status,
        managed_session_id: managed_sid,
        authcode: authcode.to_vec(),
    };
    V2Packet::plain(PayloadKind::Rakp3, 0, 0, msg.to_bytes()).to_bytes()
}

pub fn parse_payload<T>(datagram: &[u8], kind: PayloadKind) -> T
where
    T: for<'a> BinRead<Args<'a> = ()> + binrw::meta::ReadEndian,
{
    let packet = V2Packet::parse(datagram).expect("reply did not parse");
    assert_eq!(packet.header.payload.kind().unwrap(), kind);
    assert_eq!(packet.header.session_id, 0);
    T::read(&mut std::io::Cursor::new(&packet.payload)).expect("payload did not decode")
}

// ---- an established initiator-side session ----

/// Initiator view of an established session, with the same key schedule
/// the BMC derived.
pub struct ClientSession {
    pub peer: SocketAddr,
    pub client_sid: u32,
    pub managed_sid: u32,
    pub sik: [u8; 20],
    pub k1: [u8; 20],
    pub aes_key: [u8; 16],
    pub seq: u32,
    pub rq_seq: u8,
}

impl ClientSession {
    /// Seals a request the way the initiator would: AES-CBC under a fixed
    /// test IV, HMAC-SHA1-96 trailer, addressed to the managed session id.
    pub fn seal_request(&mut self, lan: &[u8]) -> Vec<u8> {
        self.seq += 1;
        seal_datagram(self.managed_sid, self.seq, lan, &self.k1, &self.aes_key)
    }

    /// Builds and seals a command request.
    pub fn request_datagram(&mut self, net_fn: u8, command: u8, data: Vec<u8>) -> Vec<u8> {
        self.rq_seq = (self.rq_seq + 1) & 0x3f;
        let lan = LanMessage::request(net_fn, command, self.rq_seq, data);
        self.seal_request(&lan.to_bytes())
    }

    /// Unseals a response from the server and checks its session id.
    pub fn unseal_response(&self, datagram: &[u8]) -> LanMessage {
        let packet = V2Packet::parse(datagram).expect("response did not parse");
        assert!(packet.header.payload.encrypted());
        assert!(packet.header.payload.authenticated());
        assert_eq!(packet.header.session_id, self.client_sid);
        let lan = unseal_datagram(datagram, &packet, &self.k1, &self.aes_key);
        LanMessage::parse(&lan).expect("inner LAN message did not parse")
    }
}

pub fn seal_datagram(
    session_id: u32,
    session_seq: u32,
    lan: &[u8],
    k1: &[u8; 20],
    aes_key: &[u8; 16],
) -> Vec<u8> {
    let conf_pad = (16 - (lan.len() + 1) % 16) % 16;
    let iv = [0xa5u8; 16];
    let mut body = Vec::new();
    body.extend_from_slice(&iv);
    body.extend_from_slice(lan);
    body.extend(1..=conf_pad as u8);
    body.push(conf_pad as u8);
    crypto::aes_cbc_encrypt(aes_key, &iv, &mut body[16..]).unwrap();

    let mut out = V2Packet::new(PayloadField::sealed(), session_id, session_seq, body).to_bytes();
    let span = out.len() - RMCP_HEADER_LEN + 2;
    let pad = (4 - span % 4) % 4;
    out.extend(std::iter::repeat(0xff).take(pad));
    out.push(pad as u8);
    out.push(0x07);
    let code = crypto::hmac_sha1_96(k1, &out[RMCP_HEADER_LEN..]);
    out.extend_from_slice(&code);
    out
}

pub fn unseal_datagram(
    datagram: &[u8],
    packet: &V2Packet,
    k1: &[u8; 20],
    aes_key: &[u8; 16],
) -> Vec<u8> {
    let (covered, authcode) = datagram.split_at(datagram.len() - 12);
    let expected = crypto::hmac_sha1_96(k1, &covered[RMCP_HEADER_LEN..]);
    assert_eq!(expected, authcode[..], "response integrity check failed");

    let (iv, ciphertext) = packet.payload.split_at(16);
    let mut plaintext = ciphertext.to_vec();
    crypto::aes_cbc_decrypt(aes_key, &iv.try_into().unwrap(), &mut plaintext).unwrap();
    let conf_pad = *plaintext.last().unwrap() as usize;
    plaintext.truncate(plaintext.len() - conf_pad - 1);
    plaintext
}

/// Runs the whole handshake as `admin`/`admin` with role 0x14 and returns
/// both sides' agreed state.
pub fn establish(server: &mut IpmiServer, sink: &VecSink) -> ClientSession {
    establish_as(server, sink, b"admin", b"admin", 0x14)
}

pub fn establish_as(
    server: &mut IpmiServer,
    sink: &VecSink,
    username: &[u8],
    password: &[u8],
    role: u8,
) -> ClientSession {
    let peer = peer();

    server.handle_datagram(
        &open_session_datagram(0xaa, 4, CLIENT_SID),
        peer,
        sink,
        now(),
    );
    let open: OpenSessionResponse =
        parse_payload(&sink.take_one(), PayloadKind::OpenSessionResponse);
    assert_eq!(open.status, 0);
    let managed_sid = open.managed_session_id;

    let remote_random = [0x41u8; 16];
    server.handle_datagram(
        &rakp1_datagram(0x01, managed_sid, remote_random, role, username),
        peer,
        sink,
        now(),
    );
    let rakp2: RakpMessage2 = parse_payload(&sink.take_one(), PayloadKind::Rakp2);
    assert_eq!(rakp2.status, 0);
    assert_eq!(rakp2.guid, TEST_UUID);
    let managed_random = rakp2.managed_random;

    // What the BMC should have disclosed in RAKP2.
    let mut data = Vec::new();
    data.extend_from_slice(&CLIENT_SID.to_le_bytes());
    data.extend_from_slice(&managed_sid.to_le_bytes());
    data.extend_from_slice(&remote_random);
    data.extend_from_slice(&managed_random);
    data.extend_from_slice(&TEST_UUID);
    data.extend_from_slice(&[role, username.len() as u8]);
    data.extend_from_slice(username);
    assert_eq!(rakp2.authcode, crypto::hmac_sha1(password, &data));

    // Prove ourselves in RAKP3.
    let mut data = Vec::new();
    data.extend_from_slice(&managed_random);
    data.extend_from_slice(&CLIENT_SID.to_le_bytes());
    data.extend_from_slice(&[role, username.len() as u8]);
    data.extend_from_slice(username);
    let authcode = crypto::hmac_sha1(password, &data);
    server.handle_datagram(
        &rakp3_datagram(0x02, 0, managed_sid, &authcode),
        peer,
        sink,
        now(),
    );
    let rakp4: RakpMessage4 = parse_payload(&sink.take_one(), PayloadKind::Rakp4);
    assert_eq!(rakp4.status, 0);

    // Derive the session keys and check the RAKP4 integrity value.
    let mut seed = Vec::new();
    seed.extend_from_slice(&remote_random);
    seed.extend_from_slice(&managed_random);
    seed.extend_from_slice(&[role, username.len() as u8]);
    seed.extend_from_slice(username);
    let sik = crypto::hmac_sha1(password, &seed);
    let k1 = crypto::hmac_sha1(&sik, &[0x01; 20]);
    let k2 = crypto::hmac_sha1(&sik, &[0x02; 20]);
    let aes_key: [u8; 16] = k2[..16].try_into().unwrap();

    let mut data = Vec::new();
    data.extend_from_slice(&remote_random);
    data.extend_from_slice(&managed_sid.to_le_bytes());
    data.extend_from_slice(&TEST_UUID);
    assert_eq!(
        rakp4.integrity_check,
        crypto::hmac_sha1(&sik, &data)[..12]
    );

    ClientSession {
        peer,
        client_sid: CLIENT_SID,
        managed_sid,
        sik,
        k1,
        aes_key,
        seq: 0,
        rq_seq: 0,
    }
}
