//! DHCP message parsing and encoding per RFC 2131.
//!
//! A DHCP message consists of a fixed 236-byte header followed by an
//! options area that starts with the 4-byte magic cookie.
//!
//! # Message Structure
//!
//! ```text
//! 0                   1                   2                   3
//! 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     op (1)    |   htype (1)   |   hlen (1)    |   hops (1)    |
//! +---------------+---------------+---------------+---------------+
//! |                            xid (4)                            |
//! +-------------------------------+-------------------------------+
//! |           secs (2)            |           flags (2)           |
//! +-------------------------------+-------------------------------+
//! |                          ciaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          yiaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          siaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          giaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          chaddr (16)                          |
//! +---------------------------------------------------------------+
//! |                          sname (64)                           |
//! +---------------------------------------------------------------+
//! |                          file (128)                           |
//! +---------------------------------------------------------------+
//! |                    magic cookie (4) = 99.130.83.99            |
//! +---------------------------------------------------------------+
//! |                          options (variable)                   |
//! +---------------------------------------------------------------+
//! ```
//!
//! Inbound options are kept as the raw area and decoded lazily with
//! [`crate::codec::decode_option`]; replies are built through
//! [`OptionsBuffer`] so they can never exceed 312 option bytes.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use tracing::debug;

use crate::codec::{OptionsBuffer, decode_option, decode_option_truncated, iter_options};
use crate::error::{Error, Result};
use crate::options::{DhcpOption, MessageType, OptionCode};

const CHADDR_OFFSET: usize = 28;
const CHADDR_SIZE: usize = 16;
const SNAME_OFFSET: usize = CHADDR_OFFSET + CHADDR_SIZE;
const SNAME_SIZE: usize = 64;
const FILE_OFFSET: usize = SNAME_OFFSET + SNAME_SIZE;
const FILE_SIZE: usize = 128;

/// Size of the fixed header, up to but excluding the magic cookie.
pub const FIXED_HEADER_SIZE: usize = FILE_OFFSET + FILE_SIZE;

/// Minimum encoded size per RFC 2131 §2 (BOOTP relay compatibility).
const DHCP_MIN_PACKET_SIZE: usize = 300;

/// Broadcast bit in the `flags` field.
const BROADCAST_FLAG: u16 = 0x8000;

/// BOOTP/DHCP operation code for client requests.
pub const BOOTREQUEST: u8 = 1;

/// BOOTP/DHCP operation code for server replies.
pub const BOOTREPLY: u8 = 2;

/// Hardware type for Ethernet.
pub const HTYPE_ETHERNET: u8 = 1;

/// Hardware address length for Ethernet (6 bytes).
pub const HLEN_ETHERNET: u8 = 6;

/// A 6-byte Ethernet hardware address, the key of the lease table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a, b, c, d, e, g
        )
    }
}

impl FromStr for MacAddress {
    type Err = String;

    fn from_str(text: &str) -> std::result::Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut parts = text.split(':');

        for byte in bytes.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| format!("MAC address '{}' has fewer than 6 octets", text))?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(format!("Invalid MAC octet '{}'", part));
            }
            *byte = u8::from_str_radix(part, 16).map_err(|error| error.to_string())?;
        }

        if parts.next().is_some() {
            return Err(format!("MAC address '{}' has more than 6 octets", text));
        }

        Ok(Self(bytes))
    }
}

/// A parsed DHCP message.
///
/// This struct represents both client requests and server replies.
/// Use [`parse`](Self::parse) for incoming datagrams and
/// [`create_reply`](Self::create_reply) to construct responses.
#[derive(Debug, Clone)]
pub struct DhcpPacket {
    /// Operation code: [`BOOTREQUEST`] (1) or [`BOOTREPLY`] (2).
    pub op: u8,

    /// Hardware address type. [`HTYPE_ETHERNET`] (1) for Ethernet.
    pub htype: u8,

    /// Hardware address length. [`HLEN_ETHERNET`] (6) for Ethernet.
    pub hlen: u8,

    /// Hop count, incremented by relay agents.
    pub hops: u8,

    /// Transaction ID chosen by client, echoed in replies.
    pub xid: u32,

    /// Seconds elapsed since client began address acquisition.
    pub secs: u16,

    /// Flags. Bit 15 (0x8000) = broadcast flag.
    pub flags: u16,

    /// Client IP address (set by client in BOUND/RENEWING/REBINDING).
    pub ciaddr: Ipv4Addr,

    /// "Your" IP address - the address being assigned to the client.
    pub yiaddr: Ipv4Addr,

    /// Server IP address.
    pub siaddr: Ipv4Addr,

    /// Relay agent IP address.
    pub giaddr: Ipv4Addr,

    /// Client hardware address; the first `hlen` bytes are significant.
    pub chaddr: [u8; 16],

    /// Server host name.
    pub sname: [u8; 64],

    /// Boot file name.
    pub file: [u8; 128],

    /// Raw options area, magic cookie included.
    pub options: Vec<u8>,
}

impl DhcpPacket {
    /// Parses the fixed header of a DHCP message.
    ///
    /// The options area is kept verbatim; a missing cookie or malformed
    /// TLV only surfaces when an option is looked up or the area is
    /// checked with [`validate_options`](Self::validate_options).
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPacket`] if the datagram is shorter than
    /// the 236-byte fixed header or `hlen` exceeds the 16-byte `chaddr`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FIXED_HEADER_SIZE {
            return Err(Error::MalformedPacket(format!(
                "Packet too short: {} bytes (minimum {})",
                data.len(),
                FIXED_HEADER_SIZE
            )));
        }

        let hlen = data[2];
        if hlen as usize > CHADDR_SIZE {
            return Err(Error::MalformedPacket(format!(
                "Hardware address length {} exceeds {}",
                hlen, CHADDR_SIZE
            )));
        }

        let mut chaddr = [0u8; 16];
        chaddr.copy_from_slice(&data[CHADDR_OFFSET..SNAME_OFFSET]);

        let mut sname = [0u8; 64];
        sname.copy_from_slice(&data[SNAME_OFFSET..FILE_OFFSET]);

        let mut file = [0u8; 128];
        file.copy_from_slice(&data[FILE_OFFSET..FIXED_HEADER_SIZE]);

        Ok(Self {
            op: data[0],
            htype: data[1],
            hlen,
            hops: data[3],
            xid: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            secs: u16::from_be_bytes([data[8], data[9]]),
            flags: u16::from_be_bytes([data[10], data[11]]),
            ciaddr: Ipv4Addr::new(data[12], data[13], data[14], data[15]),
            yiaddr: Ipv4Addr::new(data[16], data[17], data[18], data[19]),
            siaddr: Ipv4Addr::new(data[20], data[21], data[22], data[23]),
            giaddr: Ipv4Addr::new(data[24], data[25], data[26], data[27]),
            chaddr,
            sname,
            file,
            options: data[FIXED_HEADER_SIZE..].to_vec(),
        })
    }

    /// Encodes the message to bytes for transmission.
    ///
    /// The returned buffer is at least 300 bytes (zero padded per RFC 2131).
    pub fn encode(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(FIXED_HEADER_SIZE + self.options.len());

        packet.push(self.op);
        packet.push(self.htype);
        packet.push(self.hlen);
        packet.push(self.hops);

        packet.extend_from_slice(&self.xid.to_be_bytes());
        packet.extend_from_slice(&self.secs.to_be_bytes());
        packet.extend_from_slice(&self.flags.to_be_bytes());

        packet.extend_from_slice(&self.ciaddr.octets());
        packet.extend_from_slice(&self.yiaddr.octets());
        packet.extend_from_slice(&self.siaddr.octets());
        packet.extend_from_slice(&self.giaddr.octets());

        packet.extend_from_slice(&self.chaddr);
        packet.extend_from_slice(&self.sname);
        packet.extend_from_slice(&self.file);

        packet.extend_from_slice(&self.options);

        if packet.len() < DHCP_MIN_PACKET_SIZE {
            packet.resize(DHCP_MIN_PACKET_SIZE, 0);
        }

        packet
    }

    /// Looks up the raw data of an option.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPacket`] if the options area is unusable.
    pub fn option(&self, code: OptionCode) -> Result<Option<&[u8]>> {
        decode_option(&self.options, code as u8)
    }

    /// Walks the whole options area up to END.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPacket`] if the cookie is missing or any
    /// TLV is truncated, wherever it sits in the area.
    pub fn validate_options(&self) -> Result<()> {
        for option in iter_options(&self.options)? {
            option?;
        }
        Ok(())
    }

    /// Looks up an option, treating an unusable options area as "absent".
    fn lenient_option(&self, code: OptionCode, max_len: usize) -> Option<&[u8]> {
        match decode_option_truncated(&self.options, code as u8, max_len) {
            Ok(data) => data,
            Err(error) => {
                debug!("Ignoring options area while looking up {:?}: {}", code, error);
                None
            }
        }
    }

    fn address_option(&self, code: OptionCode) -> Option<Ipv4Addr> {
        let data = self.lenient_option(code, 4)?;
        let octets: [u8; 4] = data.try_into().ok()?;
        Some(Ipv4Addr::from(octets))
    }

    /// Returns the DHCP message type (Option 53) if present and known.
    pub fn message_type(&self) -> Option<MessageType> {
        let data = self.lenient_option(OptionCode::MessageType, 1)?;
        MessageType::try_from(*data.first()?).ok()
    }

    /// Returns the requested IP address (Option 50) if present.
    pub fn requested_ip(&self) -> Option<Ipv4Addr> {
        self.address_option(OptionCode::RequestedIpAddress)
    }

    /// Returns the server identifier (Option 54) if present.
    pub fn server_identifier(&self) -> Option<Ipv4Addr> {
        self.address_option(OptionCode::ServerIdentifier)
    }

    /// Returns the lease time (Option 51) if present.
    pub fn lease_time(&self) -> Option<u32> {
        let data = self.lenient_option(OptionCode::LeaseTime, 4)?;
        let bytes: [u8; 4] = data.try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }

    /// Returns the parameter request list (Option 55) if present.
    pub fn parameter_request_list(&self) -> Option<&[u8]> {
        self.lenient_option(OptionCode::ParameterRequestList, u8::MAX as usize)
    }

    /// Returns the client hardware address bytes (respecting hlen).
    pub fn chaddr_bytes(&self) -> &[u8] {
        &self.chaddr[..(self.hlen as usize).min(self.chaddr.len())]
    }

    /// Returns the client MAC address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHardwareAddress`] unless `hlen` is 6.
    pub fn mac_address(&self) -> Result<MacAddress> {
        let bytes: [u8; 6] = self
            .chaddr_bytes()
            .try_into()
            .map_err(|_| Error::InvalidHardwareAddress(self.hlen))?;
        Ok(MacAddress(bytes))
    }

    /// Returns true if the broadcast flag (bit 15) is set.
    pub fn is_broadcast(&self) -> bool {
        (self.flags & BROADCAST_FLAG) != 0
    }

    /// Creates a reply to `request`.
    ///
    /// The message type is written as the first option, followed by
    /// `options` and END.
    ///
    /// # Preserved Fields
    ///
    /// The following fields are copied from the request:
    /// - `xid` (transaction ID)
    /// - `flags` (broadcast flag)
    /// - `giaddr` (relay agent address)
    /// - `htype`, `hlen` and the first `hlen` bytes of `chaddr`
    ///
    /// # Errors
    ///
    /// Returns [`Error::OptionOverflow`] if the options do not fit.
    pub fn create_reply(
        request: &DhcpPacket,
        message_type: MessageType,
        your_ip: Ipv4Addr,
        server_ip: Ipv4Addr,
        options: &[DhcpOption],
    ) -> Result<Self> {
        let mut buffer = OptionsBuffer::new();
        DhcpOption::MessageType(message_type).write_to(&mut buffer)?;
        for option in options {
            option.write_to(&mut buffer)?;
        }
        buffer.finish()?;

        let mut chaddr = [0u8; 16];
        let hardware = request.chaddr_bytes();
        chaddr[..hardware.len()].copy_from_slice(hardware);

        Ok(Self {
            op: BOOTREPLY,
            htype: request.htype,
            hlen: request.hlen,
            hops: 0,
            xid: request.xid,
            secs: 0,
            flags: request.flags,
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: your_ip,
            siaddr: server_ip,
            giaddr: request.giaddr,
            chaddr,
            sname: [0u8; 64],
            file: [0u8; 128],
            options: buffer.as_bytes().to_vec(),
        })
    }

    /// Creates a broadcast client request from an Ethernet host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OptionOverflow`] if the options do not fit.
    pub fn create_request(
        message_type: MessageType,
        mac: MacAddress,
        xid: u32,
        options: &[DhcpOption],
    ) -> Result<Self> {
        let mut buffer = OptionsBuffer::new();
        DhcpOption::MessageType(message_type).write_to(&mut buffer)?;
        for option in options {
            option.write_to(&mut buffer)?;
        }
        buffer.finish()?;

        let mut chaddr = [0u8; 16];
        chaddr[..6].copy_from_slice(&mac.octets());

        Ok(Self {
            op: BOOTREQUEST,
            htype: HTYPE_ETHERNET,
            hlen: HLEN_ETHERNET,
            hops: 0,
            xid,
            secs: 0,
            flags: BROADCAST_FLAG,
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            siaddr: Ipv4Addr::UNSPECIFIED,
            giaddr: Ipv4Addr::UNSPECIFIED,
            chaddr,
            sname: [0u8; 64],
            file: [0u8; 128],
            options: buffer.as_bytes().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MAGIC_COOKIE;

    fn create_test_packet(message_type: MessageType, with_options: bool) -> Vec<u8> {
        let mut packet = vec![0u8; 350];

        packet[0] = BOOTREQUEST;
        packet[1] = HTYPE_ETHERNET;
        packet[2] = HLEN_ETHERNET;
        packet[4..8].copy_from_slice(&0x12345678u32.to_be_bytes());
        packet[10..12].copy_from_slice(&0x8000u16.to_be_bytes());
        packet[28..34].copy_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        packet[236..240].copy_from_slice(&MAGIC_COOKIE);

        let mut index = 240;
        packet[index] = OptionCode::MessageType as u8;
        packet[index + 1] = 1;
        packet[index + 2] = message_type as u8;
        index += 3;

        if with_options {
            packet[index] = OptionCode::RequestedIpAddress as u8;
            packet[index + 1] = 4;
            packet[index + 2..index + 6].copy_from_slice(&[10, 0, 0, 15]);
            index += 6;

            packet[index] = OptionCode::ServerIdentifier as u8;
            packet[index + 1] = 4;
            packet[index + 2..index + 6].copy_from_slice(&[10, 0, 0, 1]);
            index += 6;
        }

        packet[index] = OptionCode::End as u8;
        packet
    }

    #[test]
    fn test_parse_and_roundtrip() {
        let data = create_test_packet(MessageType::Discover, false);
        let packet = DhcpPacket::parse(&data).unwrap();

        assert_eq!(packet.op, BOOTREQUEST);
        assert_eq!(packet.xid, 0x12345678);
        assert!(packet.is_broadcast());
        assert_eq!(packet.message_type(), Some(MessageType::Discover));
        assert_eq!(
            packet.mac_address().unwrap().to_string(),
            "aa:bb:cc:dd:ee:ff"
        );

        let encoded = packet.encode();
        let reparsed = DhcpPacket::parse(&encoded).unwrap();
        assert_eq!(reparsed.xid, packet.xid);
        assert_eq!(reparsed.message_type(), packet.message_type());
    }

    #[test]
    fn test_parse_with_options() {
        let data = create_test_packet(MessageType::Request, true);
        let packet = DhcpPacket::parse(&data).unwrap();

        assert_eq!(packet.requested_ip(), Some(Ipv4Addr::new(10, 0, 0, 15)));
        assert_eq!(
            packet.server_identifier(),
            Some(Ipv4Addr::new(10, 0, 0, 1))
        );
        assert_eq!(packet.lease_time(), None);
    }

    #[test]
    fn test_short_packets_rejected() {
        assert!(matches!(
            DhcpPacket::parse(&[0u8; 100]),
            Err(Error::MalformedPacket(_))
        ));
        assert!(DhcpPacket::parse(&[0u8; 235]).is_err());
        assert!(DhcpPacket::parse(&[0u8; 236]).is_ok());
    }

    #[test]
    fn test_hlen_over_chaddr_rejected() {
        let mut packet = create_test_packet(MessageType::Discover, false);
        packet[2] = 17;
        assert!(DhcpPacket::parse(&packet).is_err());

        packet[2] = 16;
        assert!(DhcpPacket::parse(&packet).is_ok());
    }

    #[test]
    fn test_mac_address_requires_six_bytes() {
        let mut packet = create_test_packet(MessageType::Discover, false);
        packet[2] = 4;

        let parsed = DhcpPacket::parse(&packet).unwrap();
        assert_eq!(parsed.chaddr_bytes(), &[0xaa, 0xbb, 0xcc, 0xdd]);
        assert!(matches!(
            parsed.mac_address(),
            Err(Error::InvalidHardwareAddress(4))
        ));
    }

    #[test]
    fn test_missing_cookie_hides_options() {
        let mut data = create_test_packet(MessageType::Discover, true);
        data[236..240].copy_from_slice(&[0, 0, 0, 0]);

        let packet = DhcpPacket::parse(&data).unwrap();
        assert_eq!(packet.message_type(), None);
        assert_eq!(packet.requested_ip(), None);
        assert!(packet.option(OptionCode::MessageType).is_err());
    }

    #[test]
    fn test_validate_options_checks_whole_area() {
        let mut data = create_test_packet(MessageType::Request, true);
        let packet = DhcpPacket::parse(&data).unwrap();
        assert!(packet.validate_options().is_ok());

        // Replace END after option 54 with a TLV claiming 200 bytes.
        data.truncate(255);
        data.extend_from_slice(&[12, 200, 1, 2]);
        let packet = DhcpPacket::parse(&data).unwrap();
        assert!(packet.requested_ip().is_some());
        assert!(matches!(
            packet.validate_options(),
            Err(Error::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_header_only_packet_has_no_options() {
        let mut data = vec![0u8; FIXED_HEADER_SIZE];
        data[0] = BOOTREQUEST;
        data[2] = HLEN_ETHERNET;

        let packet = DhcpPacket::parse(&data).unwrap();
        assert!(packet.options.is_empty());
        assert_eq!(packet.message_type(), None);
    }

    #[test]
    fn test_short_address_option_ignored() {
        let mut data = create_test_packet(MessageType::Request, false);
        data[243] = OptionCode::RequestedIpAddress as u8;
        data[244] = 2;
        data[245..247].copy_from_slice(&[10, 0]);
        data[247] = OptionCode::End as u8;

        let packet = DhcpPacket::parse(&data).unwrap();
        assert_eq!(packet.requested_ip(), None);
    }

    #[test]
    fn test_unknown_message_type_value() {
        let mut data = create_test_packet(MessageType::Discover, false);
        data[242] = 42;
        let packet = DhcpPacket::parse(&data).unwrap();
        assert_eq!(packet.message_type(), None);
    }

    #[test]
    fn test_create_reply() {
        let discover_data = create_test_packet(MessageType::Discover, false);
        let discover = DhcpPacket::parse(&discover_data).unwrap();

        let offer = DhcpPacket::create_reply(
            &discover,
            MessageType::Offer,
            Ipv4Addr::new(10, 0, 0, 10),
            Ipv4Addr::new(10, 0, 0, 1),
            &[DhcpOption::LeaseTime(86400)],
        )
        .unwrap();

        assert_eq!(offer.op, BOOTREPLY);
        assert_eq!(offer.xid, discover.xid);
        assert_eq!(offer.flags, discover.flags);
        assert_eq!(offer.yiaddr, Ipv4Addr::new(10, 0, 0, 10));
        assert_eq!(offer.siaddr, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(offer.ciaddr, Ipv4Addr::UNSPECIFIED);
        assert_eq!(offer.message_type(), Some(MessageType::Offer));
        assert_eq!(offer.lease_time(), Some(86400));
        assert_eq!(offer.chaddr, discover.chaddr);
        assert_eq!(&offer.options[4..7], &[53, 1, 2]);
        assert_eq!(*offer.options.last().unwrap(), OptionCode::End as u8);
    }

    #[test]
    fn test_create_request() {
        let mac: MacAddress = "02:00:00:00:00:2a".parse().unwrap();
        let request = DhcpPacket::create_request(
            MessageType::Request,
            mac,
            7,
            &[DhcpOption::RequestedIpAddress(Ipv4Addr::new(10, 0, 0, 12))],
        )
        .unwrap();

        let parsed = DhcpPacket::parse(&request.encode()).unwrap();
        assert_eq!(parsed.op, BOOTREQUEST);
        assert_eq!(parsed.xid, 7);
        assert!(parsed.is_broadcast());
        assert_eq!(parsed.mac_address().unwrap(), mac);
        assert_eq!(parsed.message_type(), Some(MessageType::Request));
        assert_eq!(parsed.requested_ip(), Some(Ipv4Addr::new(10, 0, 0, 12)));
    }

    #[test]
    fn test_create_reply_copies_only_hlen_bytes_of_chaddr() {
        let mut data = create_test_packet(MessageType::Discover, false);
        data[34..44].copy_from_slice(&[0x55; 10]);

        let request = DhcpPacket::parse(&data).unwrap();
        let reply = DhcpPacket::create_reply(
            &request,
            MessageType::Offer,
            Ipv4Addr::new(10, 0, 0, 10),
            Ipv4Addr::new(10, 0, 0, 1),
            &[],
        )
        .unwrap();

        assert_eq!(&reply.chaddr[..6], &[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert!(reply.chaddr[6..].iter().all(|byte| *byte == 0));
    }

    #[test]
    fn test_giaddr_preserved_in_reply() {
        let mut packet_data = create_test_packet(MessageType::Discover, false);
        let giaddr = Ipv4Addr::new(10, 1, 0, 1);
        packet_data[24..28].copy_from_slice(&giaddr.octets());

        let request = DhcpPacket::parse(&packet_data).unwrap();
        let reply = DhcpPacket::create_reply(
            &request,
            MessageType::Offer,
            Ipv4Addr::new(10, 0, 0, 10),
            Ipv4Addr::new(10, 0, 0, 1),
            &[],
        )
        .unwrap();

        assert_eq!(reply.giaddr, giaddr);
    }

    #[test]
    fn test_min_packet_size_on_encode() {
        let request = DhcpPacket::parse(&create_test_packet(MessageType::Discover, false)).unwrap();
        let reply = DhcpPacket::create_reply(
            &request,
            MessageType::Nak,
            Ipv4Addr::UNSPECIFIED,
            Ipv4Addr::new(10, 0, 0, 1),
            &[DhcpOption::ServerIdentifier(Ipv4Addr::new(10, 0, 0, 1))],
        )
        .unwrap();

        let encoded = reply.encode();
        assert_eq!(encoded.len(), DHCP_MIN_PACKET_SIZE);
        assert_eq!(&encoded[236..240], &MAGIC_COOKIE);
    }

    #[test]
    fn test_encode_produces_correct_offsets() {
        let packet = DhcpPacket {
            op: BOOTREPLY,
            htype: HTYPE_ETHERNET,
            hlen: HLEN_ETHERNET,
            hops: 3,
            xid: 0x12345678,
            secs: 999,
            flags: 0x8000,
            ciaddr: Ipv4Addr::new(192, 168, 1, 10),
            yiaddr: Ipv4Addr::new(192, 168, 1, 20),
            siaddr: Ipv4Addr::new(192, 168, 1, 1),
            giaddr: Ipv4Addr::new(192, 168, 2, 1),
            chaddr: [
                0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            ],
            sname: [0u8; 64],
            file: [0u8; 128],
            options: MAGIC_COOKIE.to_vec(),
        };

        let encoded = packet.encode();

        assert_eq!(encoded[0], BOOTREPLY);
        assert_eq!(encoded[1], HTYPE_ETHERNET);
        assert_eq!(encoded[2], HLEN_ETHERNET);
        assert_eq!(encoded[3], 3);
        assert_eq!(&encoded[4..8], &0x12345678u32.to_be_bytes());
        assert_eq!(&encoded[8..10], &999u16.to_be_bytes());
        assert_eq!(&encoded[10..12], &0x8000u16.to_be_bytes());
        assert_eq!(&encoded[12..16], &[192, 168, 1, 10]);
        assert_eq!(&encoded[16..20], &[192, 168, 1, 20]);
        assert_eq!(&encoded[20..24], &[192, 168, 1, 1]);
        assert_eq!(&encoded[24..28], &[192, 168, 2, 1]);
        assert_eq!(&encoded[28..34], &[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert_eq!(&encoded[236..240], &MAGIC_COOKIE);
    }

    #[test]
    fn test_mac_address_display_and_parse() {
        let mac = MacAddress([0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0xff]);
        assert_eq!(mac.to_string(), "00:1a:2b:3c:4d:ff");
        assert_eq!("00:1a:2b:3c:4d:ff".parse::<MacAddress>(), Ok(mac));
        assert_eq!("00:1A:2B:3C:4D:FF".parse::<MacAddress>(), Ok(mac));

        assert!("00:1a:2b:3c:4d".parse::<MacAddress>().is_err());
        assert!("00:1a:2b:3c:4d:ff:00".parse::<MacAddress>().is_err());
        assert!("00:1a:2b:3c:4d:zz".parse::<MacAddress>().is_err());
        assert!("0:1a:2b:3c:4d:ff".parse::<MacAddress>().is_err());
        assert!("".parse::<MacAddress>().is_err());
    }
}
