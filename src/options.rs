//! DHCP option vocabulary (RFC 2132).
//!
//! Each option has a code (1 byte), length (1 byte), and variable-length
//! data. Only the codes this server reads or writes are named here; the
//! byte-level TLV handling lives in [`crate::codec`].

use std::net::Ipv4Addr;

use crate::codec::OptionsBuffer;
use crate::error::Result;

/// DHCP option codes understood by this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OptionCode {
    /// Padding (no operation). Used for alignment.
    Pad = 0,
    /// Subnet mask (RFC 2132 §3.3).
    SubnetMask = 1,
    /// Router/gateway address (RFC 2132 §3.5).
    Router = 3,
    /// DNS server address (RFC 2132 §3.8).
    DnsServer = 6,
    /// Requested IP address (RFC 2132 §9.1).
    RequestedIpAddress = 50,
    /// IP address lease time in seconds (RFC 2132 §9.2).
    LeaseTime = 51,
    /// DHCP message type (RFC 2132 §9.6).
    MessageType = 53,
    /// Server identifier (RFC 2132 §9.7).
    ServerIdentifier = 54,
    /// Parameter request list (RFC 2132 §9.8). Read but ignored.
    ParameterRequestList = 55,
    /// End of options marker.
    End = 255,
}

impl TryFrom<u8> for OptionCode {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Pad),
            1 => Ok(Self::SubnetMask),
            3 => Ok(Self::Router),
            6 => Ok(Self::DnsServer),
            50 => Ok(Self::RequestedIpAddress),
            51 => Ok(Self::LeaseTime),
            53 => Ok(Self::MessageType),
            54 => Ok(Self::ServerIdentifier),
            55 => Ok(Self::ParameterRequestList),
            255 => Ok(Self::End),
            other => Err(other),
        }
    }
}

/// DHCP message types (Option 53) as defined in RFC 2132 §9.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Client broadcast to locate servers.
    Discover = 1,
    /// Server response to DISCOVER with IP offer.
    Offer = 2,
    /// Client request for offered parameters.
    Request = 3,
    /// Client indicates address is already in use.
    Decline = 4,
    /// Server acknowledgement with configuration.
    Ack = 5,
    /// Server negative acknowledgement.
    Nak = 6,
    /// Client releases IP address.
    Release = 7,
    /// Client requests config without IP allocation.
    Inform = 8,
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Discover),
            2 => Ok(Self::Offer),
            3 => Ok(Self::Request),
            4 => Ok(Self::Decline),
            5 => Ok(Self::Ack),
            6 => Ok(Self::Nak),
            7 => Ok(Self::Release),
            8 => Ok(Self::Inform),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discover => write!(f, "DISCOVER"),
            Self::Offer => write!(f, "OFFER"),
            Self::Request => write!(f, "REQUEST"),
            Self::Decline => write!(f, "DECLINE"),
            Self::Ack => write!(f, "ACK"),
            Self::Nak => write!(f, "NAK"),
            Self::Release => write!(f, "RELEASE"),
            Self::Inform => write!(f, "INFORM"),
        }
    }
}

/// An option this server places in its replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpOption {
    /// Subnet mask (Option 1).
    SubnetMask(Ipv4Addr),
    /// Default gateway (Option 3).
    Router(Ipv4Addr),
    /// DNS server (Option 6).
    DnsServer(Ipv4Addr),
    /// Requested IP address (Option 50).
    RequestedIpAddress(Ipv4Addr),
    /// Lease time in seconds (Option 51).
    LeaseTime(u32),
    /// DHCP message type (Option 53).
    MessageType(MessageType),
    /// Server identifier - IP of the DHCP server (Option 54).
    ServerIdentifier(Ipv4Addr),
}

impl DhcpOption {
    /// Returns the RFC 2132 option code for this option.
    pub fn option_code(&self) -> u8 {
        match self {
            Self::SubnetMask(_) => OptionCode::SubnetMask as u8,
            Self::Router(_) => OptionCode::Router as u8,
            Self::DnsServer(_) => OptionCode::DnsServer as u8,
            Self::RequestedIpAddress(_) => OptionCode::RequestedIpAddress as u8,
            Self::LeaseTime(_) => OptionCode::LeaseTime as u8,
            Self::MessageType(_) => OptionCode::MessageType as u8,
            Self::ServerIdentifier(_) => OptionCode::ServerIdentifier as u8,
        }
    }

    /// Writes the option as a TLV into `buffer`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OptionOverflow`](crate::Error::OptionOverflow) if the
    /// option does not fit in the remaining space.
    pub fn write_to(&self, buffer: &mut OptionsBuffer) -> Result<()> {
        let code = self.option_code();
        match self {
            Self::SubnetMask(addr)
            | Self::Router(addr)
            | Self::DnsServer(addr)
            | Self::RequestedIpAddress(addr)
            | Self::ServerIdentifier(addr) => buffer.put_addr(code, *addr),
            Self::LeaseTime(seconds) => buffer.put_u32(code, *seconds),
            Self::MessageType(message_type) => buffer.put_u8(code, *message_type as u8),
        }
    }
}
