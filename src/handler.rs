//! DHCP message handling.
//!
//! [`MessageHandler`] turns one inbound datagram into at most one reply,
//! reading and updating the [`LeaseTable`] it is lent. It performs no I/O:
//! the caller decides when to receive, what time it is, and where the
//! returned [`Reply`] goes.
//!
//! | Message  | Table effect                          | Reply        |
//! |----------|---------------------------------------|--------------|
//! | DISCOVER | none                                  | OFFER / none |
//! | REQUEST  | create or renew lease                 | ACK / NAK    |
//! | DECLINE  | mark lease declined, quarantine 60s   | none         |
//! | RELEASE  | remove lease if `ciaddr` matches      | none         |
//! | INFORM   | none                                  | ACK          |

use std::net::{Ipv4Addr, SocketAddrV4};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::allocator::{AddressPool, allocate};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::lease::{DECLINE_QUARANTINE_SECONDS, Lease, LeaseTable};
use crate::options::{DhcpOption, MessageType, OptionCode};
use crate::packet::{BOOTREQUEST, DhcpPacket, MacAddress};

pub const DHCP_SERVER_PORT: u16 = 67;
pub const DHCP_CLIENT_PORT: u16 = 68;

/// Where a reply is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Limited broadcast to the client port.
    Broadcast,
    /// Directly to a configured client at its `ciaddr`.
    Unicast(Ipv4Addr),
    /// To the relay agent at `giaddr`, on the server port.
    Relay(Ipv4Addr),
}

impl Destination {
    /// Picks the destination for a reply to `request`.
    pub fn for_request(request: &DhcpPacket) -> Self {
        if request.ciaddr != Ipv4Addr::UNSPECIFIED {
            Self::Unicast(request.ciaddr)
        } else if request.is_broadcast() || request.giaddr == Ipv4Addr::UNSPECIFIED {
            Self::Broadcast
        } else {
            Self::Relay(request.giaddr)
        }
    }

    pub fn socket_addr(&self) -> SocketAddrV4 {
        match *self {
            Self::Broadcast => SocketAddrV4::new(Ipv4Addr::BROADCAST, DHCP_CLIENT_PORT),
            Self::Unicast(ip) => SocketAddrV4::new(ip, DHCP_CLIENT_PORT),
            Self::Relay(ip) => SocketAddrV4::new(ip, DHCP_SERVER_PORT),
        }
    }
}

/// A response ready to be encoded and sent.
#[derive(Debug, Clone)]
pub struct Reply {
    pub packet: DhcpPacket,
    pub destination: Destination,
}

impl Reply {
    fn to(request: &DhcpPacket, packet: DhcpPacket) -> Self {
        let destination = Destination::for_request(request);
        debug!("Reply to xid {:#010x} goes to {:?}", request.xid, destination);
        Self {
            packet,
            destination,
        }
    }

    pub fn message_type(&self) -> Option<MessageType> {
        self.packet.message_type()
    }
}

/// Processes client messages against a lease table.
#[derive(Debug, Clone)]
pub struct MessageHandler {
    config: Config,
    pool: AddressPool,
}

impl MessageHandler {
    pub fn new(config: Config) -> Self {
        let pool = config.pool();
        Self { config, pool }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &AddressPool {
        &self.pool
    }

    /// Handles one datagram and returns the reply to send, if any.
    ///
    /// Replies are fully built before the table is touched, so an error
    /// leaves the table unchanged.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedPacket`] for a truncated header, an oversized
    ///   `hlen`, or an options area that cannot be read.
    /// - [`Error::InvalidHardwareAddress`] when `hlen` is not 6.
    /// - [`Error::OptionOverflow`] if a reply does not fit.
    pub fn handle(
        &self,
        table: &mut LeaseTable,
        datagram: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<Reply>> {
        let packet = DhcpPacket::parse(datagram)?;

        if packet.op != BOOTREQUEST {
            debug!("Ignoring packet with op {}", packet.op);
            return Ok(None);
        }

        let mac = packet.mac_address()?;
        packet.validate_options()?;

        let Some(raw_type) = packet.option(OptionCode::MessageType)? else {
            info!("Packet from {} has no message type, ignoring", mac);
            return Ok(None);
        };

        let message_type = match raw_type.first().map(|value| MessageType::try_from(*value)) {
            Some(Ok(message_type)) => message_type,
            _ => {
                warn!("Unknown message type {:?} from {}", raw_type, mac);
                return Ok(None);
            }
        };

        info!("{} from {}", message_type, mac);

        if let Some(parameters) = packet.parameter_request_list() {
            debug!("{} asked for parameters {:?}", mac, parameters);
        }

        match message_type {
            MessageType::Discover => self.handle_discover(table, &packet, mac, now),
            MessageType::Request => self.handle_request(table, &packet, mac, now),
            MessageType::Decline => self.handle_decline(table, &packet, mac, now),
            MessageType::Release => self.handle_release(table, &packet, mac),
            MessageType::Inform => self.handle_inform(&packet, mac),
            _ => {
                warn!("Ignoring {} message from {}", message_type, mac);
                Ok(None)
            }
        }
    }

    fn handle_discover(
        &self,
        table: &LeaseTable,
        packet: &DhcpPacket,
        mac: MacAddress,
        now: DateTime<Utc>,
    ) -> Result<Option<Reply>> {
        let Some(offered_ip) = allocate(&mac, packet.requested_ip(), &self.pool, table, now)
        else {
            warn!("Cannot offer to {}: {}", mac, Error::NoAddressAvailable);
            return Ok(None);
        };

        let offer = DhcpPacket::create_reply(
            packet,
            MessageType::Offer,
            offered_ip,
            self.config.server_ip,
            &self.lease_options(),
        )?;

        info!("OFFER {} to {}", offered_ip, mac);

        Ok(Some(Reply::to(packet, offer)))
    }

    fn handle_request(
        &self,
        table: &mut LeaseTable,
        packet: &DhcpPacket,
        mac: MacAddress,
        now: DateTime<Utc>,
    ) -> Result<Option<Reply>> {
        if let Some(server_id) = packet.server_identifier()
            && server_id != self.config.server_ip
        {
            info!(
                "Ignoring REQUEST from {}: {}",
                mac,
                Error::ForeignServer(server_id)
            );
            return Ok(None);
        }

        let target = if packet.ciaddr != Ipv4Addr::UNSPECIFIED {
            Some(packet.ciaddr)
        } else {
            packet.requested_ip()
        };

        let Some(target) = target else {
            return self.nak(packet, mac, "no ciaddr or requested address");
        };

        let renewing = table
            .lookup(&mac)
            .is_some_and(|lease| lease.ip_address == target && !lease.declined);

        if !renewing && !table.is_available(target, &self.pool, now) {
            return self.nak(packet, mac, &format!("{} is not available", target));
        }

        let ack = DhcpPacket::create_reply(
            packet,
            MessageType::Ack,
            target,
            self.config.server_ip,
            &self.lease_options(),
        )?;

        let duration = self.config.lease_duration_seconds;
        if renewing && let Some(lease) = table.lookup_mut(&mac) {
            lease.renew(now, duration);
            info!("Renewed lease on {} for {}", target, mac);
        } else {
            table.upsert(mac, Lease::new(target, now, duration));
            info!("Assigned {} to {}", target, mac);
        }

        info!("ACK {} to {} (lease: {} seconds)", target, mac, duration);

        Ok(Some(Reply::to(packet, ack)))
    }

    fn handle_decline(
        &self,
        table: &mut LeaseTable,
        packet: &DhcpPacket,
        mac: MacAddress,
        now: DateTime<Utc>,
    ) -> Result<Option<Reply>> {
        let declined_ip = packet.requested_ip();

        if let Some(lease) = table.lookup_mut(&mac) {
            if let Some(ip) = declined_ip
                && ip != lease.ip_address
            {
                info!(
                    "DECLINE from {} names {} but its lease is for {}",
                    mac, ip, lease.ip_address
                );
            }
            lease.decline(now);
            warn!(
                "{} declined by {}, quarantined for {} seconds",
                lease.ip_address, mac, DECLINE_QUARANTINE_SECONDS
            );
        } else if let Some(ip) = declined_ip
            && let Some((holder, lease)) = table.lookup_by_ip_mut(ip)
        {
            lease.decline(now);
            warn!(
                "{} (leased to {}) declined by {}, quarantined for {} seconds",
                ip, holder, mac, DECLINE_QUARANTINE_SECONDS
            );
        } else {
            info!("DECLINE from {} matches no lease, ignoring", mac);
        }

        Ok(None)
    }

    fn handle_release(
        &self,
        table: &mut LeaseTable,
        packet: &DhcpPacket,
        mac: MacAddress,
    ) -> Result<Option<Reply>> {
        let held = table.lookup(&mac).map(|lease| lease.ip_address);

        match held {
            Some(ip) if ip == packet.ciaddr => {
                table.remove(&mac);
                info!("Released {} from {}", ip, mac);
            }
            Some(ip) => {
                info!(
                    "RELEASE from {} for {} but its lease is for {}, ignoring",
                    mac, packet.ciaddr, ip
                );
            }
            None => {
                info!(
                    "RELEASE from {} for {} with no lease, ignoring",
                    mac, packet.ciaddr
                );
            }
        }

        Ok(None)
    }

    fn handle_inform(&self, packet: &DhcpPacket, mac: MacAddress) -> Result<Option<Reply>> {
        let mut ack = DhcpPacket::create_reply(
            packet,
            MessageType::Ack,
            Ipv4Addr::UNSPECIFIED,
            self.config.server_ip,
            &self.inform_options(),
        )?;
        ack.ciaddr = packet.ciaddr;

        info!("INFORM response to {} at {}", mac, packet.ciaddr);

        Ok(Some(Reply::to(packet, ack)))
    }

    fn nak(&self, packet: &DhcpPacket, mac: MacAddress, reason: &str) -> Result<Option<Reply>> {
        let nak = DhcpPacket::create_reply(
            packet,
            MessageType::Nak,
            Ipv4Addr::UNSPECIFIED,
            self.config.server_ip,
            &[DhcpOption::ServerIdentifier(self.config.server_ip)],
        )?;

        warn!("NAK to {}: {}", mac, reason);

        Ok(Some(Reply::to(packet, nak)))
    }

    fn lease_options(&self) -> [DhcpOption; 5] {
        [
            DhcpOption::SubnetMask(self.config.subnet_mask),
            DhcpOption::Router(self.config.router),
            DhcpOption::DnsServer(self.config.dns_server),
            DhcpOption::LeaseTime(self.config.lease_duration_seconds),
            DhcpOption::ServerIdentifier(self.config.server_ip),
        ]
    }

    fn inform_options(&self) -> [DhcpOption; 4] {
        [
            DhcpOption::SubnetMask(self.config.subnet_mask),
            DhcpOption::Router(self.config.router),
            DhcpOption::DnsServer(self.config.dns_server),
            DhcpOption::ServerIdentifier(self.config.server_ip),
        ]
    }
}
