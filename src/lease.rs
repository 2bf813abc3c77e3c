//! DHCP lease bookkeeping and persistence.
//!
//! This module holds the lease table: a mapping from client MAC address to
//! the address it was given, when that assignment runs out, and whether the
//! client declined it.
//!
//! - Leases are created by REQUEST, renewed by repeated REQUESTs, flagged by
//!   DECLINE and removed by RELEASE.
//! - A declined lease keeps its address out of circulation for
//!   [`DECLINE_QUARANTINE_SECONDS`].
//! - The table persists as one text line per lease:
//!   `<mac> <dotted-ip> <expiry-unix-time> <declined:0|1>`.
//!
//! # Ownership
//!
//! The table is a plain value owned by the server and lent out by `&mut`.
//! Every allocation decision reads and writes it under that single borrow,
//! so two clients can never be handed the same free address.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::net::Ipv4Addr;
use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{info, warn};

use crate::allocator::AddressPool;
use crate::error::{Error, Result};
use crate::packet::MacAddress;

/// How long a declined address stays out of the pool (60 seconds).
pub const DECLINE_QUARANTINE_SECONDS: i64 = 60;

/// A binding between one client and one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    /// The IP address assigned to this client.
    pub ip_address: Ipv4Addr,

    /// When this lease runs out (UTC).
    ///
    /// For a declined lease this is the end of the quarantine window.
    pub expires_at: DateTime<Utc>,

    /// Whether the client reported the address as already in use.
    pub declined: bool,
}

impl Lease {
    /// Creates a lease running for `duration_seconds` from `now`.
    pub fn new(ip_address: Ipv4Addr, now: DateTime<Utc>, duration_seconds: u32) -> Self {
        Self {
            ip_address,
            expires_at: now + TimeDelta::seconds(duration_seconds as i64),
            declined: false,
        }
    }

    /// Returns true once the expiry time has been reached.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Returns true for a running, non-declined lease.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.declined && !self.is_expired(now)
    }

    /// Extends the lease for `duration_seconds` from `now`.
    pub fn renew(&mut self, now: DateTime<Utc>, duration_seconds: u32) {
        self.expires_at = now + TimeDelta::seconds(duration_seconds as i64);
        self.declined = false;
    }

    /// Flags the lease as declined and starts its quarantine window.
    pub fn decline(&mut self, now: DateTime<Utc>) {
        self.declined = true;
        self.expires_at = now + TimeDelta::seconds(DECLINE_QUARANTINE_SECONDS);
    }

    /// Returns seconds remaining until expiration, or 0 if expired.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// All known leases, keyed by client MAC address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaseTable {
    leases: HashMap<MacAddress, Lease>,
}

impl LeaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lease for a client, if one exists.
    pub fn lookup(&self, mac: &MacAddress) -> Option<&Lease> {
        self.leases.get(mac)
    }

    pub fn lookup_mut(&mut self, mac: &MacAddress) -> Option<&mut Lease> {
        self.leases.get_mut(mac)
    }

    /// Returns the lease holding `ip`, if any.
    pub fn lookup_by_ip(&self, ip: Ipv4Addr) -> Option<(MacAddress, &Lease)> {
        self.leases
            .iter()
            .find(|(_, lease)| lease.ip_address == ip)
            .map(|(mac, lease)| (*mac, lease))
    }

    pub fn lookup_by_ip_mut(&mut self, ip: Ipv4Addr) -> Option<(MacAddress, &mut Lease)> {
        self.leases
            .iter_mut()
            .find(|(_, lease)| lease.ip_address == ip)
            .map(|(mac, lease)| (*mac, lease))
    }

    /// Inserts or overwrites the lease for `mac`.
    ///
    /// Any other client's entry for the same address is dropped, so the
    /// table never holds two entries for one address.
    pub fn upsert(&mut self, mac: MacAddress, lease: Lease) {
        let ip = lease.ip_address;
        self.leases
            .retain(|other, existing| *other == mac || existing.ip_address != ip);
        self.leases.insert(mac, lease);
    }

    pub fn remove(&mut self, mac: &MacAddress) -> Option<Lease> {
        self.leases.remove(mac)
    }

    /// Checks whether `ip` may be handed out.
    ///
    /// An address is available if it lies inside `pool` and no entry holding
    /// it is still running. Active leases block until they expire; declined
    /// leases block until their quarantine lapses.
    pub fn is_available(&self, ip: Ipv4Addr, pool: &AddressPool, now: DateTime<Utc>) -> bool {
        pool.contains(ip)
            && !self
                .leases
                .values()
                .any(|lease| lease.ip_address == ip && !lease.is_expired(now))
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.leases.len();
        self.leases.retain(|_, lease| !lease.is_expired(now));
        before - self.leases.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MacAddress, &Lease)> {
        self.leases.iter()
    }

    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    /// Returns the count of running, non-declined leases.
    pub fn active_count(&self, now: DateTime<Utc>) -> usize {
        self.leases
            .values()
            .filter(|lease| lease.is_active(now))
            .count()
    }

    /// Reads a table from its persisted text form.
    ///
    /// Lines that fail to parse are logged and skipped; blank lines are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] only if reading from `reader` fails.
    pub fn load<R: BufRead>(reader: R) -> Result<Self> {
        let mut table = Self::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match parse_record(&line, index + 1) {
                Ok((mac, lease)) => {
                    if let Some((holder, _)) = table.lookup_by_ip(lease.ip_address)
                        && holder != mac
                    {
                        warn!(
                            "Lease record on line {} gives {} to {}, dropping {}",
                            index + 1,
                            lease.ip_address,
                            mac,
                            holder
                        );
                    }
                    table.upsert(mac, lease);
                }
                Err(error) => warn!("Skipping lease record: {}", error),
            }
        }

        Ok(table)
    }

    /// Writes the table in its persisted text form, one lease per line,
    /// ordered by MAC address.
    pub fn save<W: Write>(&self, mut writer: W) -> Result<()> {
        let mut entries: Vec<_> = self.leases.iter().collect();
        entries.sort_by_key(|(mac, _)| **mac);

        for (mac, lease) in entries {
            writeln!(
                writer,
                "{} {} {} {}",
                mac,
                lease.ip_address,
                lease.expires_at.timestamp(),
                u8::from(lease.declined)
            )?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Loads the table from `path`; a missing file yields an empty table.
    pub async fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No lease file at {}, starting empty", path.display());
            return Ok(Self::new());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let table = Self::load(content.as_bytes())?;
        info!("Loaded {} lease(s) from {}", table.len(), path.display());
        Ok(table)
    }

    /// Rewrites `path` with the current table.
    pub async fn save_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut content = Vec::new();
        self.save(&mut content)?;
        tokio::fs::write(path, content).await?;
        info!("Saved {} lease(s) to {}", self.len(), path.display());
        Ok(())
    }
}

fn parse_record(line: &str, line_number: usize) -> Result<(MacAddress, Lease)> {
    let invalid = |reason: String| Error::LeaseParse {
        line: line_number,
        reason,
    };

    let fields: Vec<&str> = line.split_whitespace().collect();
    let &[mac, ip, expiry, declined] = fields.as_slice() else {
        return Err(invalid(format!(
            "expected 4 fields, found {}",
            fields.len()
        )));
    };

    let mac: MacAddress = mac.parse().map_err(invalid)?;
    let ip_address: Ipv4Addr = ip
        .parse()
        .map_err(|_| invalid(format!("invalid IP address '{}'", ip)))?;
    let seconds: i64 = expiry
        .parse()
        .map_err(|_| invalid(format!("invalid expiry '{}'", expiry)))?;
    let expires_at = DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| invalid(format!("expiry {} out of range", seconds)))?;
    let declined: i64 = declined
        .parse()
        .map_err(|_| invalid(format!("invalid declined flag '{}'", declined)))?;

    Ok((
        mac,
        Lease {
            ip_address,
            expires_at,
            declined: declined != 0,
        },
    ))
}
