//! Address pool and allocation policy.

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::lease::LeaseTable;
use crate::packet::MacAddress;

/// An inclusive range of IPv4 addresses handed out to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPool {
    start: Ipv4Addr,
    end: Ipv4Addr,
}

impl AddressPool {
    pub fn new(start: Ipv4Addr, end: Ipv4Addr) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> Ipv4Addr {
        self.start
    }

    pub fn end(&self) -> Ipv4Addr {
        self.end
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let ip = u32::from(ip);
        ip >= u32::from(self.start) && ip <= u32::from(self.end)
    }

    /// Number of addresses in the pool; zero if `start > end`.
    pub fn len(&self) -> u64 {
        let start = u32::from(self.start) as u64;
        let end = u32::from(self.end) as u64;
        if start > end { 0 } else { end - start + 1 }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Addresses in ascending order from `start`.
    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> + use<> {
        (u32::from(self.start)..=u32::from(self.end)).map(Ipv4Addr::from)
    }
}

/// Picks an address for `mac` without touching the table.
///
/// Candidates are tried in order:
///
/// 1. The client's own running lease.
/// 2. The address the client asked for, if it is free.
/// 3. The client's previous address (expired or declined), if it is free
///    again.
/// 4. The lowest free address in the pool.
///
/// Returns `None` when the pool is exhausted.
pub fn allocate(
    mac: &MacAddress,
    requested_ip: Option<Ipv4Addr>,
    pool: &AddressPool,
    table: &LeaseTable,
    now: DateTime<Utc>,
) -> Option<Ipv4Addr> {
    let existing = table.lookup(mac);

    if let Some(lease) = existing
        && lease.is_active(now)
    {
        debug!("{} keeps its lease on {}", mac, lease.ip_address);
        return Some(lease.ip_address);
    }

    if let Some(ip) = requested_ip
        && table.is_available(ip, pool, now)
    {
        debug!("{} gets its requested address {}", mac, ip);
        return Some(ip);
    }

    if let Some(lease) = existing
        && table.is_available(lease.ip_address, pool, now)
    {
        debug!("{} gets its previous address {}", mac, lease.ip_address);
        return Some(lease.ip_address);
    }

    let candidate = pool.iter().find(|ip| table.is_available(*ip, pool, now));
    match candidate {
        Some(ip) => info!("Allocated {} from pool for {}", ip, mac),
        None => info!("Address pool exhausted, nothing to offer {}", mac),
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease::Lease;
    use chrono::TimeDelta;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    fn mac(last: u8) -> MacAddress {
        MacAddress([0x02, 0x00, 0x00, 0x00, 0x00, last])
    }

    fn pool() -> AddressPool {
        AddressPool::new(Ipv4Addr::new(10, 0, 0, 10), Ipv4Addr::new(10, 0, 0, 20))
    }

    #[test]
    fn test_pool_bounds() {
        let pool = pool();
        assert_eq!(pool.len(), 11);
        assert!(pool.contains(Ipv4Addr::new(10, 0, 0, 10)));
        assert!(pool.contains(Ipv4Addr::new(10, 0, 0, 20)));
        assert!(!pool.contains(Ipv4Addr::new(10, 0, 0, 21)));

        let addresses: Vec<_> = pool.iter().collect();
        assert_eq!(addresses.len(), 11);
        assert_eq!(addresses[0], Ipv4Addr::new(10, 0, 0, 10));
        assert_eq!(addresses[10], Ipv4Addr::new(10, 0, 0, 20));
    }

    #[test]
    fn test_inverted_pool_is_empty() {
        let pool = AddressPool::new(Ipv4Addr::new(10, 0, 0, 20), Ipv4Addr::new(10, 0, 0, 10));
        assert!(pool.is_empty());
        assert_eq!(pool.iter().count(), 0);
    }

    #[test]
    fn test_pool_spanning_octet_boundary() {
        let pool = AddressPool::new(Ipv4Addr::new(10, 0, 0, 254), Ipv4Addr::new(10, 0, 1, 1));
        let addresses: Vec<_> = pool.iter().collect();
        assert_eq!(
            addresses,
            vec![
                Ipv4Addr::new(10, 0, 0, 254),
                Ipv4Addr::new(10, 0, 0, 255),
                Ipv4Addr::new(10, 0, 1, 0),
                Ipv4Addr::new(10, 0, 1, 1),
            ]
        );
    }

    #[test]
    fn test_first_free_address() {
        let now = at(1_700_000_000);
        let mut table = LeaseTable::new();
        assert_eq!(
            allocate(&mac(1), None, &pool(), &table, now),
            Some(Ipv4Addr::new(10, 0, 0, 10))
        );

        table.upsert(mac(1), Lease::new(Ipv4Addr::new(10, 0, 0, 10), now, 3600));
        assert_eq!(
            allocate(&mac(2), None, &pool(), &table, now),
            Some(Ipv4Addr::new(10, 0, 0, 11))
        );
    }

    #[test]
    fn test_existing_lease_beats_requested_address() {
        let now = at(1_700_000_000);
        let mut table = LeaseTable::new();
        let held = Ipv4Addr::new(10, 0, 0, 15);
        table.upsert(mac(1), Lease::new(held, now, 3600));

        let requested = Some(Ipv4Addr::new(10, 0, 0, 18));
        assert_eq!(allocate(&mac(1), requested, &pool(), &table, now), Some(held));
    }

    #[test]
    fn test_requested_address_honored_when_free() {
        let now = at(1_700_000_000);
        let mut table = LeaseTable::new();
        let requested = Ipv4Addr::new(10, 0, 0, 18);
        assert_eq!(
            allocate(&mac(1), Some(requested), &pool(), &table, now),
            Some(requested)
        );

        table.upsert(mac(2), Lease::new(requested, now, 3600));
        assert_eq!(
            allocate(&mac(1), Some(requested), &pool(), &table, now),
            Some(Ipv4Addr::new(10, 0, 0, 10))
        );
        assert_eq!(
            allocate(&mac(1), Some(Ipv4Addr::new(192, 168, 1, 1)), &pool(), &table, now),
            Some(Ipv4Addr::new(10, 0, 0, 10))
        );
    }

    #[test]
    fn test_previous_address_reoffered_after_expiry() {
        let now = at(1_700_000_000);
        let mut table = LeaseTable::new();
        let previous = Ipv4Addr::new(10, 0, 0, 17);
        table.upsert(mac(1), Lease::new(previous, now - TimeDelta::seconds(100), 60));

        assert_eq!(allocate(&mac(1), None, &pool(), &table, now), Some(previous));
    }

    #[test]
    fn test_declined_address_skipped_during_quarantine() {
        let now = at(1_700_000_000);
        let mut table = LeaseTable::new();
        let declined = Ipv4Addr::new(10, 0, 0, 10);
        let mut lease = Lease::new(declined, now, 3600);
        lease.decline(now);
        table.upsert(mac(1), lease);

        assert_eq!(
            allocate(&mac(1), None, &pool(), &table, now),
            Some(Ipv4Addr::new(10, 0, 0, 11))
        );
        assert_eq!(
            allocate(&mac(1), None, &pool(), &table, now + TimeDelta::seconds(61)),
            Some(declined)
        );
    }

    #[test]
    fn test_exhausted_pool() {
        let now = at(1_700_000_000);
        let single = AddressPool::new(Ipv4Addr::new(10, 0, 0, 10), Ipv4Addr::new(10, 0, 0, 10));
        let mut table = LeaseTable::new();
        table.upsert(mac(1), Lease::new(Ipv4Addr::new(10, 0, 0, 10), now, 3600));

        assert_eq!(allocate(&mac(2), None, &single, &table, now), None);
        assert_eq!(
            allocate(&mac(1), None, &single, &table, now),
            Some(Ipv4Addr::new(10, 0, 0, 10))
        );
    }
}
