use std::net::Ipv4Addr;

/// Safety bound on how many hosts a single CIDR range expands to. Network
/// scanning is inherently bounded by `max_concurrent` workers, but an
/// operator-supplied `/8` would otherwise try to materialize 16M addresses
/// up front.
const MAX_HOSTS_PER_RANGE: usize = 65536;

/// Expand a CIDR-like range (`"127.0.0.1/32"`, `"10.0.0.0/24"`) into its
/// constituent host addresses. Malformed ranges are skipped rather than
/// failing the whole scan — discovery never surfaces errors from a single
/// candidate.
pub fn expand_cidr(range: &str) -> Vec<Ipv4Addr> {
    let Some((addr_part, prefix_part)) = range.split_once('/') else {
        return match range.parse::<Ipv4Addr>() {
            Ok(addr) => vec![addr],
            Err(_) => Vec::new(),
        };
    };

    let Ok(base) = addr_part.parse::<Ipv4Addr>() else {
        return Vec::new();
    };
    let Ok(prefix) = prefix_part.parse::<u32>() else {
        return Vec::new();
    };
    if prefix > 32 {
        return Vec::new();
    }

    let host_bits = 32 - prefix;
    let host_count = 1u64 << host_bits;
    if host_count as usize > MAX_HOSTS_PER_RANGE {
        return Vec::new();
    }

    let base_u32 = u32::from(base);
    let mask = if prefix == 0 { 0 } else { u32::MAX << host_bits };
    let network = base_u32 & mask;

    (0..host_count)
        .map(|i| Ipv4Addr::from(network.wrapping_add(i as u32)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_host_slash_32() {
        let hosts = expand_cidr("127.0.0.1/32");
        assert_eq!(hosts, vec![Ipv4Addr::new(127, 0, 0, 1)]);
    }

    #[test]
    fn bare_address_without_prefix() {
        let hosts = expand_cidr("10.0.0.5");
        assert_eq!(hosts, vec![Ipv4Addr::new(10, 0, 0, 5)]);
    }

    #[test]
    fn slash_30_yields_four_hosts() {
        let hosts = expand_cidr("192.168.1.0/30");
        assert_eq!(hosts.len(), 4);
        assert_eq!(hosts[0], Ipv4Addr::new(192, 168, 1, 0));
        assert_eq!(hosts[3], Ipv4Addr::new(192, 168, 1, 3));
    }

    #[test]
    fn malformed_range_yields_empty() {
        assert!(expand_cidr("not-an-address").is_empty());
        assert!(expand_cidr("127.0.0.1/99").is_empty());
    }

    #[test]
    fn oversized_range_is_rejected() {
        assert!(expand_cidr("10.0.0.0/8").is_empty());
    }
}
