//! Discovery of the address path-routed rules listen on.

use std::net::Ipv4Addr;

/// First IPv4 address that is neither loopback nor unspecified.
pub fn first_non_loopback(addrs: impl IntoIterator<Item = Ipv4Addr>) -> Option<Ipv4Addr> {
    addrs
        .into_iter()
        .find(|ip| !ip.is_loopback() && !ip.is_unspecified())
}

/// Non-loopback IPv4 address of this host, if any interface carries one.
pub fn local_ipv4() -> anyhow::Result<Option<Ipv4Addr>> {
    let addrs = nix::ifaddrs::getifaddrs()?;
    Ok(first_non_loopback(addrs.filter_map(|ifa| {
        ifa.address
            .and_then(|addr| addr.as_sockaddr_in().map(|sin| sin.ip()))
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_loopback() {
        let addrs = [
            Ipv4Addr::LOCALHOST,
            Ipv4Addr::new(127, 0, 1, 1),
            Ipv4Addr::UNSPECIFIED,
            Ipv4Addr::new(10, 244, 0, 7),
            Ipv4Addr::new(192, 168, 1, 20),
        ];
        assert_eq!(first_non_loopback(addrs), Some(Ipv4Addr::new(10, 244, 0, 7)));
        assert_eq!(first_non_loopback([Ipv4Addr::LOCALHOST]), None);
    }

    #[test]
    fn test_local_ipv4_is_never_loopback() {
        if let Some(ip) = local_ipv4().unwrap() {
            assert!(!ip.is_loopback());
        }
    }
}
