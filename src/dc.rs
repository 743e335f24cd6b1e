//! Telegram production datacenter table

use std::net::Ipv4Addr;

use crate::{Error, Result};

/// Telegram datacenter addresses (production)
const DC_ADDRESSES: [(i32, &str, u16); 5] = [
    (1, "149.154.175.53", 443),
    (2, "149.154.167.51", 443),
    (3, "149.154.175.100", 443),
    (4, "149.154.167.91", 443),
    (5, "91.108.56.130", 443),
];

/// Check that a datacenter ID belongs to the known production set
pub fn validate(dc_id: i32) -> Result<()> {
    if DC_ADDRESSES.iter().any(|(id, _, _)| *id == dc_id) {
        Ok(())
    } else {
        Err(Error::InvalidDcId { dc_id })
    }
}

/// Look up the IPv4 address and port for a datacenter
pub fn address(dc_id: i32) -> Result<(Ipv4Addr, u16)> {
    let (_, ip, port) = DC_ADDRESSES
        .iter()
        .find(|(id, _, _)| *id == dc_id)
        .ok_or(Error::InvalidDcId { dc_id })?;

    // The table only holds literal IPv4 addresses
    let ip = ip.parse().map_err(|_| Error::InvalidDcId { dc_id })?;
    Ok((ip, *port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_known_dcs() {
        for dc in 1..=5 {
            assert!(validate(dc).is_ok());
        }
    }

    #[test]
    fn test_validate_unknown_dc() {
        assert!(matches!(validate(0), Err(Error::InvalidDcId { dc_id: 0 })));
        assert!(matches!(validate(6), Err(Error::InvalidDcId { dc_id: 6 })));
        assert!(matches!(validate(-1), Err(Error::InvalidDcId { .. })));
    }

    #[test]
    fn test_address_lookup() {
        let (ip, port) = address(2).unwrap();
        assert_eq!(ip, Ipv4Addr::new(149, 154, 167, 51));
        assert_eq!(port, 443);
    }
}
