//! Random draws for symbolic generator values.
//!
//! Patterns follow the option-system grammar: each dotted (IPv4) or
//! colon-separated (MAC) component is a literal, a `lo-hi` range, or `*`.

use rand::Rng;

use crate::OptionError;

const STRING_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

fn component<R: Rng>(rng: &mut R, part: &str, radix: u32) -> Result<u8, OptionError> {
    let bad = || OptionError::BadPattern(part.to_string());
    match part.split('-').collect::<Vec<_>>().as_slice() {
        ["*"] => Ok(rng.gen_range(0..=255)),
        [lit] => u8::from_str_radix(lit, radix).map_err(|_| bad()),
        [lo, hi] => {
            let lo = u8::from_str_radix(lo, radix).map_err(|_| bad())?;
            let hi = u8::from_str_radix(hi, radix).map_err(|_| bad())?;
            if lo > hi {
                return Err(bad());
            }
            Ok(rng.gen_range(lo..=hi))
        }
        _ => Err(bad()),
    }
}

/// Draws an IPv4 address following a pattern such as `1-128.*.24-27.*`.
pub fn ipv4<R: Rng>(rng: &mut R, pattern: &str) -> Result<String, OptionError> {
    let pattern = pattern.replace(' ', "");
    let parts: Vec<&str> = pattern.split('.').collect();
    if parts.len() != 4 {
        return Err(OptionError::BadPattern(pattern));
    }
    let octets = parts
        .iter()
        .map(|p| component(rng, p, 10))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(octets
        .iter()
        .map(|o| o.to_string())
        .collect::<Vec<_>>()
        .join("."))
}

/// Draws a uniformly random IPv6 address.
pub fn ipv6<R: Rng>(rng: &mut R) -> String {
    let bits: u128 = rng.gen();
    (0..8)
        .map(|i| format!("{:x}", (bits >> (112 - 16 * i)) as u16))
        .collect::<Vec<_>>()
        .join(":")
}

/// Draws a MAC address following a pattern such as `01:00:5e:00-7f:*:*`.
pub fn mac<R: Rng>(rng: &mut R, pattern: &str) -> Result<String, OptionError> {
    let pattern = pattern.replace(' ', "");
    let parts: Vec<&str> = pattern.split(':').collect();
    if parts.len() != 6 {
        return Err(OptionError::BadPattern(pattern));
    }
    let bytes = parts
        .iter()
        .map(|p| component(rng, p, 16))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":"))
}

/// Draws an integer uniformly in `[lo, hi]`.
pub fn number<R: Rng>(rng: &mut R, lo: i64, hi: i64) -> i64 {
    rng.gen_range(lo..=hi)
}

/// Draws an alphanumeric string. A `size` of zero picks a random length
/// up to 100 characters.
pub fn string<R: Rng>(rng: &mut R, size: usize) -> String {
    let size = if size == 0 { rng.gen_range(0..=100) } else { size };
    (0..size)
        .map(|_| STRING_CHARSET[rng.gen_range(0..STRING_CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn ipv4_respects_ranges() {
        let mut r = rng();
        for _ in 0..64 {
            let addr = ipv4(&mut r, "224-239.*.*.*").unwrap();
            let first: u8 = addr.split('.').next().unwrap().parse().unwrap();
            assert!((224..=239).contains(&first));
            assert!(addr.parse::<std::net::Ipv4Addr>().is_ok());
        }
    }

    #[test]
    fn ipv4_rejects_malformed_patterns() {
        let mut r = rng();
        assert!(ipv4(&mut r, "1.2.3").is_err());
        assert!(ipv4(&mut r, "300.*.*.*").is_err());
        assert!(ipv4(&mut r, "5-1.*.*.*").is_err());
    }

    #[test]
    fn mac_multicast_pattern() {
        let mut r = rng();
        for _ in 0..32 {
            let mac = mac(&mut r, "01:00:5e:00-7f:*:*").unwrap();
            assert!(mac.starts_with("01:00:5e:"));
            assert_eq!(mac.split(':').count(), 6);
        }
    }

    #[test]
    fn ipv6_parses() {
        let mut r = rng();
        for _ in 0..16 {
            assert!(ipv6(&mut r).parse::<std::net::Ipv6Addr>().is_ok());
        }
    }

    #[test]
    fn string_length() {
        let mut r = rng();
        assert_eq!(string(&mut r, 12).len(), 12);
        assert!(string(&mut r, 0).len() <= 100);
    }
}
