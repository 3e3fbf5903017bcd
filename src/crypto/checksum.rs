use sha1_checked::{CollisionResult, Sha1};

use crate::errors::{bail, ensure_eq, Result};

/// Two octet checksum: sum of all octets mod 65536.
#[inline]
pub fn calculate_simple(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u16, |acc, v| acc.wrapping_add(u16::from(*v)))
}

#[inline]
pub fn simple(actual: [u8; 2], data: &[u8]) -> Result<()> {
    ensure_eq!(
        u16::from_be_bytes(actual),
        calculate_simple(data),
        "invalid simple checksum"
    );

    Ok(())
}

/// SHA1 checksum, collision checked.
pub fn calculate_sha1(data: &[u8]) -> Result<[u8; 20]> {
    match Sha1::try_digest(data) {
        CollisionResult::Ok(output) => Ok(output.into()),
        CollisionResult::Collision(_) | CollisionResult::Mitigated(_) => {
            bail!("sha1 collision detected")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_checksum_wraps() {
        assert_eq!(calculate_simple(&[0xFF; 300]), (0xFFu32 * 300 % 65536) as u16);
        assert!(simple([0x00, 0x02], &[0x01, 0x01]).is_ok());
        assert!(simple([0x00, 0x03], &[0x01, 0x01]).is_err());
    }
}
