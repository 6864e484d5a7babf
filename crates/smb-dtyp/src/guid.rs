use std::fmt::Display;
use std::io::Cursor;
use std::str::FromStr;

use binrw::prelude::*;
use rand::{Rng, rngs::OsRng};

/// A standard, 16-byte GUID, as used for the client and server GUIDs
/// exchanged during SMB2 negotiation.
#[derive(BinRead, BinWrite, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[brw(little)]
pub struct Guid(u32, u16, u16, [u8; 8]);

impl Guid {
    /// Generates a new random GUID, suitable for use as a client GUID.
    pub fn gen() -> Self {
        let mut rng = OsRng;
        let mut bytes = [0u8; 16];
        rng.fill(&mut bytes);
        Self::from(bytes)
    }

    pub const MAX: Guid = Guid(u32::MAX, u16::MAX, u16::MAX, [u8::MAX; 8]);
    pub const ZERO: Guid = Guid(0, 0, 0, [0; 8]);
}

impl From<[u8; 16]> for Guid {
    fn from(value: [u8; 16]) -> Self {
        let mut cursor = Cursor::new(value);
        Guid::read(&mut cursor).expect("16 bytes always decode to a Guid")
    }
}

impl FromStr for Guid {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_start_matches('{').trim_end_matches('}');
        let components = s.split('-').collect::<Vec<&str>>();
        if components.len() != 5 {
            return Err(());
        }

        let mut result = Self::default();

        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(
            &u32::from_str_radix(components[0], 16)
                .map_err(|_| ())?
                .to_be_bytes(),
        );
        result.0 = u32::from_be_bytes(bytes);

        let mut bytes = [0u8; 2];
        bytes.copy_from_slice(
            &u16::from_str_radix(components[1], 16)
                .map_err(|_| ())?
                .to_be_bytes(),
        );
        result.1 = u16::from_be_bytes(bytes);
        bytes.copy_from_slice(
            &u16::from_str_radix(components[2], 16)
                .map_err(|_| ())?
                .to_be_bytes(),
        );
        result.2 = u16::from_be_bytes(bytes);

        result.3[..2].copy_from_slice(
            &u16::from_str_radix(components[3], 16)
                .map_err(|_| ())?
                .to_be_bytes(),
        );
        if components[4].len() != 12 {
            return Err(());
        }
        for i in 0..6 {
            result.3[i + 2] =
                u8::from_str_radix(&components[4][i * 2..i * 2 + 2], 16).map_err(|_| ())?;
        }
        Ok(result)
    }
}

impl Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:012x}",
            self.0,
            self.1,
            self.2,
            self.3[0],
            self.3[1],
            self.3[2..]
                .iter()
                .fold(0u64, |acc, &x| (acc << 8) + x as u64)
        )
    }
}

impl std::fmt::Debug for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_GUID_STR: &str = "065eadf1-6daf-1543-b04f-10e69084c9ae";
    const TEST_GUID_BYTES: [u8; 16] = [
        0xf1, 0xad, 0x5e, 0x06, 0xaf, 0x6d, 0x43, 0x15, 0xb0, 0x4f, 0x10, 0xe6, 0x90, 0x84, 0xc9,
        0xae,
    ];

    #[test]
    fn parses_and_round_trips_guid_strings() {
        let guid = TEST_GUID_STR.parse::<Guid>().unwrap();
        assert_eq!(guid, Guid::from(TEST_GUID_BYTES));
        assert_eq!(guid.to_string(), TEST_GUID_STR);
    }

    #[test]
    fn distinct_random_guids() {
        assert_ne!(Guid::gen(), Guid::gen());
    }
}
