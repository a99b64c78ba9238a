/// Regulatory channel plans for the 2.4 GHz band.
///
/// Every plan starts at channel 1, so a region is fully described by its
/// channel count N. Channel `c` maps to bit `c - 1` of the channel mask.
use heapless::String;

use crate::error::Error;

/// Highest 2.4 GHz channel number (14 is only legal in Japan).
pub const MAX_CHANNELS: u8 = 14;

/// Region code as accepted on the control surface ("DE", "01", "1").
pub type RegionCode = String<3>;

/// One row of the region table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Code accepted by [`Region::lookup`]
    pub code: &'static str,
    /// Two-character country code handed to the radio driver
    pub country: &'static str,
    /// Number of legal channels, 1..=N
    pub channels: u8,
}

impl Region {
    /// Resolve a region code (case-insensitive).
    pub fn lookup(code: &str) -> Result<&'static Region, Error> {
        Self::index_of(code).map(|i| &REGIONS[i])
    }

    /// Position of a region in [`REGIONS`].
    pub(crate) fn index_of(code: &str) -> Result<usize, Error> {
        REGIONS
            .iter()
            .position(|r| r.code.eq_ignore_ascii_case(code))
            .ok_or_else(|| Error::UnsupportedRegion(truncate_code(code)))
    }

    /// Channel mask with every legal channel of this region enabled.
    pub const fn full_mask(&self) -> u16 {
        mask_for(self.channels)
    }
}

/// Channel count for a region code.
pub fn channel_count_for(code: &str) -> Result<u8, Error> {
    Region::lookup(code).map(|r| r.channels)
}

/// Bitmap with the low `channels` bits set.
pub const fn mask_for(channels: u8) -> u16 {
    if channels >= 16 {
        u16::MAX
    } else {
        (1u16 << channels) - 1
    }
}

fn truncate_code(code: &str) -> RegionCode {
    let mut s = RegionCode::new();
    for c in code.chars() {
        if s.push(c).is_err() {
            break;
        }
    }
    s
}

const fn region(code: &'static str, country: &'static str, channels: u8) -> Region {
    Region {
        code,
        country,
        channels,
    }
}

/// Index of the default region in [`REGIONS`].
pub const DEFAULT_REGION: usize = 0;

/// Channel count of the default region.
pub const DEFAULT_CHANNELS: u8 = 13;

/// Supported region table. Row 0 is the default.
pub static REGIONS: &[Region] = &[
    // World-safe plan
    region("01", "01", 13),
    // Legacy numeric code, kept for configs written against the 1.0 API
    region("1", "DE", 13),
    region("AT", "AT", 13),
    region("AU", "AU", 13),
    region("BE", "BE", 13),
    region("BG", "BG", 13),
    region("BR", "BR", 13),
    region("CA", "CA", 11),
    region("CH", "CH", 13),
    region("CN", "CN", 13),
    region("CY", "CY", 13),
    region("CZ", "CZ", 13),
    region("DE", "DE", 13),
    region("DK", "DK", 13),
    region("EE", "EE", 13),
    region("ES", "ES", 13),
    region("FI", "FI", 13),
    region("FR", "FR", 13),
    region("GB", "GB", 13),
    region("GR", "GR", 13),
    region("HK", "HK", 13),
    region("HR", "HR", 13),
    region("HU", "HU", 13),
    region("IE", "IE", 13),
    region("IN", "IN", 13),
    region("IS", "IS", 13),
    region("IT", "IT", 13),
    region("JP", "JP", 14),
    region("KR", "KR", 13),
    region("LI", "LI", 13),
    region("LT", "LT", 13),
    region("LU", "LU", 13),
    region("LV", "LV", 13),
    region("MT", "MT", 13),
    region("MX", "MX", 11),
    region("NL", "NL", 13),
    region("NO", "NO", 13),
    region("NZ", "NZ", 13),
    region("PL", "PL", 13),
    region("PT", "PT", 13),
    region("RO", "RO", 13),
    region("SE", "SE", 13),
    region("SI", "SI", 13),
    region("SK", "SK", 13),
    region("TW", "TW", 11),
    region("US", "US", 11),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_regions() {
        assert_eq!(channel_count_for("DE").unwrap(), 13);
        assert_eq!(channel_count_for("US").unwrap(), 11);
        assert_eq!(channel_count_for("JP").unwrap(), 14);
        assert_eq!(channel_count_for("01").unwrap(), 13);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(Region::lookup("de").unwrap().country, "DE");
    }

    #[test]
    fn legacy_numeric_code_maps_to_germany() {
        let r = Region::lookup("1").unwrap();
        assert_eq!(r.country, "DE");
        assert_eq!(r.channels, 13);
    }

    #[test]
    fn unknown_region_is_rejected() {
        match Region::lookup("XYZW") {
            Err(Error::UnsupportedRegion(code)) => assert_eq!(code.as_str(), "XYZ"),
            other => panic!("expected UnsupportedRegion, got {other:?}"),
        }
        assert!(channel_count_for("").is_err());
        assert!(channel_count_for("2").is_err());
    }

    #[test]
    fn table_invariants() {
        assert_eq!(REGIONS[DEFAULT_REGION].code, "01");
        assert_eq!(REGIONS[DEFAULT_REGION].channels, DEFAULT_CHANNELS);
        for r in REGIONS {
            assert!(r.channels >= 1 && r.channels <= MAX_CHANNELS, "{}", r.code);
            assert_eq!(r.country.len(), 2, "{}", r.code);
        }
    }

    #[test]
    fn full_mask_width_matches_channel_count() {
        assert_eq!(Region::lookup("US").unwrap().full_mask(), 0b111_1111_1111);
        assert_eq!(Region::lookup("JP").unwrap().full_mask().count_ones(), 14);
        assert_eq!(mask_for(0), 0);
        assert_eq!(mask_for(16), u16::MAX);
    }
}
