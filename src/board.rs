/// Board identity for supported targets.
///
/// Selected at compile time via feature flags. The capture engine itself is
/// board independent; these constants feed status reports and startup logs.

#[cfg(feature = "board-xiao")]
mod hw {
    pub const BOARD_NAME: &str = "xiao_esp32s3";
    pub const HAS_PSRAM: bool = true;
}

#[cfg(all(feature = "board-m5stickc", not(feature = "board-xiao")))]
mod hw {
    pub const BOARD_NAME: &str = "m5stickc_plus2";
    pub const HAS_PSRAM: bool = false;
}

#[cfg(not(any(feature = "board-xiao", feature = "board-m5stickc")))]
mod hw {
    pub const BOARD_NAME: &str = "unknown";
    pub const HAS_PSRAM: bool = false;
}

pub use hw::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_name_is_not_empty() {
        assert!(!BOARD_NAME.is_empty());
        assert!(BOARD_NAME.is_ascii());
    }
}
