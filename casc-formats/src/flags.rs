//! Locale and content flag bitmasks used by root-table filtering.

/// Locale bits as stored in root-type headers.
pub mod locale {
    pub const EN_US: u32 = 0x2;
    pub const KO_KR: u32 = 0x4;
    pub const FR_FR: u32 = 0x10;
    pub const DE_DE: u32 = 0x20;
    pub const ZH_CN: u32 = 0x40;
    pub const ES_ES: u32 = 0x80;
    pub const ZH_TW: u32 = 0x100;
    pub const EN_GB: u32 = 0x200;
    pub const ES_MX: u32 = 0x1000;
    pub const RU_RU: u32 = 0x2000;
    pub const PT_BR: u32 = 0x4000;
    pub const IT_IT: u32 = 0x8000;
    pub const PT_PT: u32 = 0x10000;
}

/// Content bits as stored in root-type headers.
pub mod content {
    pub const LOAD_ON_WINDOWS: u32 = 0x8;
    pub const LOAD_ON_MACOS: u32 = 0x10;
    pub const LOW_VIOLENCE: u32 = 0x80;
    pub const DO_NOT_LOAD: u32 = 0x100;
    pub const UPDATE_PLUGIN: u32 = 0x800;
    pub const ENCRYPTED: u32 = 0x0800_0000;
    pub const NO_NAME_HASH: u32 = 0x1000_0000;
    pub const UNCOMMON_RESOLUTION: u32 = 0x2000_0000;
    pub const BUNDLE: u32 = 0x4000_0000;
    pub const NO_COMPRESSION: u32 = 0x8000_0000;
}
