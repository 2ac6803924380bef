//! Identifier and reference generation

use bech32::Bech32m;
use uuid7::uuid7;

pub const ORGANIZATION_HRP: &str = "org_";
pub const DONOR_HRP: &str = "donor_";
pub const ADMIN_HRP: &str = "admin_";
pub const DONATION_HRP: &str = "don_";
pub const WITHDRAWAL_HRP: &str = "wdr_";
pub const ALLOCATION_HRP: &str = "alloc_";
pub const BENEFICIARY_HRP: &str = "ben_";
pub const STORY_HRP: &str = "story_";

// construct a unique entity id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// `<prefix>-<UPPER HEX UUIDv7>-<unix seconds>`
pub fn new_transaction_reference(prefix: &str, unix_secs: i64) -> String {
    format!("{prefix}-{}-{unix_secs}", hex::encode_upper(uuid7().as_bytes()))
}

/// Hex of a fresh uuid7: unique, and sorts by creation time.
pub fn new_sortable_key() -> String {
    hex::encode(uuid7().as_bytes())
}
