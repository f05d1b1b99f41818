use anyhow::{anyhow, Result};
use bech32::{FromBase32, ToBase32, Variant};

const LNURL_HRP: &str = "lnurl";

/// Wallets commonly cap LNURL strings around this length; longer claim URLs
/// are a configuration problem surfaced at creation time.
const MAX_ENCODED_LEN: usize = 2000;

/// Encode a claim URL as an uppercase bech32 LNURL string.
pub fn encode(url: &str) -> Result<String> {
    let encoded = bech32::encode(LNURL_HRP, url.as_bytes().to_base32(), Variant::Bech32)?;
    if encoded.len() > MAX_ENCODED_LEN {
        return Err(anyhow!(
            "encoded LNURL is {} chars, limit is {}",
            encoded.len(),
            MAX_ENCODED_LEN
        ));
    }
    Ok(encoded.to_uppercase())
}

/// Decode an LNURL string back to the claim URL it wraps.
pub fn decode(lnurl: &str) -> Result<String> {
    let (hrp, data, _variant) = bech32::decode(lnurl)?;
    if hrp.to_lowercase() != LNURL_HRP {
        return Err(anyhow!("unexpected human-readable part: {}", hrp));
    }
    let bytes = Vec::<u8>::from_base32(&data)?;
    String::from_utf8(bytes).map_err(|e| anyhow!("LNURL payload is not valid UTF-8: {}", e))
}
