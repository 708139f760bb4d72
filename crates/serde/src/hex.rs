use primitive_types::H256;

/// Errors produced when decoding a `0x` prefixed hex string.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HexError {
    #[error("could not byteify non 0x prefixed string")]
    MissingPrefix,
    #[error("invalid hex string: {0}")]
    Invalid(#[from] hex::FromHexError),
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Encodes bytes as a lowercase hex string with a leading `0x`.
pub fn encode_prefixed(bytes: impl AsRef<[u8]>) -> String {
    let bytes = bytes.as_ref();
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    out.push_str(&hex::encode(bytes));
    out
}

/// Decodes a hex string which must start with `0x`. An empty payload (`"0x"`) yields no bytes.
pub fn decode_prefixed(s: &str) -> Result<Vec<u8>, HexError> {
    let digits = s.strip_prefix("0x").ok_or(HexError::MissingPrefix)?;
    Ok(hex::decode(digits)?)
}

/// Decodes a `0x` prefixed hex string into exactly `N` bytes.
pub fn decode_prefixed_array<const N: usize>(s: &str) -> Result<[u8; N], HexError> {
    let bytes = decode_prefixed(s)?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| HexError::InvalidLength {
        expected: N,
        actual: bytes.len(),
    })
}

/// [serde_with] adapter which (de)serializes byte containers as `0x` prefixed hex strings.
pub struct HexBytes;

impl<T> serde_with::SerializeAs<T> for HexBytes
where
    T: AsRef<[u8]>,
{
    fn serialize_as<S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&encode_prefixed(value))
    }
}

impl<'de> serde_with::DeserializeAs<'de, Vec<u8>> for HexBytes {
    fn deserialize_as<D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_str(HexVisitor)
    }
}

impl<'de, const N: usize> serde_with::DeserializeAs<'de, [u8; N]> for HexBytes {
    fn deserialize_as<D>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = deserializer.deserialize_str(HexVisitor)?;
        let len = bytes.len();
        <[u8; N]>::try_from(bytes).map_err(|_| {
            serde::de::Error::invalid_length(len, &format!("{N} bytes").as_str())
        })
    }
}

impl<'de> serde_with::DeserializeAs<'de, H256> for HexBytes {
    fn deserialize_as<D>(deserializer: D) -> Result<H256, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = <HexBytes as serde_with::DeserializeAs<'de, [u8; 32]>>::deserialize_as(
            deserializer,
        )?;
        Ok(H256(bytes))
    }
}

struct HexVisitor;

impl<'de> serde::de::Visitor<'de> for HexVisitor {
    type Value = Vec<u8>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("'0x' prefix followed by an even number of hex digits")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        decode_prefixed(v).map_err(E::custom)
    }
}
