//! Compressed segment codec for blackboard persistence.
//!
//! Hosts that store the blackboard in a size-limited memory segment encode it
//! as bincode -> gzip -> base64. JSON via serde remains available for hosts
//! that prefer readable storage.

use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn encode_to_string<T>(data: &T) -> Result<String, String>
where
    T: Serialize,
{
    let serialized_data = bincode::serialize(data).map_err(|e| e.to_string())?;

    encode_buffer_to_string(&serialized_data)
}

pub fn encode_buffer_to_string(data: &[u8]) -> Result<String, String> {
    use flate2::write::*;
    use flate2::*;
    use std::io::prelude::*;

    let mut compressor = GzEncoder::new(Vec::with_capacity(1024 * 20), Compression::default());

    compressor.write_all(data).map_err(|e| e.to_string())?;

    let compressed_data = compressor.finish().map_err(|e| e.to_string())?;

    let encoded_data = base64::encode(&compressed_data);

    Ok(encoded_data)
}

pub fn decode_from_string<T>(data: &str) -> Result<T, String>
where
    T: DeserializeOwned,
{
    let decoded_data = decode_buffer_from_string(data)?;

    let data = bincode::deserialize_from(decoded_data.as_slice()).map_err(|e| e.to_string())?;

    Ok(data)
}

pub fn decode_buffer_from_string(data: &str) -> Result<Vec<u8>, String> {
    use flate2::read::*;
    use std::io::prelude::*;

    let decoded_data = base64::decode(data).map_err(|e| e.to_string())?;

    let mut decompressor = GzDecoder::new(decoded_data.as_slice());

    let mut decompressed_data = Vec::with_capacity(1024 * 20);

    decompressor.read_to_end(&mut decompressed_data).map_err(|e| e.to_string())?;

    Ok(decompressed_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Payload {
        tick: u64,
        names: Vec<String>,
    }

    #[test]
    fn round_trips_through_segment_encoding() {
        let payload = Payload {
            tick: 12345,
            names: vec!["harvester-12345-0".to_string(), "hauler-12345-1".to_string()],
        };

        let encoded = encode_to_string(&payload).unwrap();
        let decoded: Payload = decode_from_string(&encoded).unwrap();

        assert_eq!(decoded, payload);
    }

    #[test]
    fn rejects_garbage_input() {
        assert!(decode_from_string::<Payload>("not base64 at all!").is_err());
    }
}
