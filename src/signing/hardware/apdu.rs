//! Ledger Algorand app APDUs
//!
//! Signing request framing:
//! - Payload is the 4-byte big-endian account index followed by the
//!   canonical transaction bytes, split into chunks of at most 250 bytes
//! - `P1` marks the first chunk (`0x00`) or a continuation (`0x80`)
//! - `P2` marks whether more chunks follow (`0x80`) or this is the last (`0x00`)
//!
//! Every response ends with a 2-byte status word; the last one carries the
//! 64-byte signature in front of it.

use super::HardwareSignError;

pub const CLA: u8 = 0x80;
pub const INS_SIGN_MSGPACK: u8 = 0x08;

pub const P1_FIRST: u8 = 0x00;
pub const P1_MORE: u8 = 0x80;
pub const P2_LAST: u8 = 0x00;
pub const P2_MORE: u8 = 0x80;

/// Largest data field per frame
pub const CHUNK_SIZE: usize = 250;

pub const SW_OK: u16 = 0x9000;
pub const SW_USER_REJECTED: u16 = 0x6985;

const HEADER_LEN: usize = 5;

/// Frames for signing `txn_bytes` with the device account at `account_index`
pub fn sign_frames(account_index: u32, txn_bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut payload = Vec::with_capacity(4 + txn_bytes.len());
    payload.extend_from_slice(&account_index.to_be_bytes());
    payload.extend_from_slice(txn_bytes);

    let chunks: Vec<&[u8]> = payload.chunks(CHUNK_SIZE).collect();
    let last = chunks.len() - 1;

    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let p1 = if i == 0 { P1_FIRST } else { P1_MORE };
            let p2 = if i == last { P2_LAST } else { P2_MORE };
            let mut frame = Vec::with_capacity(HEADER_LEN + chunk.len());
            // chunk.len() <= CHUNK_SIZE fits the one-byte length field
            frame.extend_from_slice(&[CLA, INS_SIGN_MSGPACK, p1, p2, chunk.len() as u8]);
            frame.extend_from_slice(chunk);
            frame
        })
        .collect()
}

/// Split a response into its data and check the status word
pub fn parse_response(response: &[u8]) -> Result<&[u8], HardwareSignError> {
    if response.len() < 2 {
        return Err(HardwareSignError::InvalidResponse(format!(
            "{} byte response",
            response.len()
        )));
    }
    let (data, sw) = response.split_at(response.len() - 2);
    match u16::from_be_bytes([sw[0], sw[1]]) {
        SW_OK => Ok(data),
        SW_USER_REJECTED => Err(HardwareSignError::UserRejected),
        other => Err(HardwareSignError::DeviceError(other)),
    }
}

/// Extract the signature from the final response
pub fn parse_signature(response: &[u8]) -> Result<[u8; 64], HardwareSignError> {
    let data = parse_response(response)?;
    data.try_into().map_err(|_| {
        HardwareSignError::InvalidResponse(format!("expected 64-byte signature, got {} bytes", data.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame() {
        let frames = sign_frames(2, &[0xAA; 10]);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..5], &[CLA, INS_SIGN_MSGPACK, P1_FIRST, P2_LAST, 14]);
        assert_eq!(&frames[0][5..9], &[0, 0, 0, 2]);
        assert_eq!(&frames[0][9..], &[0xAA; 10]);
    }

    #[test]
    fn test_chunking() {
        // 4 + 500 bytes of payload -> 250, 250, 4
        let frames = sign_frames(0, &[0x11; 500]);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0][2..5], [P1_FIRST, P2_MORE, 250]);
        assert_eq!(frames[1][2..5], [P1_MORE, P2_MORE, 250]);
        assert_eq!(frames[2][2..5], [P1_MORE, P2_LAST, 4]);

        let reassembled: Vec<u8> = frames.iter().flat_map(|f| f[5..].to_vec()).collect();
        assert_eq!(&reassembled[..4], &[0, 0, 0, 0]);
        assert_eq!(reassembled.len(), 504);
    }

    #[test]
    fn test_exact_chunk_boundary() {
        let frames = sign_frames(0, &[0x22; 246]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][3], P2_LAST);
    }

    #[test]
    fn test_parse_status_words() {
        assert_eq!(parse_response(&[0x90, 0x00]).unwrap(), &[] as &[u8]);
        assert_eq!(parse_response(&[0x69, 0x85]), Err(HardwareSignError::UserRejected));
        assert_eq!(parse_response(&[0x6a, 0x80]), Err(HardwareSignError::DeviceError(0x6a80)));
        assert!(matches!(parse_response(&[0x90]), Err(HardwareSignError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_signature() {
        let mut response = vec![7u8; 64];
        response.extend_from_slice(&[0x90, 0x00]);
        assert_eq!(parse_signature(&response).unwrap(), [7u8; 64]);

        assert!(matches!(
            parse_signature(&[1, 2, 3, 0x90, 0x00]),
            Err(HardwareSignError::InvalidResponse(_))
        ));
    }
}
