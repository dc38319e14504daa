//! Streams split at arbitrary points must decode to the same frames.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use turnpilot_networking::{
    encode_inbound_frame, ConnectionCrypto, CryptoError, CryptoResult, FrameDecoder,
};

/// Toy cipher: XOR with a key byte, first byte is a tag that must match.
struct Xor {
    key: u8,
}

impl ConnectionCrypto for Xor {
    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut out = vec![self.key];
        out.extend(plaintext.iter().map(|b| b ^ self.key));
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        match ciphertext.split_first() {
            Some((tag, body)) if *tag == self.key => Ok(body.iter().map(|b| b ^ self.key).collect()),
            _ => Err(CryptoError::Decryption("tag mismatch".to_string())),
        }
    }
}

fn messages(rng: &mut StdRng, count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|_| {
            let len = rng.gen_range(1..300);
            (0..len).map(|_| rng.gen()).collect()
        })
        .collect()
}

#[test]
fn test_random_splits_decode_every_frame() {
    let mut rng = StdRng::seed_from_u64(0x7075_726e);
    let crypto = Xor { key: 0x5A };
    let originals = messages(&mut rng, 200);

    let stream: Vec<u8> = originals
        .iter()
        .flat_map(|message| encode_inbound_frame(&crypto.encrypt(message).unwrap()).unwrap())
        .collect();

    for _ in 0..20 {
        let mut decoder = FrameDecoder::new();
        let mut decoded = Vec::new();
        let mut rest = stream.as_slice();

        while !rest.is_empty() {
            let cut = rng.gen_range(1..=rest.len().min(700));
            let (chunk, tail) = rest.split_at(cut);
            decoder.push(chunk);
            decoded.extend(decoder.frames().map(|frame| crypto.decrypt(&frame).unwrap()));
            rest = tail;
        }

        assert_eq!(decoded, originals);
        assert_eq!(decoder.pending_len(), 0);
    }
}

#[test]
fn test_byte_at_a_time() {
    let crypto = Xor { key: 0x11 };
    let stream: Vec<u8> = [b"left".as_slice(), b"right".as_slice(), b"straight".as_slice()]
        .iter()
        .flat_map(|message| encode_inbound_frame(&crypto.encrypt(message).unwrap()).unwrap())
        .collect();

    let mut decoder = FrameDecoder::new();
    let mut decoded = Vec::new();
    for byte in &stream {
        decoder.push(std::slice::from_ref(byte));
        decoded.extend(decoder.frames());
    }

    let plain: Vec<Vec<u8>> = decoded
        .iter()
        .map(|frame| crypto.decrypt(frame).unwrap())
        .collect();
    assert_eq!(plain, vec![b"left".to_vec(), b"right".to_vec(), b"straight".to_vec()]);
}

#[test]
fn test_wrong_key_is_detected() {
    let sender = Xor { key: 1 };
    let receiver = Xor { key: 2 };
    let frame = encode_inbound_frame(&sender.encrypt(b"hello").unwrap()).unwrap();

    let mut decoder = FrameDecoder::new();
    decoder.push(&frame);
    let payload = decoder.next_frame().unwrap();

    assert!(receiver.decrypt(&payload).is_err());
}
