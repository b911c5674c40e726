use crate::{append_point, labels, point_from_bytes, scalar_from_bytes, SealError, MAX_INPUTS};
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar};
use merlin::Transcript;
use purchase_ledger_primitives::{AccountId, CiphertextHandle, Domain};

/// Bytes per `(A_i, z_i)` pair.
pub const POK_LEN: usize = 64;

/// Fiat–Shamir transcript shared by prover and verifier.
pub fn input_transcript(
    domain: &Domain,
    owner: &AccountId,
    entries: &[(CiphertextHandle, RistrettoPoint)],
) -> Transcript {
    let mut t = Transcript::new(labels::PROTOCOL);
    t.append_message(b"proto", labels::PROTOCOL_V);
    t.append_message(b"domain", domain.as_bytes());
    t.append_message(b"owner", owner.as_bytes());
    t.append_u64(b"count", entries.len() as u64);
    for (handle, big_r) in entries {
        t.append_message(b"handle", handle.id());
        t.append_message(b"type", &[handle.value_type().tag()]);
        append_point(&mut t, b"R", big_r);
    }
    t
}

pub fn encode_input_proof(parts: &[(RistrettoPoint, Scalar)]) -> Result<Vec<u8>, SealError> {
    if parts.is_empty() || parts.len() > MAX_INPUTS {
        return Err(SealError::Malformed("proof count"));
    }
    let mut out = Vec::with_capacity(1 + parts.len() * POK_LEN);
    out.push(parts.len() as u8);
    for (a, z) in parts {
        out.extend_from_slice(a.compress().as_bytes());
        out.extend_from_slice(z.as_bytes());
    }
    Ok(out)
}

pub fn decode_input_proof(bytes: &[u8]) -> Result<Vec<(RistrettoPoint, Scalar)>, SealError> {
    let (&count, rest) = bytes.split_first().ok_or(SealError::Malformed("empty proof"))?;
    let count = count as usize;
    if count == 0 || count > MAX_INPUTS {
        return Err(SealError::Malformed("proof count"));
    }
    if rest.len() != count * POK_LEN {
        return Err(SealError::Malformed("proof length"));
    }
    rest.chunks_exact(POK_LEN)
        .map(|chunk| {
            let mut a = [0u8; 32];
            a.copy_from_slice(&chunk[..32]);
            let mut z = [0u8; 32];
            z.copy_from_slice(&chunk[32..]);
            Ok((point_from_bytes(&a)?, scalar_from_bytes(&z)?))
        })
        .collect()
}
