use crate::KmsError;
use curve25519_dalek::ristretto::RistrettoPoint;
use purchase_ledger_primitives::{AccountId, CiphertextHandle, Domain};
use sealed_primitives::{
    append_point, challenge_scalar, decode_input_proof, input_transcript, labels, G,
};

/// Check the batched Schnorr proof over `(handle_i, R_i)`.
///
/// For each `i`: `z_i·G == A_i + c·R_i`, with `c` drawn from the shared
/// input transcript after every `A_i` is appended. Stateless; the caller
/// is responsible for handle bookkeeping.
pub fn check_input_proof(
    domain: &Domain,
    owner: &AccountId,
    entries: &[(CiphertextHandle, RistrettoPoint)],
    proof: &[u8],
) -> Result<(), KmsError> {
    let parts = decode_input_proof(proof)?;
    if parts.len() != entries.len() {
        return Err(KmsError::ProofInvalid);
    }

    let mut t = input_transcript(domain, owner, entries);
    for (a, _) in &parts {
        append_point(&mut t, b"A", a);
    }
    let c = challenge_scalar(&mut t, labels::CHAL_POK);

    let ok = parts
        .iter()
        .zip(entries)
        .all(|((a, z), (_, big_r))| z * G == a + c * big_r);
    if ok {
        Ok(())
    } else {
        Err(KmsError::ProofInvalid)
    }
}
