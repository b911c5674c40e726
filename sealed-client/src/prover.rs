use crate::ClientError;
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar};
use purchase_ledger_primitives::{AccountId, CiphertextHandle, Domain, TypedValue};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sealed_primitives::{
    append_point, challenge_scalar, derive_handle, encode_input_proof, input_transcript, labels,
    point_from_bytes, random_scalar, seal_value, BundleEntry, InputBundle, SealContext, G,
    MAX_INPUTS,
};

pub struct SealInput {
    pub domain: Domain,
    pub owner: AccountId,
    /// Compressed network public key.
    pub network_pk: [u8; 32],
    pub values: Vec<TypedValue>,
    /// Deterministic RNG seed (tests).
    pub rng_seed: [u8; 32],
}

pub struct SealOutput {
    /// What the KMS needs to store before the proof is checked.
    pub bundle: InputBundle,
    /// One per input value, same order.
    pub handles: Vec<CiphertextHandle>,
    /// `count(1) || (A_i(32) || z_i(32))*`
    pub proof: Vec<u8>,
}

/// Seal every value and prove knowledge of each sealing scalar.
///
/// Draw order from the seeded RNG: all `r_i` first, then all Schnorr
/// nonces `k_i`.
///
/// # Errors
/// * `ClientError::InvalidInput` - empty batch or more than `MAX_INPUTS`
/// * `ClientError::Seal` - bad network key or a value wider than its type
pub fn prove_input(inp: &SealInput) -> Result<SealOutput, ClientError> {
    if inp.values.is_empty() {
        return Err(ClientError::InvalidInput("no values to seal"));
    }
    if inp.values.len() > MAX_INPUTS {
        return Err(ClientError::InvalidInput("too many values"));
    }
    let network_pk = point_from_bytes(&inp.network_pk)?;
    let mut rng = ChaCha20Rng::from_seed(inp.rng_seed);

    let mut entries = Vec::with_capacity(inp.values.len());
    let mut witnesses: Vec<(Scalar, RistrettoPoint)> = Vec::with_capacity(inp.values.len());
    for (i, v) in inp.values.iter().enumerate() {
        let r = random_scalar(&mut rng);
        let ctx = SealContext {
            domain: inp.domain,
            owner: inp.owner,
            index: i as u8,
            value_type: v.value_type,
        };
        let ciphertext = seal_value(&network_pk, &ctx, v.value, &r)?;
        let handle = derive_handle(&ctx, &ciphertext);
        entries.push(BundleEntry { handle, index: ctx.index, ciphertext });
        witnesses.push((r, r * G));
    }

    let bound: Vec<_> = entries
        .iter()
        .zip(&witnesses)
        .map(|(e, (_, big_r))| (e.handle, *big_r))
        .collect();
    let mut t = input_transcript(&inp.domain, &inp.owner, &bound);

    let nonces: Vec<Scalar> = witnesses.iter().map(|_| random_scalar(&mut rng)).collect();
    let commitments: Vec<RistrettoPoint> = nonces.iter().map(|k| k * G).collect();
    for a in &commitments {
        append_point(&mut t, b"A", a);
    }
    let c = challenge_scalar(&mut t, labels::CHAL_POK);

    let parts: Vec<_> = commitments
        .into_iter()
        .zip(nonces.iter().zip(&witnesses))
        .map(|(a, (k, (r, _)))| (a, k + c * r))
        .collect();
    let proof = encode_input_proof(&parts)?;

    let handles = entries.iter().map(|e| e.handle).collect();
    Ok(SealOutput {
        bundle: InputBundle { domain: inp.domain, owner: inp.owner, entries },
        handles,
        proof,
    })
}
