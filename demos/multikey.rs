//! End-to-end multiparty flow: N parties jointly generate a collective
//! public key, a relinearization key, and rotation keys, evaluate on a
//! ciphertext encrypted under the collective key, and finally key-switch
//! the result to a designated receiver who decrypts it alone.

use mhe::ckks::{
    Ciphertext, CkksParametersBuilder, Complex, Encoding, Plaintext, PublicKey,
    RelinearizationKey, RotationKeySet, SecretKey,
};
use mhe::mckks::{
    AggregateIter, CommonRandomPoly, KeySwitchShare, PublicKeyShare, RelinKeyGenerator,
    RelinKeyShare, RotationKeyShare,
};
use mhe_traits::{FheDecoder, FheDecrypter, FheEncoder, FheEncrypter};
use rand::{thread_rng, Rng};

const NUM_PARTIES: usize = 10;
const SIGMA_SMUDGING: f64 = 3.2;

fn max_error(actual: &[Complex], expected: &[Complex]) -> f64 {
    actual
        .iter()
        .zip(expected.iter())
        .map(|(a, b)| (*a - *b).abs())
        .fold(0.0, f64::max)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = thread_rng();

    let par = CkksParametersBuilder::new()
        .set_degree(1024)
        .set_moduli_sizes(&[60, 40, 40, 40])
        .set_special_modulus_size(61)
        .set_scale((1u64 << 40) as f64)
        .build_arc()?;
    let log_qp = par.moduli_sizes().iter().sum::<usize>() + 61;
    println!(
        "CKKS parameters: logN = {}, slots = {}, levels = {}, logQP ~ {}, scale = 2^40",
        par.degree().ilog2(),
        par.slots(),
        par.moduli().len(),
        log_qp
    );
    println!("Simulating {NUM_PARTIES} parties; party 0 acts as the aggregator.\n");

    // Each party's additive share of the collective secret key. The combined
    // key only ever exists virtually, as the sum of these shares.
    let sk_shares: Vec<SecretKey> = (0..NUM_PARTIES)
        .map(|_| SecretKey::random(&par, &mut rng))
        .collect();

    // --- Collective public-key generation -------------------------------
    // In a real deployment the CRP is derived by every party from a common
    // reference string; here a seed plays that role.
    let crp = CommonRandomPoly::new_deterministic(&par, [1u8; 32])?;
    let pk: PublicKey = sk_shares
        .iter()
        .map(|sk| PublicKeyShare::new(sk, crp.clone(), &mut rng))
        .aggregate()?;
    println!("CKG: collective public key generated.");

    // --- Collective relinearization-key generation (two rounds) ---------
    let rkg_crps = CommonRandomPoly::new_vec_deterministic(&par, [2u8; 32])?;
    let generators: Vec<RelinKeyGenerator> = sk_shares
        .iter()
        .map(|sk| RelinKeyGenerator::new(sk, &rkg_crps, &mut rng))
        .collect::<mhe::Result<_>>()?;
    let round1: RelinKeyShare = generators
        .iter()
        .map(|g| g.round_one(&mut rng))
        .aggregate()?;
    let round2: RelinKeyShare = generators
        .iter()
        .map(|g| g.round_two(&round1, &mut rng))
        .aggregate()?;
    let rlk: RelinearizationKey = RelinKeyShare::assemble(&round1, &round2)?;
    println!("RKG: collective relinearization key generated.");

    // --- Collective rotation-key generation, one run per element --------
    let mut rotation_keys = RotationKeySet::new(&par);
    for (i, galois_element) in [par.galois_element_for_rotation(1)]
        .into_iter()
        .chain([par.galois_element_for_conjugation()])
        .enumerate()
    {
        // Fresh CRPs per Galois element.
        let crps = CommonRandomPoly::new_vec_deterministic(&par, [3 + i as u8; 32])?;
        let agg: RotationKeyShare = sk_shares
            .iter()
            .map(|sk| RotationKeyShare::new(sk, galois_element, &crps, &mut rng))
            .aggregate()?;
        rotation_keys.insert(agg.finalize(&crps)?)?;
    }
    println!("RTG: collective rotation keys generated.\n");

    // --- Evaluate under the collective key ------------------------------
    let values: Vec<Complex> = (0..par.slots())
        .map(|_| Complex::new(rng.gen_range(-3.0..3.0), 0.0))
        .collect();
    let pt = Plaintext::try_encode(values.as_slice(), Encoding::simd(), &par)?;
    let ct = pk.try_encrypt(&pt, &mut rng)?;

    // Square, relinearize with the collective key, rescale.
    let mut squared = &ct * &ct;
    rlk.relinearizes(&mut squared)?;
    squared.rescale()?;

    // Rotate the squared ciphertext by one slot.
    let rotation_key = rotation_keys.get_switching_key(par.galois_element_for_rotation(1))?;
    let rotated = rotation_key.rotates(&squared)?;

    // --- Key-switch to the receiver and decrypt -------------------------
    // The result is re-encrypted from the collective key to party 0's own
    // key: party 0 contributes its personal key as the target share, the
    // other parties contribute the zero key.
    let receiver = SecretKey::random(&par, &mut rng);
    let zero_key = SecretKey::new(vec![0; par.degree()], &par);
    let switched: Ciphertext = sk_shares
        .iter()
        .enumerate()
        .map(|(i, sk)| {
            let target = if i == 0 { &receiver } else { &zero_key };
            KeySwitchShare::new(sk, target, SIGMA_SMUDGING, &rotated, &mut rng)
        })
        .aggregate::<KeySwitchShare>()?
        .key_switch(&rotated)?;

    let decoded = Vec::<Complex>::try_decode(&receiver.try_decrypt(&switched)?)?;
    let mut expected: Vec<Complex> = values.iter().map(|z| *z * *z).collect();
    expected.rotate_left(1);

    println!("Evaluated rotate(m^2, 1) under the collective key.");
    println!("CKS: switched the result to the receiver's personal key.");
    println!("Maximum slot error = {:.3e}", max_error(&decoded, &expected));

    Ok(())
}
