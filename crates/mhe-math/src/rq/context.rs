use num_bigint::BigUint;
use std::{fmt::Debug, sync::Arc};

use crate::{ntt::NttOperator, rns::RnsContext, zq::Modulus, Error, Result};

/// Struct that holds the context associated with elements in rq.
#[derive(Clone, PartialEq, Eq)]
pub struct Context {
    /// List of prime moduli.
    pub(crate) moduli: Box<[u64]>,
    /// Modulus operators for each prime.
    pub(crate) q: Box<[Modulus]>,
    /// RNS context for CRT operations.
    pub(crate) rns: Arc<RnsContext>,
    /// NTT operators for each prime.
    pub(crate) ops: Box<[NttOperator]>,
    /// Polynomial degree (a power of 2).
    pub(crate) degree: usize,
    /// Inverse of the last modulus modulo each other modulus, for the rounded
    /// division by the last modulus.
    pub(crate) inv_last_qi_mod_qj: Box<[u64]>,
    /// Shoup representation of `inv_last_qi_mod_qj`.
    pub(crate) inv_last_qi_mod_qj_shoup: Box<[u64]>,
    /// Link to the context with one less modulus.
    pub(crate) next_context: Option<Arc<Context>>,
}

impl Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("moduli", &self.moduli)
            .field("degree", &self.degree)
            .finish()
    }
}

impl Context {
    /// Creates a context from a list of moduli and a polynomial degree.
    ///
    /// Returns an error if the moduli are not distinct primes of at most 62
    /// bits supporting the NTT of size `degree`.
    pub fn new(moduli: &[u64], degree: usize) -> Result<Self> {
        if !degree.is_power_of_two() || degree < 8 {
            return Err(Error::Default(
                "The degree is not a power of two larger or equal to 8".to_string(),
            ));
        }

        let mut q = Vec::with_capacity(moduli.len());
        let mut ops = Vec::with_capacity(moduli.len());
        let rns = Arc::new(RnsContext::new(moduli)?);
        for modulus in moduli {
            let qi = Modulus::new(*modulus)?;
            if let Some(op) = NttOperator::new(&qi, degree) {
                q.push(qi);
                ops.push(op);
            } else {
                return Err(Error::Default(
                    "Impossible to construct an Ntt operator".to_string(),
                ));
            }
        }

        let q_last = moduli.last().unwrap();
        let mut inv_last_qi_mod_qj = vec![];
        let mut inv_last_qi_mod_qj_shoup = vec![];
        for qi in &q[..q.len() - 1] {
            let inv = qi.inv(qi.reduce(*q_last)).unwrap();
            inv_last_qi_mod_qj.push(inv);
            inv_last_qi_mod_qj_shoup.push(qi.shoup(inv));
        }

        let next_context = if moduli.len() >= 2 {
            Some(Arc::new(Context::new(&moduli[..moduli.len() - 1], degree)?))
        } else {
            None
        };

        Ok(Self {
            moduli: moduli.to_owned().into_boxed_slice(),
            q: q.into_boxed_slice(),
            rns,
            ops: ops.into_boxed_slice(),
            degree,
            inv_last_qi_mod_qj: inv_last_qi_mod_qj.into_boxed_slice(),
            inv_last_qi_mod_qj_shoup: inv_last_qi_mod_qj_shoup.into_boxed_slice(),
            next_context,
        })
    }

    /// Creates a context in an `Arc`.
    pub fn new_arc(moduli: &[u64], degree: usize) -> Result<Arc<Self>> {
        Self::new(moduli, degree).map(Arc::new)
    }

    /// Returns the modulus as a BigUint.
    pub fn modulus(&self) -> &BigUint {
        self.rns.modulus()
    }

    /// Returns a reference to the moduli in this context.
    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    /// Returns a reference to the modulus operators in this context.
    pub fn moduli_operators(&self) -> &[Modulus] {
        &self.q
    }

    /// Returns the RNS context.
    pub fn rns(&self) -> &Arc<RnsContext> {
        &self.rns
    }

    /// Returns the polynomial degree.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Returns the context with one less modulus, if any.
    pub fn next_context(&self) -> Option<&Arc<Context>> {
        self.next_context.as_ref()
    }

    /// Returns the number of iterations to switch to a child context, or an
    /// error if the provided context is not a child of this one.
    pub fn niterations_to(&self, context: &Arc<Context>) -> Result<usize> {
        if context.as_ref() == self {
            return Ok(0);
        }

        let mut niterations = 0;
        let mut current_ctx = self.next_context.clone();
        while let Some(ctx) = current_ctx {
            niterations += 1;
            if &ctx == context {
                return Ok(niterations);
            }
            current_ctx = ctx.next_context.clone();
        }
        Err(Error::InvalidContext)
    }

    /// Returns the context after `i` iterations down the chain.
    pub fn context_at_level(&self, i: usize) -> Result<Arc<Self>> {
        if i >= self.moduli.len() {
            return Err(Error::Default(
                "No context at the specified level".to_string(),
            ));
        }
        let mut current_ctx = Arc::new(self.clone());
        for _ in 0..i {
            current_ctx = current_ctx.next_context.as_ref().unwrap().clone();
        }
        Ok(current_ctx)
    }

}
