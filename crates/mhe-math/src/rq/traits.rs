//! Conversion traits for polynomials.

use super::{Context, Poly, Representation};
use crate::Result;
use itertools::izip;
use std::sync::Arc;

/// Conversions to a polynomial.
///
/// We unfortunately cannot use the `TryFrom` trait from std::convert because
/// we need to specify additional parameters, namely the context and the
/// representation.
pub trait TryConvertFrom<T>
where
    Self: Sized,
{
    /// Attempt to convert `value` into a polynomial in the given context and
    /// representation.
    fn try_convert_from(
        value: T,
        ctx: &Arc<Context>,
        representation: Representation,
    ) -> Result<Self>;
}

impl TryConvertFrom<&[i64]> for Poly {
    fn try_convert_from(
        value: &[i64],
        ctx: &Arc<Context>,
        representation: Representation,
    ) -> Result<Self> {
        if value.len() > ctx.degree {
            return Err(crate::Error::Default(
                "The value has too many coefficients".to_string(),
            ));
        }
        let mut p = Poly::zero(ctx, Representation::PowerBasis);
        for (mut row, qi) in izip!(p.coefficients_mut().outer_iter_mut(), ctx.q.iter()) {
            for (x, v) in row.iter_mut().zip(value.iter()) {
                *x = qi.reduce_i64(*v);
            }
        }
        p.change_representation(representation);
        Ok(p)
    }
}

impl TryConvertFrom<&[u64]> for Poly {
    fn try_convert_from(
        value: &[u64],
        ctx: &Arc<Context>,
        representation: Representation,
    ) -> Result<Self> {
        if value.len() > ctx.degree {
            return Err(crate::Error::Default(
                "The value has too many coefficients".to_string(),
            ));
        }
        let mut p = Poly::zero(ctx, Representation::PowerBasis);
        for (mut row, qi) in izip!(p.coefficients_mut().outer_iter_mut(), ctx.q.iter()) {
            for (x, v) in row.iter_mut().zip(value.iter()) {
                *x = qi.reduce(*v);
            }
        }
        p.change_representation(representation);
        Ok(p)
    }
}

#[cfg(test)]
mod tests {
    use super::TryConvertFrom;
    use crate::rq::{Context, Poly, Representation};

    const MODULI: &[u64; 2] = &[1153, 4611686018326724609];

    #[test]
    fn signed_coefficients_are_reduced_per_limb() {
        let ctx = Context::new_arc(MODULI, 8).unwrap();
        let p =
            Poly::try_convert_from([-1i64, 1].as_slice(), &ctx, Representation::PowerBasis)
                .unwrap();
        for (row, qi) in p
            .coefficients()
            .outer_iter()
            .zip(ctx.moduli_operators().iter())
        {
            assert_eq!(row[0], qi.modulus() - 1);
            assert_eq!(row[1], 1);
            assert_eq!(row[2], 0);
        }
    }

    #[test]
    fn too_many_coefficients() {
        let ctx = Context::new_arc(MODULI, 8).unwrap();
        assert!(
            Poly::try_convert_from([0i64; 9].as_slice(), &ctx, Representation::PowerBasis)
                .is_err()
        );
    }
}
