//! Secret sharing polynomials over an abstract group.
//!
//! Share `i` of a polynomial is its evaluation at `x = i + 1`, so index 0 never reveals the
//! secret.

use ark_std::{end_timer, start_timer};
use itertools::Itertools;
use rand_core::{CryptoRng, RngCore};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::group::{Element, Group, Scalar};

/// Errors raised by polynomial arithmetic and Lagrange recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, displaydoc::Display, thiserror::Error)]
pub enum PolyError {
    /// The input slices have different lengths ({0} != {1}).
    InvalidInputLengths(usize, usize),
    /// An attempt was made to invert zero.
    TriedToInvertZero,
    /// not enough shares to recover: got {got}, need {threshold}
    NotEnoughShares {
        /// Distinct shares available
        got: usize,
        /// Shares needed
        threshold: usize,
    },
    /// polynomials have different thresholds ({0} != {1})
    ThresholdMismatch(usize, usize),
    /// public polynomials are committed under different bases
    BaseMismatch,
    /// a polynomial needs at least one coefficient
    EmptyPolynomial,
}

/// A share of a secret: the evaluation of a private polynomial at `index + 1`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PriShare<S> {
    pub index: u32,
    pub value: S,
}

/// A commitment to a share: the evaluation of a public polynomial at `index + 1`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PubShare<E> {
    pub index: u32,
    pub value: E,
}

/// `x` coordinate of share `index`.
pub fn share_x<G: Group>(group: &G, index: u32) -> G::Scalar {
    group.scalar_from_i64(i64::from(index) + 1)
}

/// A polynomial with scalar coefficients; the constant term is the secret.
#[derive(Clone)]
pub struct PriPoly<G: Group> {
    group: G,
    coeffs: Vec<G::Scalar>,
}

impl<G: Group> core::fmt::Debug for PriPoly<G> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PriPoly")
            .field("group", &self.group.name())
            .field("threshold", &self.coeffs.len())
            .finish_non_exhaustive()
    }
}

impl<G: Group> PartialEq for PriPoly<G> {
    fn eq(&self, other: &Self) -> bool {
        self.coeffs == other.coeffs
    }
}

impl<G: Group> zeroize::Zeroize for PriPoly<G> {
    fn zeroize(&mut self) {
        self.coeffs.iter_mut().for_each(zeroize::Zeroize::zeroize);
    }
}

impl<G: Group> PriPoly<G> {
    /// Random polynomial with `t` coefficients, i.e. of degree `t - 1`. The secret is drawn at
    /// random unless given.
    pub fn new<R>(group: G, t: usize, secret: Option<G::Scalar>, rng: &mut R) -> Result<Self, PolyError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        if t == 0 {
            return Err(PolyError::EmptyPolynomial);
        }
        let mut coeffs = Vec::with_capacity(t);
        coeffs.push(secret.unwrap_or_else(|| group.pick_scalar(rng)));
        for _ in 1..t {
            coeffs.push(group.pick_scalar(rng));
        }
        Ok(Self { group, coeffs })
    }

    pub fn from_coeffs(group: G, coeffs: Vec<G::Scalar>) -> Result<Self, PolyError> {
        if coeffs.is_empty() {
            return Err(PolyError::EmptyPolynomial);
        }
        Ok(Self { group, coeffs })
    }

    pub fn group(&self) -> &G {
        &self.group
    }

    /// Number of shares needed to recover the secret.
    pub fn threshold(&self) -> usize {
        self.coeffs.len()
    }

    pub fn secret(&self) -> &G::Scalar {
        &self.coeffs[0]
    }

    pub fn coeffs(&self) -> &[G::Scalar] {
        &self.coeffs
    }

    /// Evaluates the polynomial at `x` with Horner's method.
    pub fn evaluate(&self, x: &G::Scalar) -> G::Scalar {
        self.coeffs.iter().rev().fold(self.group.scalar_zero(), |acc, c| acc.mul(x).add(c))
    }

    /// Share `index`, the evaluation at `index + 1`.
    pub fn eval(&self, index: u32) -> PriShare<G::Scalar> {
        PriShare { index, value: self.evaluate(&share_x(&self.group, index)) }
    }

    /// Shares `0..n`.
    #[cfg(not(feature = "parallel"))]
    pub fn shares(&self, n: u32) -> Vec<PriShare<G::Scalar>> {
        (0..n).map(|i| self.eval(i)).collect()
    }

    /// Shares `0..n`.
    #[cfg(feature = "parallel")]
    pub fn shares(&self, n: u32) -> Vec<PriShare<G::Scalar>> {
        (0..n).into_par_iter().map(|i| self.eval(i)).collect()
    }

    /// Coefficient-wise sum; both polynomials must share a threshold.
    pub fn add(&self, other: &Self) -> Result<Self, PolyError> {
        if self.threshold() != other.threshold() {
            return Err(PolyError::ThresholdMismatch(self.threshold(), other.threshold()));
        }
        let coeffs = self.coeffs.iter().zip(&other.coeffs).map(|(a, b)| a.add(b)).collect();
        Ok(Self { group: self.group.clone(), coeffs })
    }

    /// Commits every coefficient under `base`, or the standard generator when `None`.
    pub fn commit(&self, base: Option<&G::Element>) -> PubPoly<G> {
        let t = start_timer!(|| "Commit to the private polynomial");
        #[cfg(feature = "parallel")]
        let commits = self.coeffs.par_iter().map(|c| self.group.mul(c, base)).collect();
        #[cfg(not(feature = "parallel"))]
        let commits = self.coeffs.iter().map(|c| self.group.mul(c, base)).collect();
        end_timer!(t);
        PubPoly { group: self.group.clone(), base: base.cloned(), commits }
    }
}

/// A polynomial with group element coefficients, the commitment of a [`PriPoly`].
#[derive(Clone)]
pub struct PubPoly<G: Group> {
    group: G,
    base: Option<G::Element>,
    commits: Vec<G::Element>,
}

impl<G: Group> core::fmt::Debug for PubPoly<G> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PubPoly").field("group", &self.group.name()).field("commits", &self.commits).finish()
    }
}

impl<G: Group> PartialEq for PubPoly<G> {
    fn eq(&self, other: &Self) -> bool {
        self.base() == other.base() && self.commits == other.commits
    }
}

impl<G: Group> PubPoly<G> {
    /// A public polynomial with the given commitments under `base` (the generator when `None`).
    pub fn new(group: G, base: Option<G::Element>, commits: Vec<G::Element>) -> Result<Self, PolyError> {
        if commits.is_empty() {
            return Err(PolyError::EmptyPolynomial);
        }
        Ok(Self { group, base, commits })
    }

    pub fn group(&self) -> &G {
        &self.group
    }

    pub fn base(&self) -> G::Element {
        self.base.clone().unwrap_or_else(|| self.group.generator())
    }

    pub fn threshold(&self) -> usize {
        self.commits.len()
    }

    /// Commitment to the secret.
    pub fn commit(&self) -> &G::Element {
        &self.commits[0]
    }

    pub fn commits(&self) -> &[G::Element] {
        &self.commits
    }

    pub fn into_commits(self) -> Vec<G::Element> {
        self.commits
    }

    pub fn evaluate(&self, x: &G::Scalar) -> G::Element {
        self.commits.iter().rev().fold(self.group.identity(), |acc, c| acc.mul(x).add(c))
    }

    /// Commitment to share `index`.
    pub fn eval(&self, index: u32) -> PubShare<G::Element> {
        PubShare { index, value: self.evaluate(&share_x(&self.group, index)) }
    }

    pub fn shares(&self, n: u32) -> Vec<PubShare<G::Element>> {
        (0..n).map(|i| self.eval(i)).collect()
    }

    /// Coefficient-wise sum; both polynomials need the same base and threshold.
    pub fn add(&self, other: &Self) -> Result<Self, PolyError> {
        if self.base() != other.base() {
            return Err(PolyError::BaseMismatch);
        }
        if self.threshold() != other.threshold() {
            return Err(PolyError::ThresholdMismatch(self.threshold(), other.threshold()));
        }
        let commits = self.commits.iter().zip(&other.commits).map(|(a, b)| a.add(b)).collect();
        Ok(Self { group: self.group.clone(), base: self.base.clone(), commits })
    }

    /// Whether `share` is consistent with this commitment.
    pub fn check(&self, share: &PriShare<G::Scalar>) -> bool {
        self.group.mul(&share.value, self.base.as_ref()) == self.eval(share.index).value
    }
}

/// Keeps the first share seen for every index and fails if fewer than `t` remain.
fn distinct<T: Clone>(shares: &[T], index: impl Fn(&T) -> u32, t: usize) -> Result<Vec<T>, PolyError> {
    let out: Vec<T> = shares.iter().unique_by(|s| index(*s)).take(t).cloned().collect();
    if out.len() < t || t == 0 {
        return Err(PolyError::NotEnoughShares { got: out.len(), threshold: t });
    }
    Ok(out)
}

/// Lagrange coefficients at zero for the `x` coordinates `xs`.
fn lagrange_at_zero<G: Group>(group: &G, xs: &[G::Scalar]) -> Result<Vec<G::Scalar>, PolyError> {
    xs.iter()
        .enumerate()
        .map(|(i, xi)| {
            let (num, den) = xs.iter().enumerate().filter(|(j, _)| *j != i).fold(
                (group.scalar_one(), group.scalar_one()),
                |(num, den), (_, xj)| (num.mul(xj), den.mul(&xj.sub(xi))),
            );
            num.div(&den).ok_or(PolyError::TriedToInvertZero)
        })
        .collect()
}

/// Recovers the secret from at least `t` shares.
pub fn recover_secret<G: Group>(group: &G, shares: &[PriShare<G::Scalar>], t: usize) -> Result<G::Scalar, PolyError> {
    let shares = distinct(shares, |s| s.index, t)?;
    let xs: Vec<_> = shares.iter().map(|s| share_x(group, s.index)).collect();
    let lambdas = lagrange_at_zero(group, &xs)?;
    Ok(shares.iter().zip(&lambdas).fold(group.scalar_zero(), |acc, (s, l)| acc.add(&s.value.mul(l))))
}

/// Recovers the commitment to the secret from at least `t` share commitments.
pub fn recover_commit<G: Group>(group: &G, shares: &[PubShare<G::Element>], t: usize) -> Result<G::Element, PolyError> {
    let shares = distinct(shares, |s| s.index, t)?;
    let xs: Vec<_> = shares.iter().map(|s| share_x(group, s.index)).collect();
    let lambdas = lagrange_at_zero(group, &xs)?;
    Ok(shares.iter().zip(&lambdas).fold(group.identity(), |acc, (s, l)| acc.add(&s.value.mul(l))))
}

/// Recovers every coefficient of the private polynomial from at least `t` shares.
pub fn recover_pri_poly<G: Group>(group: &G, shares: &[PriShare<G::Scalar>], t: usize) -> Result<PriPoly<G>, PolyError> {
    let shares = distinct(shares, |s| s.index, t)?;
    let xs: Vec<_> = shares.iter().map(|s| share_x(group, s.index)).collect();
    let ys: Vec<_> = shares.into_iter().map(|s| s.value).collect();
    let coeffs = interpolate(group, &xs, &ys, group.scalar_zero(), |y, w| y.mul(w), |a, b| a.add(b))?;
    PriPoly::from_coeffs(group.clone(), coeffs)
}

/// Recovers every commitment of the public polynomial from at least `t` share commitments.
pub fn recover_pub_poly<G: Group>(group: &G, shares: &[PubShare<G::Element>], t: usize) -> Result<PubPoly<G>, PolyError> {
    let shares = distinct(shares, |s| s.index, t)?;
    let xs: Vec<_> = shares.iter().map(|s| share_x(group, s.index)).collect();
    let ys: Vec<_> = shares.into_iter().map(|s| s.value).collect();
    let commits = interpolate(group, &xs, &ys, group.identity(), |y, w| y.mul(w), |a, b| a.add(b))?;
    PubPoly::new(group.clone(), None, commits)
}

/// Coefficients, lowest degree first, of the polynomial through `(x[i], y[i])`.
///
/// `s(X) = Π(X - x_i)` is built once; each basis polynomial is `s(X) / (X - x_i)` obtained by
/// synthetic division and scaled by `1 / s'(x_i)`. The `y` values only need scaling by a
/// scalar and addition, so the same routine serves scalars and group elements.
fn interpolate<G, T>(
    group: &G,
    x: &[G::Scalar],
    y: &[T],
    zero: T,
    scale: impl Fn(&T, &G::Scalar) -> T,
    add: impl Fn(&T, &T) -> T,
) -> Result<Vec<T>, PolyError>
where
    G: Group,
    T: Clone,
{
    if x.len() != y.len() {
        return Err(PolyError::InvalidInputLengths(x.len(), y.len()));
    }
    let n = x.len();
    if n == 0 {
        return Err(PolyError::EmptyPolynomial);
    }

    let start = start_timer!(|| "Computing Lagrange interpolation");

    // s holds X^{n-1} (X - x_0) to start with and is multiplied by (X - x_i) in place
    let mut s = vec![group.scalar_zero(); n + 1];
    s[n] = group.scalar_one();
    s[n - 1] = x[0].neg();
    for (i, xi) in x.iter().enumerate().skip(1) {
        for j in n - 1 - i..n - 1 {
            s[j] = s[j].sub(&xi.mul(&s[j + 1]));
        }
        s[n - 1] = s[n - 1].sub(xi);
    }

    let mut coeffs = vec![zero; n];
    for (xi, yi) in x.iter().zip(y) {
        // s'(x_i)
        let phi = (1..=n).rev().fold(group.scalar_zero(), |phi, j| {
            phi.mul(xi).add(&group.scalar_from_i64(j as i64).mul(&s[j]))
        });
        let ff = phi.inv().ok_or(PolyError::TriedToInvertZero)?;
        let mut b = group.scalar_one();
        for j in (0..n).rev() {
            coeffs[j] = add(&coeffs[j], &scale(yi, &b.mul(&ff)));
            b = b.mul(xi).add(&s[j]);
        }
    }
    end_timer!(start);
    Ok(coeffs)
}

#[cfg(test)]
mod tests {
    use test_strategy::proptest;

    use super::*;
    use crate::group::testing::rng;
    use crate::group::{Ed25519, Residue512, P256};

    #[test]
    fn arithmetic_check_evaluate() {
        let g = Ed25519;
        // p(x) = 111 + 222x
        let p = PriPoly::from_coeffs(g, vec![g.scalar_from_i64(111), g.scalar_from_i64(222)]).unwrap();
        let x = g.scalar_from_i64(123456789);
        assert_eq!(p.evaluate(&x), g.scalar_from_i64(111 + 222 * 123456789));
        assert_eq!(p.eval(0).value, g.scalar_from_i64(333));
        assert_eq!(g.base_mul(&p.evaluate(&x)), p.commit(None).evaluate(&x));
    }

    #[test]
    fn secret_recovery_from_any_subset() {
        let g = P256;
        let mut rng = rng(1);
        let (t, n) = (3, 6);
        let secret = g.pick_scalar(&mut rng);
        let poly = PriPoly::new(g, t, Some(secret.clone()), &mut rng).unwrap();
        let shares = poly.shares(n);
        for subset in shares.iter().cloned().combinations(t) {
            assert_eq!(recover_secret(&g, &subset, t).unwrap(), secret);
        }
        let err = recover_secret(&g, &shares[..2], t).unwrap_err();
        assert_eq!(err, PolyError::NotEnoughShares { got: 2, threshold: 3 });
    }

    #[test]
    fn duplicate_shares_do_not_count() {
        let g = Ed25519;
        let poly = PriPoly::new(g, 2, None, &mut rng(2)).unwrap();
        let s = poly.eval(4);
        assert!(recover_secret(&g, &[s.clone(), s.clone()], 2).is_err());
        assert_eq!(recover_secret(&g, &[s.clone(), s, poly.eval(1)], 2).unwrap(), *poly.secret());
    }

    #[test]
    fn full_polynomial_recovery() {
        let g = Ed25519;
        let mut rng = rng(3);
        let poly = PriPoly::new(g, 4, None, &mut rng).unwrap();
        let shares = poly.shares(7);
        let picked = [shares[6].clone(), shares[1].clone(), shares[3].clone(), shares[4].clone()];
        assert_eq!(recover_pri_poly(&g, &picked, 4).unwrap(), poly);

        let public = poly.commit(None);
        let pub_shares = public.shares(7);
        assert_eq!(recover_pub_poly(&g, &pub_shares[2..6], 4).unwrap(), public);
        assert_eq!(recover_commit(&g, &pub_shares[3..], 4).unwrap(), *public.commit());
    }

    #[test]
    fn sums_and_checks() {
        let g = Residue512;
        let mut rng = rng(4);
        let a = PriPoly::new(g, 3, None, &mut rng).unwrap();
        let b = PriPoly::new(g, 3, None, &mut rng).unwrap();
        let sum = a.add(&b).unwrap();
        assert_eq!(sum.secret(), &a.secret().add(b.secret()));
        let pub_sum = a.commit(None).add(&b.commit(None)).unwrap();
        assert_eq!(sum.commit(None), pub_sum);
        assert!(pub_sum.check(&sum.eval(5)));
        assert!(!pub_sum.check(&a.eval(5)));

        let short = PriPoly::new(g, 2, None, &mut rng).unwrap();
        assert_eq!(a.add(&short).unwrap_err(), PolyError::ThresholdMismatch(3, 2));
    }

    #[test]
    fn commitments_under_another_base() {
        let g = Ed25519;
        let mut rng = rng(5);
        let h = g.pick_element(&mut rng);
        let p = PriPoly::new(g, 2, None, &mut rng).unwrap();
        let c = p.commit(Some(&h));
        assert_eq!(c.base(), h);
        assert!(c.check(&p.eval(3)));
        assert_eq!(c.add(&p.commit(None)).unwrap_err(), PolyError::BaseMismatch);
    }

    #[proptest(cases = 16)]
    fn recovery_matches_secret(seed: u64, #[strategy(1usize..6)] t: usize, #[strategy(0u32..4)] extra: u32) {
        let g = Ed25519;
        let poly = PriPoly::new(g, t, None, &mut rng(seed)).unwrap();
        let shares = poly.shares(t as u32 + extra);
        assert_eq!(recover_secret(&g, &shares, t).unwrap(), *poly.secret());
    }
}
