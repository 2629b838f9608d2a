//! Seeded random generators.

use linbuf_view::VectorViewMut;
use rand::distributions::uniform::SampleUniform;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;

use super::element::{KernelElement, Strided};
use super::indexing::store_indices;
use crate::backend::Scalar;
use crate::status::{KernelResult, KernelStatus};

/// Floats in `[low, high)`, integers in `[low, high]`.
pub(super) fn uniform(
    x: &mut VectorViewMut<'_>,
    low: Scalar,
    high: Scalar,
    seed: u64,
) -> KernelResult<()> {
    let l = Strided::of_mut(x);
    let mut rng = StdRng::seed_from_u64(seed);
    dispatch_numeric!(x.buffer_mut(), d => fill_uniform(d, l, low, high, &mut rng))
}

fn fill_uniform<T, R>(
    data: &mut [T],
    l: Strided,
    low: Scalar,
    high: Scalar,
    rng: &mut R,
) -> KernelResult<()>
where
    T: KernelElement + SampleUniform,
    R: Rng,
{
    let dist = if T::IS_FLOAT {
        let (low, high) = (low.as_f64(), high.as_f64());
        let (lo, hi) = (T::of_f64(low), T::of_f64(high));
        if !(low.is_finite() && high.is_finite() && lo < hi) {
            return Err(KernelStatus::InvalidShapeOrParam);
        }
        Uniform::new(lo, hi)
    } else {
        let (low, high) = (low.as_i64(), high.as_i64());
        if low > high || T::of_i64(low).as_i64() != low || T::of_i64(high).as_i64() != high {
            return Err(KernelStatus::InvalidShapeOrParam);
        }
        Uniform::new_inclusive(T::of_i64(low), T::of_i64(high))
    };
    for i in 0..l.len {
        data[l.at(i)] = dist.sample(rng);
    }
    Ok(())
}

pub(super) fn normal(
    x: &mut VectorViewMut<'_>,
    mean: f64,
    scale: f64,
    seed: u64,
) -> KernelResult<()> {
    let l = Strided::of_mut(x);
    let dist = Normal::new(mean, scale).map_err(|_| KernelStatus::InvalidShapeOrParam)?;
    let mut rng = StdRng::seed_from_u64(seed);
    dispatch_float!(x.buffer_mut(), d => {
        fill_normal(d, l, &dist, &mut rng);
        Ok(())
    })
}

fn fill_normal<T: KernelElement, R: Rng>(
    data: &mut [T],
    l: Strided,
    dist: &Normal<f64>,
    rng: &mut R,
) {
    for i in 0..l.len {
        data[l.at(i)] = T::of_f64(dist.sample(rng));
    }
}

/// Fill `x` with `0..len` and shuffle its first `size` positions.
pub(super) fn sequence(size: usize, x: &mut VectorViewMut<'_>, seed: u64) -> KernelResult<()> {
    let l = Strided::of_mut(x);
    if size == 0 || size > l.len {
        return Err(KernelStatus::InvalidShapeOrParam);
    }
    let mut order: Vec<i64> = (0..l.len as i64).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    // partial Fisher-Yates
    for i in 0..size {
        let j = rng.gen_range(i..l.len);
        order.swap(i, j);
    }
    store_indices(
        x.buffer_mut(),
        order.into_iter().enumerate().map(|(i, v)| (l.at(i), v)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use linbuf_view::{ElementTypeTag, FlatBuffer};

    #[test]
    fn test_uniform_float_range_and_seed() {
        let draw = |seed| {
            let mut buf = FlatBuffer::zeros(ElementTypeTag::Float32, 64);
            let mut x = VectorViewMut::contiguous("X", &mut buf, 64, 0).unwrap();
            uniform(&mut x, Scalar::Float(-1.0), Scalar::Float(1.0), seed).unwrap();
            buf.as_slice::<f32>().unwrap().to_vec()
        };
        let a = draw(7);
        assert!(a.iter().all(|&v| (-1.0..1.0).contains(&v)));
        assert_eq!(a, draw(7));
        assert_ne!(a, draw(8));
    }

    #[test]
    fn test_uniform_int_inclusive() {
        let mut buf = FlatBuffer::zeros(ElementTypeTag::Int32, 200);
        let mut x = VectorViewMut::contiguous("X", &mut buf, 200, 0).unwrap();
        uniform(&mut x, Scalar::Int(0), Scalar::Int(2), 1).unwrap();
        let out = buf.as_slice::<i32>().unwrap();
        assert!(out.iter().all(|&v| (0..=2).contains(&v)));
        assert!(out.contains(&2));
    }

    #[test]
    fn test_uniform_rejects_empty_range() {
        let mut buf = FlatBuffer::zeros(ElementTypeTag::Float64, 2);
        let mut x = VectorViewMut::contiguous("X", &mut buf, 2, 0).unwrap();
        assert_eq!(
            uniform(&mut x, Scalar::Float(1.0), Scalar::Float(1.0), 0),
            Err(KernelStatus::InvalidShapeOrParam)
        );
        let mut buf = FlatBuffer::zeros(ElementTypeTag::Bool, 2);
        let mut x = VectorViewMut::contiguous("X", &mut buf, 2, 0).unwrap();
        assert_eq!(
            uniform(&mut x, Scalar::Int(0), Scalar::Int(1), 0),
            Err(KernelStatus::UnsupportedDataType)
        );
    }

    #[test]
    fn test_normal_moments() {
        let mut buf = FlatBuffer::zeros(ElementTypeTag::Float64, 4000);
        let mut x = VectorViewMut::contiguous("X", &mut buf, 4000, 0).unwrap();
        normal(&mut x, 3.0, 0.5, 42).unwrap();
        let out = buf.as_slice::<f64>().unwrap();
        let mean = out.iter().sum::<f64>() / out.len() as f64;
        assert!((mean - 3.0).abs() < 0.05);
    }

    #[test]
    fn test_sequence_is_permutation() {
        let mut buf = FlatBuffer::zeros(ElementTypeTag::Int64, 10);
        let mut x = VectorViewMut::contiguous("X", &mut buf, 10, 0).unwrap();
        sequence(4, &mut x, 3).unwrap();
        let mut out = buf.as_slice::<i64>().unwrap().to_vec();
        out.sort_unstable();
        assert_eq!(out, (0..10).collect::<Vec<i64>>());

        let mut x = VectorViewMut::contiguous("X", &mut buf, 10, 0).unwrap();
        assert_eq!(sequence(11, &mut x, 3), Err(KernelStatus::InvalidShapeOrParam));
    }
}
