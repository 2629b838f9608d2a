use linbuf::{
    plan_transpose, resolve_broadcast, ErrorKind, FlatBuffer, FlatOps, Im2ColOptions,
    LinbufError, SliceSpec, TensorMut, TensorRef, WindowSpec,
};
use num_complex::Complex64;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn f64s(buf: &FlatBuffer) -> &[f64] {
    buf.as_slice::<f64>().unwrap()
}

// ============================================================================
// Broadcast
// ============================================================================

#[test]
fn test_vector_over_trailing_dims() {
    init_tracing();
    let plan = resolve_broadcast(&[2], &[3, 2], false).unwrap();
    assert_eq!((plan.rows, plan.cols), (3, 2));

    let ops = FlatOps::reference();
    let x = FlatBuffer::from(vec![1.0f64, 10.0]);
    let mut a = FlatBuffer::from(vec![1.0f64; 6]);
    ops.nd()
        .multiply(
            false,
            &TensorRef::new(&x, 0, &[2]).unwrap(),
            TensorMut::new(&mut a, 0, &[3, 2]).unwrap(),
        )
        .unwrap();
    assert_eq!(f64s(&a), &[1.0, 10.0, 1.0, 10.0, 1.0, 10.0]);
}

#[test]
fn test_vector_over_leading_dims() {
    let plan = resolve_broadcast(&[2], &[2, 3], true).unwrap();
    assert_eq!((plan.rows, plan.cols), (3, 2));

    let ops = FlatOps::reference();
    let x = FlatBuffer::from(vec![1.0f64, 10.0]);
    let mut a = FlatBuffer::from(vec![1.0f64; 6]);
    ops.nd()
        .add(
            true,
            2.0,
            &TensorRef::new(&x, 0, &[2]).unwrap(),
            TensorMut::new(&mut a, 0, &[2, 3]).unwrap(),
        )
        .unwrap();
    assert_eq!(f64s(&a), &[3.0, 3.0, 3.0, 21.0, 21.0, 21.0]);
}

#[test]
fn test_broadcast_mismatch_leaves_matrix() {
    let ops = FlatOps::reference();
    let x = FlatBuffer::from(vec![1.0f64, 2.0]);
    let mut a = FlatBuffer::from(vec![5.0f64; 6]);
    let err = ops
        .nd()
        .minimum(
            &TensorRef::new(&x, 0, &[2]).unwrap(),
            TensorMut::new(&mut a, 0, &[2, 3]).unwrap(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BroadcastMismatch);
    assert_eq!(f64s(&a), &[5.0; 6]);
}

// ============================================================================
// Axis reductions
// ============================================================================

#[test]
fn test_reduce_over_each_axis() {
    let ops = FlatOps::reference();
    let nd = ops.nd();
    let a = FlatBuffer::from(vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let src = TensorRef::new(&a, 0, &[2, 3]).unwrap();

    let mut cols = FlatBuffer::from(vec![0.0f64; 3]);
    nd.reduce_sum(&src, 0, TensorMut::new(&mut cols, 0, &[3]).unwrap())
        .unwrap();
    assert_eq!(f64s(&cols), &[5.0, 7.0, 9.0]);

    let mut rows = FlatBuffer::from(vec![0.0f64; 2]);
    nd.reduce_max(&src, -1, TensorMut::new(&mut rows, 0, &[2]).unwrap())
        .unwrap();
    assert_eq!(f64s(&rows), &[3.0, 6.0]);

    let mut idx = FlatBuffer::from(vec![0i32; 3]);
    nd.reduce_argmax(&src, 0, TensorMut::new(&mut idx, 0, &[3]).unwrap())
        .unwrap();
    assert_eq!(idx.as_slice::<i32>().unwrap(), &[1, 1, 1]);
}

#[test]
fn test_reduce_checks_axis_and_output_shape() {
    let ops = FlatOps::reference();
    let a = FlatBuffer::from(vec![1.0f64; 6]);
    let src = TensorRef::new(&a, 0, &[2, 3]).unwrap();
    let mut b = FlatBuffer::from(vec![0.0f64; 3]);

    let err = ops
        .nd()
        .reduce_sum(&src, 2, TensorMut::new(&mut b, 0, &[3]).unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AxisOutOfRange);

    let err = ops
        .nd()
        .reduce_sum(&src, 1, TensorMut::new(&mut b, 0, &[3]).unwrap())
        .unwrap_err();
    assert_eq!(
        err,
        LinbufError::ShapeMismatch {
            expected: vec![2],
            actual: vec![3],
        }
    );
}

// ============================================================================
// Gather / scatter
// ============================================================================

#[test]
fn test_gather_rows_and_along_axis() {
    let ops = FlatOps::reference();
    let nd = ops.nd();
    let table = FlatBuffer::from(vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let labels = FlatBuffer::from(vec![2i32, 0]);

    // rows of a [3, 2] table
    let mut out = FlatBuffer::from(vec![0.0f64; 4]);
    nd.gather(
        &TensorRef::new(&table, 0, &[3, 2]).unwrap(),
        &TensorRef::new(&labels, 0, &[2]).unwrap(),
        None,
        TensorMut::new(&mut out, 0, &[2, 2]).unwrap(),
    )
    .unwrap();
    assert_eq!(f64s(&out), &[5.0, 6.0, 1.0, 2.0]);

    // one class per row of a [2, 3] table
    let mut picked = FlatBuffer::from(vec![0.0f64; 2]);
    nd.gather(
        &TensorRef::new(&table, 0, &[2, 3]).unwrap(),
        &TensorRef::new(&labels, 0, &[2]).unwrap(),
        Some(1),
        TensorMut::new(&mut picked, 0, &[2]).unwrap(),
    )
    .unwrap();
    assert_eq!(f64s(&picked), &[3.0, 4.0]);
}

#[test]
fn test_scatter_accumulates() {
    let ops = FlatOps::reference();
    let labels = FlatBuffer::from(vec![1i64, 1]);
    let updates = FlatBuffer::from(vec![1.0f64, 2.0, 3.0, 4.0]);
    let mut out = FlatBuffer::from(vec![0.0f64; 6]);
    ops.nd()
        .scatter(
            &TensorRef::new(&labels, 0, &[2]).unwrap(),
            &TensorRef::new(&updates, 0, &[2, 2]).unwrap(),
            None,
            true,
            TensorMut::new(&mut out, 0, &[3, 2]).unwrap(),
        )
        .unwrap();
    assert_eq!(f64s(&out), &[0.0, 0.0, 4.0, 6.0, 0.0, 0.0]);
}

// ============================================================================
// Layout
// ============================================================================

#[test]
fn test_transpose_and_shape_mismatch() {
    let ops = FlatOps::reference();
    let a = FlatBuffer::from(vec![1i32, 2, 3, 4, 5, 6]);
    let src = TensorRef::new(&a, 0, &[2, 3]).unwrap();

    let mut b = FlatBuffer::from(vec![0i32; 6]);
    ops.nd()
        .transpose(&src, &[1, 0], TensorMut::new(&mut b, 0, &[3, 2]).unwrap())
        .unwrap();
    assert_eq!(b.as_slice::<i32>().unwrap(), &[1, 4, 2, 5, 3, 6]);

    let err = ops
        .nd()
        .transpose(&src, &[1, 0], TensorMut::new(&mut b, 0, &[2, 3]).unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ShapeMismatch);

    let err = ops
        .nd()
        .transpose(&src, &[0, 0], TensorMut::new(&mut b, 0, &[2, 3]).unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateAxis);
}

#[test]
fn test_transpose_rejects_complex() {
    let ops = FlatOps::reference();
    let a = FlatBuffer::from(vec![Complex64::new(1.0, -1.0); 4]);
    let mut b = FlatBuffer::from(vec![Complex64::new(0.0, 0.0); 4]);
    let err = ops
        .nd()
        .transpose(
            &TensorRef::new(&a, 0, &[2, 2]).unwrap(),
            &[1, 0],
            TensorMut::new(&mut b, 0, &[2, 2]).unwrap(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedElementType);
}

#[test]
fn test_slice_through_end() {
    let ops = FlatOps::reference();
    let a = FlatBuffer::from(vec![0.0f64, 1.0, 2.0, 3.0]);
    let mut y = FlatBuffer::from(vec![0.0f64; 3]);
    ops.nd()
        .slice(
            &TensorRef::new(&a, 0, &[4]).unwrap(),
            &[SliceSpec::new(1, -1)],
            TensorMut::new(&mut y, 0, &[3]).unwrap(),
        )
        .unwrap();
    assert_eq!(f64s(&y), &[1.0, 2.0, 3.0]);
}

#[test]
fn test_slice_window_and_scatter_back() {
    let ops = FlatOps::reference();
    let nd = ops.nd();
    let a = FlatBuffer::from((0..12).map(f64::from).collect::<Vec<_>>());
    let mut y = FlatBuffer::from(vec![0.0f64; 4]);
    nd.slice(
        &TensorRef::new(&a, 0, &[3, 4]).unwrap(),
        &[SliceSpec::new(-2, 2), SliceSpec::new(1, 2)],
        TensorMut::new(&mut y, 0, &[2, 2]).unwrap(),
    )
    .unwrap();
    assert_eq!(f64s(&y), &[5.0, 6.0, 9.0, 10.0]);

    let mut back = FlatBuffer::from(vec![0.0f64; 12]);
    nd.slice_scatter(
        &TensorRef::new(&y, 0, &[2, 2]).unwrap(),
        &[SliceSpec::new(-2, 2), SliceSpec::new(1, 2)],
        false,
        TensorMut::new(&mut back, 0, &[3, 4]).unwrap(),
    )
    .unwrap();
    let v = f64s(&back);
    assert_eq!(&v[4..8], &[0.0, 5.0, 6.0, 0.0]);
    assert_eq!(&v[8..12], &[0.0, 9.0, 10.0, 0.0]);

    let err = nd
        .slice(
            &TensorRef::new(&a, 0, &[3, 4]).unwrap(),
            &[SliceSpec::new(3, 1)],
            TensorMut::new(&mut y, 0, &[1, 4]).unwrap(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSliceStart);
}

// ============================================================================
// Last-axis operations
// ============================================================================

#[test]
fn test_softmax_and_topk_over_last_axis() {
    let ops = FlatOps::reference();
    let nd = ops.nd();

    let mut a = FlatBuffer::from(vec![0.0f64; 6]);
    nd.softmax(TensorMut::new(&mut a, 0, &[1, 2, 3]).unwrap())
        .unwrap();
    for v in f64s(&a) {
        approx::assert_relative_eq!(*v, 1.0 / 3.0, epsilon = 1e-12);
    }

    let input = FlatBuffer::from(vec![3.0f64, 9.0, 1.0, 9.0, 4.0, 0.0]);
    let mut values = FlatBuffer::from(vec![0.0f64; 4]);
    let mut indices = FlatBuffer::from(vec![0i32; 4]);
    nd.topk(
        &TensorRef::new(&input, 0, &[2, 3]).unwrap(),
        2,
        true,
        TensorMut::new(&mut values, 0, &[2, 2]).unwrap(),
        TensorMut::new(&mut indices, 0, &[2, 2]).unwrap(),
    )
    .unwrap();
    assert_eq!(f64s(&values), &[9.0, 3.0, 9.0, 4.0]);
    assert_eq!(indices.as_slice::<i32>().unwrap(), &[1, 0, 0, 1]);

    let err = nd
        .topk(
            &TensorRef::new(&input, 0, &[2, 3]).unwrap(),
            0,
            true,
            TensorMut::new(&mut values, 0, &[2, 2]).unwrap(),
            TensorMut::new(&mut indices, 0, &[2, 2]).unwrap(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidShapeParameter);
}

#[test]
fn test_searchsorted_shared_and_per_row() {
    let ops = FlatOps::reference();
    let nd = ops.nd();
    let x = FlatBuffer::from(vec![2.0f64, 5.0]);
    let mut y = FlatBuffer::from(vec![0i32; 2]);

    let shared = FlatBuffer::from(vec![1.0f64, 2.0, 3.0]);
    nd.searchsorted(
        &TensorRef::new(&shared, 0, &[3]).unwrap(),
        &TensorRef::new(&x, 0, &[2]).unwrap(),
        false,
        TensorMut::new(&mut y, 0, &[2]).unwrap(),
    )
    .unwrap();
    assert_eq!(y.as_slice::<i32>().unwrap(), &[1, 3]);

    let rows = FlatBuffer::from(vec![2.0f64, 4.0, 6.0, 5.0, 5.0, 7.0]);
    nd.searchsorted(
        &TensorRef::new(&rows, 0, &[2, 3]).unwrap(),
        &TensorRef::new(&x, 0, &[2]).unwrap(),
        true,
        TensorMut::new(&mut y, 0, &[2]).unwrap(),
    )
    .unwrap();
    assert_eq!(y.as_slice::<i32>().unwrap(), &[1, 2]);
}

// ============================================================================
// Windowing
// ============================================================================

#[test]
fn test_im2col_2d_patches() {
    let ops = FlatOps::reference();
    let images = FlatBuffer::from((0..9).map(f64::from).collect::<Vec<_>>());
    let mut cols = FlatBuffer::from(vec![0.0f64; 16]);
    let spec = WindowSpec {
        filter: &[2, 2],
        strides: &[1, 1],
        dilation: &[1, 1],
    };
    ops.nd()
        .im2col(
            &TensorRef::new(&images, 0, &[1, 3, 3, 1]).unwrap(),
            spec,
            Im2ColOptions::default(),
            TensorMut::new(&mut cols, 0, &[1, 2, 2, 2, 2, 1]).unwrap(),
        )
        .unwrap();
    assert_eq!(
        f64s(&cols),
        &[
            0.0, 1.0, 3.0, 4.0, //
            1.0, 2.0, 4.0, 5.0, //
            3.0, 4.0, 6.0, 7.0, //
            4.0, 5.0, 7.0, 8.0,
        ]
    );

    // filter rank must match the spatial rank
    let err = ops
        .nd()
        .im2col(
            &TensorRef::new(&images, 0, &[1, 3, 3, 1]).unwrap(),
            WindowSpec {
                filter: &[2],
                strides: &[1],
                dilation: &[1],
            },
            Im2ColOptions::default(),
            TensorMut::new(&mut cols, 0, &[1, 2, 2, 2, 2, 1]).unwrap(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidShapeParameter);
}

// ============================================================================
// Properties
// ============================================================================

fn shape_and_perm() -> impl Strategy<Value = (Vec<usize>, Vec<usize>)> {
    prop::collection::vec(1usize..4, 1..5).prop_flat_map(|shape| {
        let n = shape.len();
        (
            Just(shape),
            Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
        )
    })
}

proptest! {
    #[test]
    fn prop_transpose_then_inverse_restores(
        (shape, perm) in shape_and_perm(),
        seed in any::<u64>(),
    ) {
        let ops = FlatOps::reference();
        let nd = ops.nd();
        let size: usize = shape.iter().product();
        let mut rng = StdRng::seed_from_u64(seed);
        let data: Vec<f64> = (0..size).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let a = FlatBuffer::from(data.clone());

        let axes: Vec<isize> = perm.iter().map(|&p| p as isize).collect();
        let plan = plan_transpose(&shape, &axes).unwrap();
        let inverse = plan.inverse();
        let back_axes: Vec<isize> = inverse.perm().iter().map(|&p| p as isize).collect();

        let mut b = FlatBuffer::from(vec![0.0f64; size]);
        nd.transpose(
            &TensorRef::new(&a, 0, &shape).unwrap(),
            &axes,
            TensorMut::new(&mut b, 0, plan.dest_shape()).unwrap(),
        )
        .unwrap();

        let mut c = FlatBuffer::from(vec![0.0f64; size]);
        nd.transpose(
            &TensorRef::new(&b, 0, plan.dest_shape()).unwrap(),
            &back_axes,
            TensorMut::new(&mut c, 0, &shape).unwrap(),
        )
        .unwrap();
        prop_assert_eq!(c.as_slice::<f64>().unwrap(), &data[..]);
    }
}
