use xrt_runtime::half::f16;
use xrt_runtime::{routines, Array, Context, ContextConfig, Device, Dtype, Error, Scalar};

fn context() -> Context {
    ContextConfig::new()
        .native_device_count(2)
        .xrt_device_count(4)
        .build()
}

#[test]
fn test_sqrt_and_is_nan() {
    let ctx = context();
    for address in ["xrt:0", "native:0"] {
        let device = ctx.get_device(address).unwrap();
        let x = Array::from_vec(&[3], vec![-1.0f32, 0.0, 4.0], &device).unwrap();
        let y = Array::empty(&[3], Dtype::Float32, &device).unwrap();
        device.sqrt(&x, &y).unwrap();
        let values = y.to_vec::<f32>().unwrap();
        assert!(values[0].is_nan());
        assert_eq!(&values[1..], &[0.0, 2.0]);

        let mask = Array::empty(&[3], Dtype::Bool, &device).unwrap();
        device.is_nan(&y, &mask).unwrap();
        assert_eq!(mask.to_vec::<bool>().unwrap(), vec![true, false, false]);
    }
}

#[test]
fn test_exp_log_and_is_inf() {
    let ctx = context();
    let device = ctx.get_device("xrt:0").unwrap();
    let x = Array::from_vec(&[3], vec![0.0f64, 1.0, -1.0], &device).unwrap();
    let e = routines::exp(&x).unwrap();
    let l = routines::log(&e).unwrap();
    for (got, want) in l.to_vec::<f64>().unwrap().into_iter().zip([0.0, 1.0, -1.0]) {
        assert!((got - want).abs() < 1e-12);
    }
    let zero = Array::from_vec(&[2], vec![0.0f32, 1.0], &device).unwrap();
    let inf = routines::is_inf(&routines::log(&zero).unwrap()).unwrap();
    assert_eq!(inf.to_vec::<bool>().unwrap(), vec![true, false]);
}

#[test]
fn test_transcendental_of_integers_is_float() {
    let ctx = context();
    let device = ctx.get_device("native:0").unwrap();
    let x = Array::from_vec(&[2], vec![4i32, 9], &device).unwrap();
    let y = routines::sqrt(&x).unwrap();
    assert_eq!(y.dtype(), Dtype::Float32);
    assert_eq!(y.to_vec::<f32>().unwrap(), vec![2.0, 3.0]);

    let out = Array::empty(&[2], Dtype::Int32, &device).unwrap();
    assert!(matches!(
        device.exp(&x, &out),
        Err(Error::UnsupportedDtype(Dtype::Int32))
    ));
}

#[test]
fn test_binary_arithmetic_broadcasts() {
    let ctx = context();
    let device = ctx.get_device("xrt:1").unwrap();
    let a = Array::from_vec(&[2, 3], vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &device).unwrap();
    let b = Array::from_vec(&[3], vec![10.0f32, 20.0, 30.0], &device).unwrap();
    assert_eq!(
        routines::add(&a, &b).unwrap().to_vec::<f32>().unwrap(),
        vec![11.0, 22.0, 33.0, 14.0, 25.0, 36.0]
    );
    assert_eq!(
        routines::subtract(&b, &a).unwrap().to_vec::<f32>().unwrap(),
        vec![9.0, 18.0, 27.0, 6.0, 15.0, 24.0]
    );
    assert_eq!(
        routines::multiply(&a, &b).unwrap().to_vec::<f32>().unwrap(),
        vec![10.0, 40.0, 90.0, 40.0, 100.0, 180.0]
    );
    let c = Array::from_vec(&[2], vec![1.0f32, 2.0], &device).unwrap();
    assert!(matches!(routines::add(&a, &c), Err(Error::ShapeMismatch { .. })));
}

#[test]
fn test_mixed_dtypes_promote() {
    let ctx = context();
    let device = ctx.get_device("native:0").unwrap();
    let a = Array::from_vec(&[2], vec![1i32, 2], &device).unwrap();
    let b = Array::from_vec(&[2], vec![0.5f64, 0.25], &device).unwrap();
    let c = routines::add(&a, &b).unwrap();
    assert_eq!(c.dtype(), Dtype::Float64);
    assert_eq!(c.to_vec::<f64>().unwrap(), vec![1.5, 2.25]);
}

#[test]
fn test_integer_semantics() {
    let ctx = context();
    let device = ctx.get_device("native:0").unwrap();
    let a = Array::from_vec(&[3], vec![127i8, 7, -8], &device).unwrap();
    let b = Array::from_vec(&[3], vec![1i8, 0, 3], &device).unwrap();
    assert_eq!(routines::add(&a, &b).unwrap().to_vec::<i8>().unwrap(), vec![-128, 7, -5]);
    assert_eq!(routines::divide(&a, &b).unwrap().to_vec::<i8>().unwrap(), vec![127, 0, -2]);
}

#[test]
fn test_multiply_scalar_and_fill() {
    let ctx = context();
    let device = ctx.get_device("xrt:0").unwrap();
    let x = Array::full(&[2, 2], 3, Dtype::Int16, &device).unwrap();
    let out = Array::zeros(&[2, 2], Dtype::Int16, &device).unwrap();
    assert_eq!(out.to_vec::<i16>().unwrap(), vec![0; 4]);
    device.multiply_scalar(&x, Scalar::Int(-2), &out).unwrap();
    assert_eq!(out.to_vec::<i16>().unwrap(), vec![-6; 4]);
}

#[test]
fn test_float16() {
    let ctx = context();
    let device = ctx.get_device("xrt:2").unwrap();
    let a = Array::from_vec(&[2], vec![f16::from_f32(1.5), f16::from_f32(-2.0)], &device).unwrap();
    let b = routines::add(&a, &a).unwrap();
    assert_eq!(b.dtype(), Dtype::Float16);
    assert_eq!(
        b.to_vec::<f16>().unwrap(),
        vec![f16::from_f32(3.0), f16::from_f32(-4.0)]
    );
}

#[test]
fn test_as_type_and_copy() {
    let ctx = context();
    let device = ctx.get_device("native:1").unwrap();
    let x = Array::from_vec(&[3], vec![1.7f32, -2.5, 0.0], &device).unwrap();
    assert_eq!(x.as_type(Dtype::Int32).unwrap().to_vec::<i32>().unwrap(), vec![1, -2, 0]);
    assert_eq!(
        x.as_type(Dtype::Bool).unwrap().to_vec::<bool>().unwrap(),
        vec![true, true, false]
    );
    let y = x.copy().unwrap();
    assert!(!y.data().ptr_eq(x.data()));
    assert_eq!(y.to_vec::<f32>().unwrap(), vec![1.7, -2.5, 0.0]);

    let wrong = Array::empty(&[3], Dtype::Float64, &device).unwrap();
    assert!(matches!(device.copy(&x, &wrong), Err(Error::DtypeMismatch { .. })));
}

#[test]
fn test_equal() {
    let ctx = context();
    let device = ctx.get_device("xrt:0").unwrap();
    let a = Array::from_vec(&[2, 2], vec![1i64, 2, 3, 4], &device).unwrap();
    let b = Array::from_vec(&[2], vec![1i64, 4], &device).unwrap();
    assert_eq!(
        routines::equal(&a, &b).unwrap().to_vec::<bool>().unwrap(),
        vec![true, false, false, true]
    );
}

#[test]
fn test_equal_mixed_dtypes_is_symmetric() {
    let ctx = context();
    let device = ctx.get_device("xrt:0").unwrap();
    let ints = Array::from_vec(&[2], vec![1i32, 2], &device).unwrap();
    let floats = Array::from_vec(&[2], vec![1.5f32, 2.0], &device).unwrap();
    let expected = vec![false, true];
    assert_eq!(
        routines::equal(&ints, &floats).unwrap().to_vec::<bool>().unwrap(),
        expected
    );
    assert_eq!(
        routines::equal(&floats, &ints).unwrap().to_vec::<bool>().unwrap(),
        expected
    );

    let out = Array::empty(&[2], Dtype::Bool, &device).unwrap();
    device.equal(&ints, &floats, &out).unwrap();
    assert_eq!(out.to_vec::<bool>().unwrap(), expected);
}

#[test]
fn test_sum_over_axes() {
    let ctx = context();
    let device = ctx.get_device("xrt:0").unwrap();
    let x = Array::from_vec(&[2, 3], vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &device).unwrap();
    assert_eq!(routines::sum(&x, &[0]).unwrap().to_vec::<f32>().unwrap(), vec![5.0, 7.0, 9.0]);
    assert_eq!(routines::sum(&x, &[1]).unwrap().to_vec::<f32>().unwrap(), vec![6.0, 15.0]);
    let total = routines::sum(&x, &[0, 1]).unwrap();
    assert_eq!(total.shape(), &[] as &[usize]);
    assert_eq!(total.to_vec::<f32>().unwrap(), vec![21.0]);

    let kept = Array::empty(&[2, 1], Dtype::Float32, &device).unwrap();
    device.sum(&x, &[1], &kept).unwrap();
    assert_eq!(kept.to_vec::<f32>().unwrap(), vec![6.0, 15.0]);

    assert!(matches!(
        routines::sum(&x, &[2]),
        Err(Error::InvalidAxis { axis: 2, ndim: 2 })
    ));
}

#[test]
fn test_sum_of_booleans_counts() {
    let ctx = context();
    let device = ctx.get_device("native:0").unwrap();
    let x = Array::from_vec(&[4], vec![true, false, true, true], &device).unwrap();
    let n = routines::sum(&x, &[0]).unwrap();
    assert_eq!(n.dtype(), Dtype::Int64);
    assert_eq!(n.to_vec::<i64>().unwrap(), vec![3]);
}

#[test]
fn test_dot() {
    let ctx = context();
    for address in ["xrt:0", "native:0"] {
        let device = ctx.get_device(address).unwrap();
        let a = Array::from_vec(&[2, 3], vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], &device).unwrap();
        let b = Array::from_vec(&[3, 2], vec![7.0f64, 8.0, 9.0, 10.0, 11.0, 12.0], &device).unwrap();
        let c = routines::dot(&a, &b).unwrap();
        assert_eq!(c.shape(), &[2, 2]);
        assert_eq!(c.to_vec::<f64>().unwrap(), vec![58.0, 64.0, 139.0, 154.0]);
        assert!(matches!(routines::dot(&a, &a), Err(Error::ShapeMismatch { .. })));
    }
}

#[test]
fn test_if_less_else_and_where() {
    let ctx = context();
    let device = ctx.get_device("xrt:3").unwrap();
    let x = Array::from_vec(&[4], vec![-2.0f32, -1.0, 1.0, 2.0], &device).unwrap();
    let neg = Array::from_vec(&[4], vec![10.0f32, 20.0, 30.0, 40.0], &device).unwrap();
    let out = Array::empty(&[4], Dtype::Float32, &device).unwrap();
    device
        .if_less_else(&x, Scalar::Float(0.0), Scalar::Float(0.0), &neg, &out)
        .unwrap();
    assert_eq!(out.to_vec::<f32>().unwrap(), vec![0.0, 0.0, 30.0, 40.0]);

    let mask = Array::from_vec(&[4], vec![true, false, true, false], &device).unwrap();
    let y = Array::full(&[1], -1.0, Dtype::Float32, &device).unwrap();
    assert_eq!(
        routines::where_(&mask, &x, &y).unwrap().to_vec::<f32>().unwrap(),
        vec![-2.0, -1.0, 1.0, -1.0]
    );
}

#[test]
fn test_operands_on_other_devices_are_rejected() {
    let ctx = context();
    let d0 = ctx.get_device("xrt:0").unwrap();
    let d1 = ctx.get_device("xrt:1").unwrap();
    let a = Array::from_vec(&[2], vec![1.0f32, 2.0], &d0).unwrap();
    let b = Array::from_vec(&[2], vec![1.0f32, 2.0], &d1).unwrap();
    assert!(matches!(
        routines::add(&a, &b),
        Err(Error::DeviceMismatch { .. })
    ));
}

#[test]
fn test_parallel_and_sequential_agree() {
    let ctx = context();
    let native = ctx.get_device("native:0").unwrap();
    let xrt = ctx.get_device("xrt:0").unwrap();
    let n = 1 << 15;
    let values: Vec<f32> = (0..n).map(|i| (i % 97) as f32 * 0.5).collect();

    let on_native = Array::from_vec(&[n], values.clone(), &native).unwrap();
    let on_xrt = on_native.to_device(&xrt).unwrap();
    let expected = routines::multiply(&on_native, &on_native).unwrap();
    let got = routines::multiply(&on_xrt, &on_xrt).unwrap();
    assert_eq!(
        got.to_device(&native).unwrap().to_vec::<f32>().unwrap(),
        expected.to_vec::<f32>().unwrap()
    );
}
