use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use xrt_runtime::native::NativeBackend;
use xrt_runtime::xrt::XrtBackend;
use xrt_runtime::{Backend, Context, ContextConfig, Device, DeviceId, Error};

fn context() -> Context {
    ContextConfig::new()
        .native_device_count(2)
        .xrt_device_count(4)
        .build()
}

#[test]
fn test_backend_name_and_device_count() {
    let ctx = context();
    let xrt = ctx.get_backend("xrt").unwrap();
    assert_eq!(xrt.name(), "xrt");
    assert_eq!(xrt.device_count(), 4);
    let native = ctx.get_backend("native").unwrap();
    assert_eq!(native.name(), "native");
    assert_eq!(native.device_count(), 2);
}

#[test]
fn test_concurrent_lookups_share_one_instance() {
    let ctx = context();
    let found: Vec<(Arc<dyn Backend>, Arc<dyn Device>)> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    let backend = ctx.get_backend("xrt").unwrap();
                    let device = ctx.get_device("xrt:1").unwrap();
                    (backend, device)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    let (backend, device) = &found[0];
    for (b, d) in &found {
        assert!(Arc::ptr_eq(backend, b));
        assert!(Arc::ptr_eq(device, d));
    }
    assert!(Arc::ptr_eq(device, &backend.get_device(1).unwrap()));
}

#[test]
fn test_device_addressing() {
    let ctx = context();
    let device = ctx.get_device("xrt:2").unwrap();
    assert_eq!(device.index(), 2);
    assert_eq!(device.name(), "xrt:2");
    assert_eq!(device.id(), DeviceId::new("xrt", 2));
    assert_eq!(device.context_id(), ctx.id());

    let bare = ctx.get_device("native").unwrap();
    assert!(Arc::ptr_eq(&bare, &ctx.get_device("native:0").unwrap()));
    assert!(Arc::ptr_eq(
        &bare,
        &ctx.get_device_by_id(&DeviceId::new("native", 0)).unwrap()
    ));
}

#[test]
fn test_device_index_out_of_range() {
    let ctx = context();
    let backend = ctx.get_backend("xrt").unwrap();
    assert!(matches!(backend.get_device(-1), Err(Error::OutOfRange(_))));
    assert!(matches!(backend.get_device(4), Err(Error::OutOfRange(_))));
    assert!(matches!(ctx.get_device("xrt:-1"), Err(Error::OutOfRange(_))));
    assert!(matches!(ctx.get_device("native:2"), Err(Error::OutOfRange(_))));
}

#[test]
fn test_bad_lookups() {
    let ctx = context();
    assert!(matches!(ctx.get_backend("cuda"), Err(Error::BackendNotFound(_))));
    assert!(matches!(ctx.get_device("cuda:0"), Err(Error::BackendNotFound(_))));
    assert!(matches!(ctx.get_device("xrt:one"), Err(Error::InvalidDeviceId(_))));
}

#[test]
fn test_contexts_do_not_share_backends() {
    let ctx0 = context();
    let ctx1 = context();
    let a = ctx0.get_backend("xrt").unwrap();
    let b = ctx1.get_backend("xrt").unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_ne!(a.context_id(), b.context_id());
}

#[test]
fn test_supports_transfer_same_backend() {
    let ctx = context();
    let backend = ctx.get_backend("xrt").unwrap();
    let d0 = ctx.get_device("xrt:0").unwrap();
    let d1 = ctx.get_device("xrt:1").unwrap();
    thread::scope(|s| {
        for _ in 0..2 {
            s.spawn(|| {
                assert!(backend.supports_transfer(d0.as_ref(), d0.as_ref()));
                assert!(backend.supports_transfer(d0.as_ref(), d1.as_ref()));
            });
        }
    });
}

#[test]
fn test_supports_transfer_different_contexts() {
    let ctx0 = context();
    let ctx1 = context();
    let backend0 = XrtBackend::new(&ctx0);
    let backend1 = XrtBackend::new(&ctx1);
    let device0 = backend0.get_device(0).unwrap();
    let device1 = backend1.get_device(0).unwrap();
    assert!(!backend0.supports_transfer(device0.as_ref(), device1.as_ref()));
    assert!(!backend1.supports_transfer(device0.as_ref(), device1.as_ref()));
}

#[test]
fn test_supports_transfer_native_backends() {
    let ctx = context();
    let xrt = XrtBackend::new(&ctx);
    let native0 = NativeBackend::new(&ctx);
    let native1 = NativeBackend::new(&ctx);
    let device = xrt.get_device(0).unwrap();
    let device0 = native0.get_device(0).unwrap();
    let device1 = native1.get_device(0).unwrap();
    assert!(xrt.supports_transfer(device.as_ref(), device0.as_ref()));
    assert!(xrt.supports_transfer(device0.as_ref(), device.as_ref()));
    assert!(!xrt.supports_transfer(device0.as_ref(), device1.as_ref()));
    assert!(!native0.supports_transfer(device.as_ref(), device0.as_ref()));
    assert!(!native0.supports_transfer(device0.as_ref(), device1.as_ref()));
}

#[test]
fn test_supports_transfer_different_xrt_backends() {
    let ctx = context();
    let backend0 = XrtBackend::named(&ctx, "derived0");
    let backend1 = XrtBackend::named(&ctx, "derived1");
    let device0 = backend0.get_device(0).unwrap();
    let device1 = backend1.get_device(0).unwrap();
    assert!(!backend0.supports_transfer(device0.as_ref(), device1.as_ref()));
    assert!(!backend1.supports_transfer(device0.as_ref(), device1.as_ref()));
}

#[test]
fn test_registered_backend() {
    let ctx = ContextConfig::new()
        .xrt_device_count(2)
        .register_backend("derived", |ctx: &Context| -> Arc<dyn Backend> {
            XrtBackend::named(ctx, "derived")
        })
        .build();
    let device = ctx.get_device("derived:1").unwrap();
    assert_eq!(device.name(), "derived:1");
    let derived = ctx.get_backend("derived").unwrap();
    let xrt = ctx.get_backend("xrt").unwrap();
    assert!(!Arc::ptr_eq(&derived, &xrt));
    let x0 = xrt.get_device(0).unwrap();
    assert!(!derived.supports_transfer(device.as_ref(), x0.as_ref()));
}

#[test]
fn test_device_outliving_context_panics() {
    let ctx = context();
    let device = ctx.get_device("xrt:0").unwrap();
    drop(ctx);
    let result = catch_unwind(AssertUnwindSafe(|| device.backend()));
    assert!(result.is_err());
}
