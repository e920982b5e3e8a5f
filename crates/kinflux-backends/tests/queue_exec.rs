//! End-to-end launch through the command-queue backend: register a kernel,
//! move data in, execute across work groups, move results out.

use kinflux_backends::{
    register_kernel, Backend, CopyRegion, DeviceKind, DeviceQuery, KernelArg, NativeBackend,
    ProgramSource, QueueBackend, RectOrigin, RectPitch,
};
use kinflux_kernel_abi::marshal::Unmarshaller;
use kinflux_kernel_abi::CKernelLaunch;

/// out[i] = 2 * in[i] for i < chunk, striding lockstep over work groups.
unsafe extern "C" fn double_entry(
    launch: *const CKernelLaunch,
    params: *const u8,
    params_len: usize,
) -> i32 {
    let launch = &*launch;
    let params = std::slice::from_raw_parts(params, params_len);
    let mut args = Unmarshaller::new(params);

    let this_run = match args.try_unpack_i32() {
        Ok(v) => v as usize,
        Err(_) => return 1,
    };
    let src = match args.try_unpack_ptr::<f64>() {
        Ok(p) => p,
        Err(_) => return 1,
    };
    let dst = match args.try_unpack_mut_ptr::<f64>() {
        Ok(p) => p,
        Err(_) => return 1,
    };

    let mut i = launch.group_id as usize;
    while i < this_run {
        *dst.add(i) = 2.0 * *src.add(i);
        i += launch.group_count as usize;
    }
    0
}

unsafe extern "C" fn failing_entry(
    _launch: *const CKernelLaunch,
    _params: *const u8,
    _params_len: usize,
) -> i32 {
    2
}

fn run_double(backend: &mut dyn Backend, n: usize, groups: usize) -> Vec<f64> {
    let bytes = n * std::mem::size_of::<f64>();
    let input = backend.allocate(bytes).unwrap();
    let output = backend.allocate(bytes).unwrap();

    let host_in: Vec<f64> = (0..n).map(|i| i as f64 + 0.5).collect();
    let region = CopyRegion::contiguous(bytes);
    backend
        .write_rect(
            input,
            bytemuck::cast_slice(&host_in),
            RectOrigin::default(),
            RectPitch::packed(&region),
            RectPitch::packed(&region),
            region,
        )
        .unwrap();

    backend.set_arg(0, KernelArg::Int(n as i32)).unwrap();
    backend.set_arg(1, KernelArg::Buffer(input)).unwrap();
    backend.set_arg(2, KernelArg::Buffer(output)).unwrap();
    backend.enqueue(groups, 1).unwrap();
    backend.synchronize().unwrap();

    let mut host_out = vec![0.0f64; n];
    backend
        .read_rect(
            output,
            bytemuck::cast_slice_mut(&mut host_out),
            RectOrigin::default(),
            RectPitch::packed(&region),
            RectPitch::packed(&region),
            region,
        )
        .unwrap();

    assert_eq!(backend.release_all(), 2);
    host_out
}

#[test]
fn queue_backend_executes_registered_kernel() {
    register_kernel("exec_test_double", double_entry);

    let mut backend = QueueBackend::new(&DeviceQuery::new(DeviceKind::Accelerator, 2)).unwrap();
    backend
        .load_program(&ProgramSource::Registered("exec_test_double".into()))
        .unwrap();
    assert!(backend.is_ready());

    let out = run_double(&mut backend, 13, 4);
    for (i, v) in out.iter().enumerate() {
        assert_eq!(*v, 2.0 * (i as f64 + 0.5));
    }
}

#[test]
fn native_backend_matches_queue_backend() {
    register_kernel("exec_test_double_native", double_entry);

    let mut queue = QueueBackend::new(&DeviceQuery::new(DeviceKind::Accelerator, 1)).unwrap();
    queue
        .load_program(&ProgramSource::Registered("exec_test_double_native".into()))
        .unwrap();
    let mut native =
        NativeBackend::new(1, &ProgramSource::Registered("exec_test_double_native".into()))
            .unwrap();

    let from_queue = run_double(&mut queue, 32, 3);
    let from_native = run_double(&mut native, 32, 3);
    assert_eq!(from_queue, from_native);
}

#[test]
fn kernel_failure_status_surfaces_from_enqueue() {
    register_kernel("exec_test_failing", failing_entry);

    let mut backend = QueueBackend::new(&DeviceQuery::new(DeviceKind::Accelerator, 1)).unwrap();
    backend
        .load_program(&ProgramSource::Registered("exec_test_failing".into()))
        .unwrap();
    backend.set_arg(0, KernelArg::Int(0)).unwrap();

    let err = backend.enqueue(2, 1).unwrap_err();
    assert!(matches!(
        err,
        kinflux_backends::BackendError::KernelFailure(2)
    ));
}
