//! Built-in evaluation kernel: a small irreversible-reaction mechanism.
//!
//! Stand-in for generated kernel code, compiled into the binary and
//! registered under one name per storage order (a generated kernel is
//! likewise order-specific). Used by the CLI demo, the benches, and the
//! integration tests; a real deployment loads its generated kernel as a
//! cdylib instead.
//!
//! The mechanism: four species over three irreversible reactions,
//!
//! ```text
//! R0:  A     -> B      k = A0 * exp(-Ta0 / T)
//! R1:  B     -> C      k = A1 * T^0.7 * exp(-Ta1 / T)
//! R2:  A + C -> D      k = A2 * T^-0.5 * exp(-Ta2 / T), pressure-enhanced
//! ```
//!
//! evaluated isothermally: `phi = [T, cA, cB, cC, cD]`, `dphi[0] = 0`.
//! Rates of progress are staged in the packed workspace before the state
//! derivative is written, exercising the scratch-buffer path the way
//! generated kernels do.

use kinflux_backends::{register_kernel, ProgramSource};
use kinflux_kernel_abi::marshal::Unmarshaller;
use kinflux_kernel_abi::{CKernelLaunch, KernelStatus};

use crate::conditions::Conditions;
use crate::layout::{device_index, DataOrder};
use crate::spec::{ArrayDef, KernelSpec, WorkspaceDef};

/// Species count.
pub const NSP: usize = 4;
/// State-vector entries per condition (temperature + species).
pub const NEQ: usize = NSP + 1;
/// Reaction count.
pub const NRXN: usize = 3;

/// Registered name of the condition-major ("C") variant.
pub const KERNEL_ROW_MAJOR: &str = "toy_rates_c";
/// Registered name of the field-major ("F") variant.
pub const KERNEL_COL_MAJOR: &str = "toy_rates_f";

const ARRHENIUS_A: [f64; NRXN] = [2.0e10, 5.0e7, 1.0e6];
const ARRHENIUS_B: [f64; NRXN] = [0.0, 0.7, -0.5];
const ARRHENIUS_TA: [f64; NRXN] = [1.0e4, 7.5e3, 4.0e3];

const P_ATM: f64 = 101_325.0;

/// Modified Arrhenius form, `k = A * T^b * exp(-Ta / T)`.
fn rate_constant(reaction: usize, temperature: f64) -> f64 {
    ARRHENIUS_A[reaction]
        * temperature.powf(ARRHENIUS_B[reaction])
        * (-ARRHENIUS_TA[reaction] / temperature).exp()
}

/// Pointwise evaluation for one condition. Shared by the kernel entry and
/// the host reference so both produce bit-identical results.
fn species_rates(
    temperature: f64,
    pressure: f64,
    conc: &[f64; NSP],
    rop: &mut [f64; NRXN],
) -> [f64; NEQ] {
    rop[0] = rate_constant(0, temperature) * conc[0];
    rop[1] = rate_constant(1, temperature) * conc[1];
    rop[2] = rate_constant(2, temperature) * conc[0] * conc[2] * (pressure / P_ATM);

    let mut dphi = [0.0f64; NEQ];
    dphi[1] = -rop[0] - rop[2];
    dphi[2] = rop[0] - rop[1];
    dphi[3] = rop[1] - rop[2];
    dphi[4] = rop[2];
    dphi
}

/// Shared chunk loop; the two entry points fix the order.
///
/// # Safety
///
/// Device pointers in `params` must cover `this_run` conditions of their
/// respective arrays, laid out per `order` with `this_run` as leading
/// dimension.
unsafe fn run_chunk(order: DataOrder, launch: &CKernelLaunch, params: &[u8]) -> i32 {
    let mut args = Unmarshaller::new(params);
    let (this_run, phi, p_arr, dphi, rwk) = match (
        args.try_unpack_i32(),
        args.try_unpack_ptr::<f64>(),
        args.try_unpack_ptr::<f64>(),
        args.try_unpack_mut_ptr::<f64>(),
        args.try_unpack_mut_ptr::<f64>(),
    ) {
        (Ok(n), Ok(a), Ok(b), Ok(c), Ok(d)) => (n, a, b, c, d),
        _ => return KernelStatus::InvalidParams as i32,
    };
    if this_run < 0 || launch.group_count < 1 || launch.group_id < 0 {
        return KernelStatus::InvalidParams as i32;
    }

    let n = this_run as usize;
    let step = launch.group_count as usize;
    let mut cond = launch.group_id as usize;
    while cond < n {
        let temperature = *phi.add(device_index(order, n, NEQ, cond, 0));
        let pressure = *p_arr.add(cond);
        let mut conc = [0.0f64; NSP];
        for species in 0..NSP {
            conc[species] = *phi.add(device_index(order, n, NEQ, cond, 1 + species));
        }

        let mut rop = [0.0f64; NRXN];
        let out = species_rates(temperature, pressure, &conc, &mut rop);

        for reaction in 0..NRXN {
            *rwk.add(device_index(order, n, NRXN, cond, reaction)) = rop[reaction];
        }
        for field in 0..NEQ {
            *dphi.add(device_index(order, n, NEQ, cond, field)) = out[field];
        }

        cond += step;
    }

    KernelStatus::Success as i32
}

unsafe extern "C" fn toy_rates_c_entry(
    launch: *const CKernelLaunch,
    params: *const u8,
    params_len: usize,
) -> i32 {
    if launch.is_null() || params.is_null() {
        return KernelStatus::InvalidParams as i32;
    }
    run_chunk(
        DataOrder::RowMajor,
        &*launch,
        std::slice::from_raw_parts(params, params_len),
    )
}

unsafe extern "C" fn toy_rates_f_entry(
    launch: *const CKernelLaunch,
    params: *const u8,
    params_len: usize,
) -> i32 {
    if launch.is_null() || params.is_null() {
        return KernelStatus::InvalidParams as i32;
    }
    run_chunk(
        DataOrder::ColumnMajor,
        &*launch,
        std::slice::from_raw_parts(params, params_len),
    )
}

/// Register both order variants in the process-wide kernel registry.
/// Idempotent; call before constructing a backend over either name.
pub fn register_builtin_kernels() {
    register_kernel(KERNEL_ROW_MAJOR, toy_rates_c_entry);
    register_kernel(KERNEL_COL_MAJOR, toy_rates_f_entry);
}

/// Registered name of the variant generated for `order`.
pub fn kernel_name(order: DataOrder) -> &'static str {
    match order {
        DataOrder::RowMajor => KERNEL_ROW_MAJOR,
        DataOrder::ColumnMajor => KERNEL_COL_MAJOR,
    }
}

/// Argument-table description of the built-in kernel.
pub fn toy_kernel_spec(order: DataOrder) -> KernelSpec {
    KernelSpec::new(
        kernel_name(order),
        ProgramSource::Registered(kernel_name(order).to_string()),
    )
    .with_array(ArrayDef::input("phi", NEQ))
    .with_array(ArrayDef::input("P_arr", 1))
    .with_array(ArrayDef::output("dphi", NEQ))
    .with_workspace(WorkspaceDef::new("rop", NRXN))
}

/// Host reference evaluation over a whole batch (leading dimension = count).
/// Bit-identical to the kernel path for any chunking.
pub fn reference_rates(phi: &[f64], pressure: &[f64], count: usize, order: DataOrder) -> Vec<f64> {
    assert_eq!(phi.len(), count * NEQ);
    assert_eq!(pressure.len(), count);

    let mut dphi = vec![0.0f64; count * NEQ];
    for cond in 0..count {
        let temperature = phi[device_index(order, count, NEQ, cond, 0)];
        let mut conc = [0.0f64; NSP];
        for species in 0..NSP {
            conc[species] = phi[device_index(order, count, NEQ, cond, 1 + species)];
        }
        let mut rop = [0.0f64; NRXN];
        let out = species_rates(temperature, pressure[cond], &conc, &mut rop);
        for field in 0..NEQ {
            dphi[device_index(order, count, NEQ, cond, field)] = out[field];
        }
    }
    dphi
}

/// Synthesize a plausible batch of initial conditions for demos and tests:
/// temperatures sweeping 800-1600 K, pressures around an atmosphere, and
/// species concentrations that keep every reaction active.
pub fn sample_conditions(count: usize, order: DataOrder) -> Conditions {
    let mut phi = vec![0.0f64; count * NEQ];
    let mut pressure = vec![0.0f64; count];
    for cond in 0..count {
        let frac = if count > 1 {
            cond as f64 / (count - 1) as f64
        } else {
            0.0
        };
        let fields = [
            800.0 + 800.0 * frac,   // T
            2.0 - frac,             // cA
            0.5 + 0.25 * frac,      // cB
            0.1 + 0.8 * frac,       // cC
            0.0,                    // cD
        ];
        for (field, value) in fields.iter().enumerate() {
            phi[device_index(order, count, NEQ, cond, field)] = *value;
        }
        pressure[cond] = P_ATM * (0.5 + frac);
    }
    Conditions {
        count,
        neq: NEQ,
        order,
        phi,
        pressure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_constants_are_positive_and_increase_with_temperature() {
        for reaction in 0..NRXN {
            let cold = rate_constant(reaction, 800.0);
            let hot = rate_constant(reaction, 1600.0);
            assert!(cold > 0.0);
            assert!(hot > cold, "reaction {reaction} should accelerate");
        }
    }

    #[test]
    fn species_rates_conserve_mass_across_the_chain() {
        let conc = [2.0, 0.5, 0.3, 0.0];
        let mut rop = [0.0; NRXN];
        let dphi = species_rates(1200.0, P_ATM, &conc, &mut rop);

        assert_eq!(dphi[0], 0.0);
        // A + C consumed twice over R2; net molecule change is -rop2
        let total: f64 = dphi[1..].iter().sum();
        let expected = -rop[2];
        assert!((total - expected).abs() <= 1e-12 * expected.abs().max(1.0));
    }

    #[test]
    fn reference_agrees_across_orders() {
        let count = 7;
        let c = sample_conditions(count, DataOrder::RowMajor);
        let f = sample_conditions(count, DataOrder::ColumnMajor);

        let dphi_c = reference_rates(&c.phi, &c.pressure, count, DataOrder::RowMajor);
        let dphi_f = reference_rates(&f.phi, &f.pressure, count, DataOrder::ColumnMajor);

        for cond in 0..count {
            for field in 0..NEQ {
                let a = dphi_c[device_index(DataOrder::RowMajor, count, NEQ, cond, field)];
                let b = dphi_f[device_index(DataOrder::ColumnMajor, count, NEQ, cond, field)];
                assert_eq!(a, b, "condition {cond} field {field}");
            }
        }
    }
}
