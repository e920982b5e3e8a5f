//! Command-line harness for the kinflux kernel runtime.
//!
//! Runs a kernel over a batch of initial conditions and prints
//! comma-separated timing fields (compile, setup, run; seconds) to standard
//! output. In validation mode each output array is additionally written to
//! its own binary file.
//!
//! ```text
//! kinflux 100000 8
//! kinflux 100000 8 --order F --backend native --validate
//! kinflux 100000 8 --binary ./libmech_kernel.so --skip-compile
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use kinflux_backends::{Backend, NativeBackend, ProgramSource, QueueBackend};
use kinflux_runtime::kernels::{register_builtin_kernels, sample_conditions, toy_kernel_spec, NEQ};
use kinflux_runtime::{
    read_initial_conditions, write_output_array, DataOrder, KernelRuntime, RuntimeConfig,
};
use kinflux_tracing::TracingConfig;

fn parse_order(value: &str) -> Result<DataOrder, String> {
    value.parse()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendChoice {
    /// Command-queue offload device
    Queue,
    /// Direct multi-core host execution
    Native,
}

/// Evaluate a generated kinetics kernel over a batch of conditions.
#[derive(Parser)]
#[command(name = "kinflux")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Batch kernel execution harness", long_about = None)]
struct Cli {
    /// Number of conditions to evaluate
    problem_size: usize,

    /// Degree of parallelism (device compute units / host threads)
    work_size: usize,

    /// Trust an existing compiled kernel binary instead of compiling
    #[arg(long)]
    skip_compile: bool,

    /// Write each output array to <name>.bin after the run
    #[arg(long)]
    validate: bool,

    /// Initial-condition binary file; a synthetic batch is used when omitted
    #[arg(long)]
    input: Option<PathBuf>,

    /// Storage order of host data and the kernel (C or F)
    #[arg(long, default_value = "C", value_parser = parse_order)]
    order: DataOrder,

    /// Execution backend
    #[arg(long, value_enum, default_value_t = BackendChoice::Queue)]
    backend: BackendChoice,

    /// Kernel cdylib implementing the standard argument list; the built-in
    /// mechanism kernel is used when omitted
    #[arg(long)]
    binary: Option<PathBuf>,

    /// Runtime configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    kinflux_tracing::init_global_tracing(&TracingConfig::from_env())
        .context("failed to initialize tracing")?;

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            RuntimeConfig::from_json(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => RuntimeConfig::default(),
    };
    // command-line order and work size win over the config file
    config.order = cli.order;
    config.work_size = cli.work_size;

    let mut spec = toy_kernel_spec(cli.order);
    match &cli.binary {
        Some(path) => {
            spec.source = ProgramSource::Binary(path.clone());
            spec.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "kernel".to_string());
        }
        None => register_builtin_kernels(),
    }

    let backend: Box<dyn Backend> = match cli.backend {
        BackendChoice::Queue => Box::new(QueueBackend::with_build_options(
            &config.device_query(cli.work_size),
            &config.build_options,
        )?),
        BackendChoice::Native => Box::new(NativeBackend::new(cli.work_size, &spec.source)?),
    };
    tracing::info!(device = %backend.descriptor(), kernel = %spec.name, "harness_starting");

    let mut runtime = KernelRuntime::new(config, spec, backend);
    if !cli.skip_compile {
        runtime.compile()?;
    }
    runtime.resize(cli.problem_size, cli.work_size, cli.skip_compile)?;

    let data = match &cli.input {
        Some(path) => read_initial_conditions(path, cli.problem_size, NEQ, cli.order)
            .with_context(|| format!("reading initial conditions from {}", path.display()))?,
        None => {
            tracing::info!(count = cli.problem_size, "synthesizing_initial_conditions");
            sample_conditions(cli.problem_size, cli.order)
        }
    };

    let mut dphi = vec![0.0f64; cli.problem_size * NEQ];
    runtime.invoke(
        &[data.phi.as_slice(), data.pressure.as_slice()],
        &mut [dphi.as_mut_slice()],
    )?;

    // compile,setup,run — the machine-readable harness contract
    println!(
        "{:.6},{:.6},{:.6}",
        runtime.compile_seconds(),
        runtime.setup_seconds(),
        runtime.run_seconds()
    );

    if cli.validate {
        let outputs: Vec<(String, &[f64])> = runtime
            .spec()
            .outputs()
            .map(|(_, def)| def.name.clone())
            .zip([dphi.as_slice()])
            .collect();
        for (name, host) in outputs {
            let path = PathBuf::from(format!("{name}.bin"));
            write_output_array(&path, host)
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(array = %name, path = %path.display(), "output_written");
        }
    }

    Ok(())
}
