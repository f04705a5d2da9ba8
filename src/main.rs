#![recursion_limit = "256"]

use std::process::ExitCode;

use clap::Parser;
use mnist_cnn::{
    cli::{Cli, Command},
    pipeline::{run_inference, run_show, run_training},
    MnistError,
};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "wgpu")]
mod backend {
    use burn::backend::{wgpu::WgpuDevice, Wgpu};

    pub type Backend = Wgpu;

    pub fn device() -> WgpuDevice {
        WgpuDevice::default()
    }
}

#[cfg(all(feature = "tch-cpu", not(feature = "wgpu")))]
mod backend {
    use burn::backend::{libtorch::LibTorchDevice, LibTorch};

    pub type Backend = LibTorch;

    pub fn device() -> LibTorchDevice {
        LibTorchDevice::Cpu
    }
}

#[cfg(all(feature = "ndarray", not(any(feature = "wgpu", feature = "tch-cpu"))))]
mod backend {
    use burn::backend::{ndarray::NdArrayDevice, NdArray};

    pub type Backend = NdArray;

    pub fn device() -> NdArrayDevice {
        NdArrayDevice::Cpu
    }
}

type AutodiffBackend = burn::backend::Autodiff<backend::Backend>;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<(), MnistError> {
    let paths = cli.paths();
    let device = backend::device();

    match &cli.command {
        Command::Train(args) => {
            let config = args.training_config()?;
            let model_path = args
                .model_path
                .clone()
                .unwrap_or_else(|| paths.default_model_path());

            let evaluation = run_training::<AutodiffBackend>(&paths, &config, &model_path, device)?;
            println!("Test accuracy: {:.4}", evaluation.accuracy);
        }
        Command::Infer(args) => {
            let model_path = args
                .model_path
                .clone()
                .unwrap_or_else(|| paths.default_model_path());

            let evaluation = run_inference::<backend::Backend>(
                &paths,
                &model_path,
                args.num_samples,
                args.seed,
                device,
            )?;
            println!("Sample accuracy: {:.4}", evaluation.accuracy);
        }
        Command::Show(args) => {
            let path = run_show(&paths, args.num_images)?;
            println!("Samples rendered to {}", path.display());
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    // The learner installs its own file logger in the artifact directory.
    if cli.command.logs_to_stderr() {
        init_logging();
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
