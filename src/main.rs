use docker_image_puller::cli::{Args, Runner};
use docker_image_puller::logging::init_tracing;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse_args().from_env();
    init_tracing(args.verbose, args.quiet);

    let runner = match Runner::new(args) {
        Ok(runner) => runner,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Per-image failures are logged; they do not change the exit status
    match runner.run().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
