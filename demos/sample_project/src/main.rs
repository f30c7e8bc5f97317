use clap::{Parser, Subcommand};
use routebind::config::RouteBindConfig;
use routebind::logging::{init_logging, LogConfig};
use routebind::openapi::OpenApiGenerator;
use routebind::server::{AppService, HttpServer};
use tracing::info;

#[derive(Parser)]
#[command(name = "sample_project", about = "routebind sample endpoints")]
struct Cli {
    /// YAML configuration file; environment variables still apply on top.
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the sample endpoints.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        addr: String,
    },
    /// Print the OpenAPI document and exit.
    Openapi,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(&LogConfig::from_env())?;

    let config = match &cli.config {
        Some(path) => RouteBindConfig::from_yaml_file(path)?,
        None => RouteBindConfig::from_env(),
    };

    match cli.command {
        Command::Openapi => {
            let generator = OpenApiGenerator::new(sample_project::module(), sample_project::openapi_options())
                .with_binding_options(config.binding_options());
            println!("{}", generator.document());
        }
        Command::Serve { addr } => {
            let app = sample_project::build_app(config)?;
            let server = HttpServer(AppService::new(app)).start(addr.as_str())?;
            info!(addr = %server.addr(), "sample_project ready");
            server
                .join()
                .map_err(|e| anyhow::anyhow!("server failed: {e:?}"))?;
        }
    }
    Ok(())
}
