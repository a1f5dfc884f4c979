use anyhow::Context as _;
use jshost::config::HostConfig;
use jshost::deno::{cli, DenoPlatform};
use jshost::logging::{self, LoggingOptions};
use jshost::os::{self, HostEnv};
use jshost::RuntimeEngine;

/// Logging and platform-check settings: environment first, then the config
/// file when the arguments parse
fn early_settings(raw: &[String], env: &HostEnv) -> anyhow::Result<(LoggingOptions, bool)> {
    let config = match cli::parse(raw) {
        cli::Parsed::Run { host, .. } => HostConfig::discover(
            host.config.as_deref(),
            env.config_path.clone(),
            HostConfig::default_path(),
        )
        .context("reading config for logging setup")?,
        _ => HostConfig::default(),
    };

    let options = LoggingOptions {
        filter: env.log_filter.clone().or(config.log_filter),
        lifecycle_log: env.lifecycle_log.clone().or(config.lifecycle_log),
    };
    Ok((options, env.skip_platform_check || config.skip_platform_check))
}

fn main() {
    os::prepare_process();

    let args = match os::native_args() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("Could not convert arguments to utf8.");
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };
    let raw = args.to_strings();
    let env = HostEnv::from_process();

    let settings = early_settings(&raw, &env);
    let (logging_options, skip_check) = match &settings {
        Ok((options, skip)) => (options.clone(), *skip),
        Err(_) => (
            LoggingOptions {
                filter: env.log_filter.clone(),
                lifecycle_log: env.lifecycle_log.clone(),
            },
            env.skip_platform_check,
        ),
    };
    let _journal = logging::init(&logging_options);
    if let Err(err) = &settings {
        // The engine reports the same problem with its own exit code
        tracing::debug!("{:#}", err);
    }
    tracing::debug!(secure = os::secure_execution(), "process prepared");

    os::check_platform(skip_check);

    let mut engine = RuntimeEngine::new(DenoPlatform::new(env));
    let code = engine.run(raw);
    std::process::exit(code);
}
