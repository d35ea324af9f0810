use std::collections::HashMap;

use anyhow::Context;
use config::{Environment, File, FileFormat, builder::DefaultState};
use dotenvy::vars;
use serde::de::DeserializeOwned;

/// The prefix of the environment variables the services read.
pub const ENV_PREFIX: &str = "KEYPER";

/// Load the configuration of a service.
///
/// The sources are, from the lowest to the highest precedence, `config.toml`
/// in the working directory, the `.env` file and the environment variables.
/// Nested keys are separated by `__`, for example `KEYPER_S3__BUCKET`.
pub fn load_config<T: DeserializeOwned>() -> anyhow::Result<T> {
    let dotenv_variables = HashMap::from_iter(vars());

    let config = config::ConfigBuilder::<DefaultState>::default()
        .add_source(File::new("config.toml", FileFormat::Toml).required(false))
        .add_source(environment().source(Some(dotenv_variables)))
        .add_source(environment())
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to parse configuration. Check the KEYPER_ variables.")
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("allowed_origins")
}
