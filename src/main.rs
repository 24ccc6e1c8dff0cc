use std::{env, path::Path};

use anyhow::bail;
use digit_recognizer::TrainingConfig;

mod demos;

const USAGE: &str = "usage:
  digit-recognizer train [config.ron] [model-name]
  digit-recognizer predict <model-name> <image> [--invert]";

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["train", rest @ ..] => {
            let config = match rest.first() {
                Some(&path) => TrainingConfig::from_file(Path::new(path))?,
                None => TrainingConfig {
                    log_progress: true,
                    ..TrainingConfig::default()
                },
            };
            let model_name = rest.get(1).copied().unwrap_or("network");
            if rest.len() > 2 {
                bail!("{USAGE}");
            }
            demos::synthetic::run_sample(&config, model_name)
        }
        &["predict", model_name, image] => demos::handwriting::run_sample(model_name, Path::new(image), false),
        &["predict", model_name, image, "--invert"] => demos::handwriting::run_sample(model_name, Path::new(image), true),
        _ => bail!("{USAGE}"),
    }
}
