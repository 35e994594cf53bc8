use std::path::PathBuf;
use anyhow::{bail, Context};
use motion_dataset::{BatchLoader, Dataset, ImageFolderDataset, LoaderConfig};

const USAGE: &str = "usage: batches <image-dir> [batch-size] [--no-shuffle] [--seed N] [--epochs N] [--config file.json]";

#[derive(Debug)]
struct Args {
    root: PathBuf,
    config: LoaderConfig,
    epochs: usize,
}

/// Parses the command line. Flags override the `--config` file wherever they
/// appear.
fn parse_args<I>(args: I) -> anyhow::Result<Args>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut root = None;
    let mut config_path = None;
    let mut batch_size = None;
    let mut shuffle = None;
    let mut seed = None;
    let mut epochs = 1;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--no-shuffle" => shuffle = Some(false),
            "--seed" => {
                let value = args.next().context("--seed needs a value")?;
                seed = Some(value.parse().context("invalid --seed")?);
            }
            "--epochs" => {
                let value = args.next().context("--epochs needs a value")?;
                epochs = value.parse().context("invalid --epochs")?;
            }
            "--config" => config_path = Some(args.next().context("--config needs a value")?),
            "-h" | "--help" => bail!(USAGE),
            _ if root.is_none() => root = Some(PathBuf::from(arg)),
            _ => batch_size = Some(arg.parse().context("invalid batch size")?),
        }
    }

    let mut config = match config_path {
        Some(path) => LoaderConfig::from_json_file(&path)
            .with_context(|| format!("failed to load config {path}"))?,
        None => LoaderConfig::new(4, true),
    };
    if let Some(batch_size) = batch_size {
        config.batch_size = batch_size;
    }
    if let Some(shuffle) = shuffle {
        config.shuffle = shuffle;
    }
    if seed.is_some() {
        config.seed = seed;
    }
    config.validate()?;

    let root = root.context(USAGE)?;
    Ok(Args { root, config, epochs })
}

fn result_main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    let dataset = ImageFolderDataset::new(&args.root)
        .with_context(|| format!("failed to index {}", args.root.display()))?;
    log::info!("indexed {} images in {}", dataset.len(), args.root.display());
    let loader = BatchLoader::from_config(dataset, &args.config)?;

    println!(
        "{} images, batch size {}, {} batches per epoch",
        loader.len(), loader.batch_size(), loader.batch_count(),
    );

    for epoch in 0..args.epochs {
        println!("epoch {epoch}");

        let end = loader.end_sentinel();
        let mut cursor = loader.begin_pass();
        let mut index = 0;
        while cursor != end {
            let batch = cursor.dereference();
            let unreadable = batch.iter().filter(|sample| sample.is_empty()).count();
            let bytes: usize = batch.iter().map(|sample| sample.bytes.len()).sum();
            println!("  batch {index}: {} images, {bytes} bytes, {unreadable} unreadable", batch.len());
            for sample in &batch {
                println!("    {}", sample.path.display());
            }
            cursor.advance();
            index += 1;
        }
    }

    Ok(())
}

/// Routes the library's `log` records (degraded samples, skipped files) to stderr.
fn init_logger() {
    let env = env_logger::Env::default().default_filter_or("info");
    if let Err(e) = env_logger::Builder::from_env(env).try_init() {
        eprintln!("logger already installed: {e}");
    }
}

fn main() {
    init_logger();

    if let Err(e) = result_main() {
        eprintln!("Err: {:?}", e);
        std::process::exit(1);
    }
}
