//! The `wdtag tag` command.

mod batch;

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use wdtag_core::output::load_existing_hashes;
use wdtag_core::{Config, FileDiscovery, OutputFormat};

use batch::{run_batch, write_records, write_sidecars, RecordSink};

/// Record format on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// One JSON array
    Json,
    /// One JSON object per line
    Jsonl,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Jsonl => OutputFormat::JsonLines,
        }
    }
}

#[derive(Args, Debug)]
pub struct TagArgs {
    /// Image file or directory to tag
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format (defaults to `[output] format`)
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// Write a `.txt` caption next to every tagged image
    #[arg(long)]
    pub sidecar: bool,

    /// Skip images whose hash already appears in the output file
    #[arg(long)]
    pub skip_existing: bool,

    /// Model name under the model directory
    #[arg(long, env = "WDTAG_MODEL")]
    pub model: Option<String>,

    #[arg(long)]
    pub general_threshold: Option<f32>,

    #[arg(long)]
    pub character_threshold: Option<f32>,

    /// Keep at most this many tags (0 = unlimited)
    #[arg(long)]
    pub max_tags: Option<usize>,

    /// Adaptive MCut threshold for general tags
    #[arg(long)]
    pub general_mcut: bool,

    /// Adaptive MCut threshold for character tags
    #[arg(long)]
    pub character_mcut: bool,

    /// Apply a sigmoid to raw model outputs
    #[arg(long)]
    pub sigmoid: bool,

    /// Merge a horizontally flipped pass
    #[arg(long)]
    pub tta: bool,

    /// Tags to drop, comma separated
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Never use a GPU execution provider
    #[arg(long)]
    pub cpu: bool,
}

impl TagArgs {
    /// Layer command-line flags over the loaded config.
    ///
    /// Boolean flags only ever switch a feature on; leaving one out keeps the
    /// config file's value.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.general.model = model.clone();
        }

        let tagger = &mut config.tagger;
        if let Some(t) = self.general_threshold {
            tagger.general_threshold = t;
        }
        if let Some(t) = self.character_threshold {
            tagger.character_threshold = t;
        }
        if let Some(n) = self.max_tags {
            tagger.max_tags = n;
        }
        tagger.general_mcut_enabled |= self.general_mcut;
        tagger.character_mcut_enabled |= self.character_mcut;
        tagger.apply_sigmoid |= self.sigmoid;
        tagger.tta_enabled |= self.tta;
        if self.cpu {
            tagger.prefer_accelerated = false;
        }
        for tag in self.exclude.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            if !tagger.exclude_tags.iter().any(|e| e == tag) {
                tagger.exclude_tags.push(tag.to_string());
            }
        }
    }

    fn output_format(&self, config: &Config) -> OutputFormat {
        self.format
            .map(OutputFormat::from)
            .or_else(|| OutputFormat::parse(&config.output.format))
            .unwrap_or(OutputFormat::Json)
    }
}

pub async fn execute(args: TagArgs, mut config: Config) -> anyhow::Result<()> {
    args.apply_overrides(&mut config);
    config.tagger.validate()?;

    let files = FileDiscovery::new(&config.processing.supported_formats).discover(&args.input);
    if files.is_empty() {
        tracing::warn!("No supported image files found at {:?}", args.input);
        return Ok(());
    }
    tracing::info!("Found {} image(s) to tag", files.len());

    let skip_hashes = match (&args.output, args.skip_existing) {
        (Some(path), true) => {
            let hashes = load_existing_hashes(path)?;
            if !hashes.is_empty() {
                tracing::info!("Loaded {} existing hashes from {:?}", hashes.len(), path);
            }
            hashes
        }
        (None, true) => {
            tracing::warn!("--skip-existing has no effect without --output");
            Default::default()
        }
        _ => Default::default(),
    };

    let format = args.output_format(&config);
    let (records, summary) = run_batch(config.clone(), files, skip_hashes).await?;

    if args.sidecar {
        write_sidecars(&records, &config.output.caption_separator);
    }

    let sink = RecordSink {
        path: args.output.as_deref(),
        format,
        pretty: config.output.pretty,
        keep_existing: args.skip_existing,
    };
    write_records(&records, &sink)?;

    batch::print_summary(&summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: TagArgs,
    }

    fn parse(argv: &[&str]) -> TagArgs {
        TestCli::parse_from(std::iter::once("wdtag").chain(argv.iter().copied())).args
    }

    #[test]
    fn test_overrides_apply_to_tagger_config() {
        let args = parse(&[
            "img.png",
            "--general-threshold",
            "0.5",
            "--max-tags",
            "20",
            "--general-mcut",
            "--sigmoid",
            "--tta",
            "--cpu",
            "--exclude",
            "watermark, text,watermark",
        ]);
        let mut config = Config::default();
        args.apply_overrides(&mut config);

        let t = &config.tagger;
        assert_eq!(t.general_threshold, 0.5);
        assert_eq!(t.character_threshold, 0.85);
        assert_eq!(t.max_tags, 20);
        assert!(t.general_mcut_enabled);
        assert!(!t.character_mcut_enabled);
        assert!(t.apply_sigmoid);
        assert!(t.tta_enabled);
        assert!(!t.prefer_accelerated);
        assert_eq!(t.exclude_tags, vec!["watermark", "text"]);
    }

    #[test]
    fn test_missing_flags_keep_config_values() {
        let mut config = Config::default();
        config.tagger.apply_sigmoid = true;
        config.tagger.general_threshold = 0.2;

        parse(&["img.png"]).apply_overrides(&mut config);
        assert!(config.tagger.apply_sigmoid);
        assert_eq!(config.tagger.general_threshold, 0.2);
        assert!(config.tagger.prefer_accelerated);
    }

    #[test]
    fn test_output_format_falls_back_to_config() {
        let mut config = Config::default();
        config.output.format = "jsonl".to_string();

        assert_eq!(
            parse(&["img.png"]).output_format(&config),
            OutputFormat::JsonLines
        );
        assert_eq!(
            parse(&["img.png", "-f", "json"]).output_format(&config),
            OutputFormat::Json
        );
    }

    #[test]
    fn test_invalid_threshold_fails_validation() {
        let mut config = Config::default();
        parse(&["img.png", "--character-threshold", "1.5"]).apply_overrides(&mut config);
        assert!(config.tagger.validate().is_err());
    }
}
