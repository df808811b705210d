//! rsform - fill a PDF form from JSON and flatten it
//!
//! ```text
//! rsform --input sample_form.pdf --fields formdata.json --output output.pdf \
//!        --font-fallback Helvetica-Oblique \
//!        --font-map email4=./DoHyeon-Regular.ttf \
//!        --font-map 'address5[city]=cid:./rounded-mplus-1p-regular.ttf'
//! ```

use acroform::{
    fill_and_flatten, load_field_values, load_style, AppearanceStyle, FontSpec, PipelineOptions,
};
use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about = "Fill a PDF form from JSON and flatten it")]
struct Cli {
    /// Form PDF to fill
    #[arg(short, long)]
    input: PathBuf,

    /// JSON field data
    #[arg(short, long)]
    fields: PathBuf,

    /// Where to write the result
    #[arg(short, long)]
    output: PathBuf,

    /// Font for fields without an override, `[std:|ttf:|cid:]name[@size]`
    #[arg(long, value_name = "SPEC")]
    font_fallback: Option<FontSpec>,

    /// Font for one field, repeatable
    #[arg(long = "font-map", value_name = "FIELD=SPEC", value_parser = parse_font_map)]
    font_map: Vec<(String, FontSpec)>,

    /// Style configuration file (JSON)
    #[arg(long, value_name = "JSON")]
    style: Option<PathBuf>,

    /// Keep the form interactive
    #[arg(long)]
    no_flatten: bool,

    /// Embed composite fonts whole
    #[arg(long)]
    no_subset: bool,

    /// Keep appearances that already exist
    #[arg(long, value_name = "BOOL")]
    only_if_missing: Option<bool>,

    /// Regenerate appearances even where one exists
    #[arg(long, value_name = "BOOL")]
    force_replace: Option<bool>,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_font_map(s: &str) -> std::result::Result<(String, FontSpec), String> {
    let (field, spec) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=SPEC, got {s:?}"))?;
    if field.is_empty() {
        return Err(format!("missing field name in {s:?}"));
    }
    let spec = spec.parse::<FontSpec>().map_err(|e| e.to_string())?;
    Ok((field.to_string(), spec))
}

impl Cli {
    /// Defaults, then the style file, then flags given on the command line
    fn settings(&self) -> Result<(AppearanceStyle, PipelineOptions)> {
        let mut style = AppearanceStyle::default()
            .only_if_missing(true)
            .force_replace(true);
        let mut options = PipelineOptions::default();

        if let Some(path) = &self.style {
            let config = load_style(path)
                .with_context(|| format!("reading style {}", path.display()))?;
            config.apply(&mut style)?;
            options.apply_config(&config);
        }

        if let Some(fallback) = &self.font_fallback {
            style.fallback = fallback.clone();
        }
        for (field, spec) in &self.font_map {
            style.field_fallbacks.insert(field.clone(), spec.clone());
        }
        if let Some(value) = self.only_if_missing {
            style.only_if_missing = value;
        }
        if let Some(value) = self.force_replace {
            style.force_replace = value;
        }
        if self.no_flatten {
            options.flatten = false;
        }
        if self.no_subset {
            options.subset_fonts = false;
        }
        Ok((style, options))
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(cli: &Cli) -> Result<()> {
    let values = load_field_values(&cli.fields)?;
    let (style, options) = cli.settings()?;
    log::info!(
        "filling {} with {} values ({} field fonts)",
        cli.input.display(),
        values.len(),
        style.field_fallbacks.len()
    );

    let report = fill_and_flatten(&cli.input, &cli.output, &values, &style, &options)?;
    for name in &report.missing {
        log::warn!("field {name:?} not found");
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => {
            println!("Success, output written to {}", cli.output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
