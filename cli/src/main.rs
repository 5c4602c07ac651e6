//! carbonfill CLI - emissions report generator

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use carbonfill::{
    BlockKind, Carbonfill, CleanupOptions, DocxPackage, ExpandStats, JsonFormat, ReportContext,
    TemplateOutline,
};

#[derive(Parser)]
#[command(name = "carbonfill")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Fill Word report templates with emissions data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one report
    Render {
        /// Word template
        #[arg(value_name = "TEMPLATE")]
        template: PathBuf,

        /// Report data (JSON)
        #[arg(value_name = "DATA")]
        data: PathBuf,

        /// Output file (defaults to the data file name with .docx)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Directory holding static images (logo, catalog images)
        #[arg(long, value_name = "DIR", env = "CARBONFILL_ASSETS")]
        assets: Option<PathBuf>,

        /// Skip charts, tables and images
        #[arg(long)]
        no_media: bool,

        /// Keep marker and orphan paragraphs (template debugging)
        #[arg(long)]
        keep_markers: bool,

        /// Also dump the expanded document model as JSON
        #[arg(long, value_name = "FILE")]
        dump: Option<PathBuf>,
    },

    /// Show the sections and placeholders of a template
    Inspect {
        /// Word template
        #[arg(value_name = "TEMPLATE")]
        template: PathBuf,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the organisation tree and totals of a data file
    Tree {
        /// Report data (JSON)
        #[arg(value_name = "DATA")]
        data: PathBuf,
    },

    /// Generate one report per data file
    Batch {
        /// Word template
        #[arg(value_name = "TEMPLATE")]
        template: PathBuf,

        /// Report data files (JSON)
        #[arg(value_name = "DATA", required = true, num_args = 1..)]
        data: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output: PathBuf,

        /// Directory holding static images (logo, catalog images)
        #[arg(long, value_name = "DIR", env = "CARBONFILL_ASSETS")]
        assets: Option<PathBuf>,

        /// Skip charts, tables and images
        #[arg(long)]
        no_media: bool,
    },

    /// Show version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Render {
            template,
            data,
            output,
            assets,
            no_media,
            keep_markers,
            dump,
        }) => cmd_render(
            &template,
            &data,
            output.as_deref(),
            builder(assets.as_deref(), no_media, keep_markers),
            dump.as_deref(),
        ),
        Some(Commands::Inspect { template, json }) => cmd_inspect(&template, json),
        Some(Commands::Tree { data }) => cmd_tree(&data),
        Some(Commands::Batch {
            template,
            data,
            output,
            assets,
            no_media,
        }) => cmd_batch(
            &template,
            &data,
            &output,
            builder(assets.as_deref(), no_media, false),
        ),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            println!(
                "{}",
                "Usage: carbonfill render <TEMPLATE> <DATA> [-o FILE]".yellow()
            );
            println!("       carbonfill --help for more information");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn builder(assets: Option<&Path>, no_media: bool, keep_markers: bool) -> Carbonfill {
    let mut builder = Carbonfill::new();
    if let Some(dir) = assets {
        builder = builder.with_assets_dir(dir);
    }
    if no_media {
        builder = builder.without_media();
    }
    if keep_markers {
        builder = builder.with_cleanup(CleanupOptions::none());
    }
    builder
}

fn default_output(data: &Path, dir: &Path) -> PathBuf {
    let stem = data.file_stem().unwrap_or_default().to_string_lossy();
    dir.join(format!("{}.docx", stem))
}

fn print_stats(stats: &ExpandStats) {
    println!(
        "  {} {} lot(s), {} activity section(s), {} post(s), {} other post(s)",
        "├─".dimmed(),
        stats.lot_count,
        stats.activity_count,
        stats.post_count,
        stats.other_post_count
    );
    println!(
        "  {} {} chart(s), {} table(s), {} image(s), {} skipped",
        "├─".dimmed(),
        stats.chart_count,
        stats.table_count,
        stats.image_count,
        stats.injections_skipped
    );
    println!(
        "  {} {} section(s) removed, {} marker(s) and {} orphan(s) cleaned",
        "└─".dimmed(),
        stats.blocks_removed,
        stats.markers_removed,
        stats.orphans_removed
    );
}

fn cmd_render(
    template: &Path,
    data: &Path,
    output: Option<&Path>,
    builder: Carbonfill,
    dump: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = carbonfill::load_context(data)?;
    for warning in ctx.warnings() {
        println!("{} {}", "Warning:".yellow(), warning);
    }

    let result = builder.render_path(template, &ctx)?;

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output(data, Path::new(".")));
    result.save(&output)?;

    if let Some(path) = dump {
        fs::write(path, result.to_json(JsonFormat::Pretty)?)?;
        println!("{} {}", "Model dumped to".green(), path.display());
    }

    println!("{} {}", "Saved to".green(), output.display());
    print_stats(&result.stats);

    Ok(())
}

fn cmd_inspect(template: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let package = DocxPackage::open(template)?;
    let doc = package.document()?;
    let outline = TemplateOutline::scan(&doc);

    if json {
        println!("{}", serde_json::to_string_pretty(&outline)?);
        return Ok(());
    }

    println!("{}", "Template Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "File".bold(), template.display());
    if let Some(ref title) = doc.metadata.title {
        println!("{}: {}", "Title".bold(), title);
    }
    println!("{}: {}", "Body elements".bold(), outline.body_len);

    println!();
    println!("{}", "Sections".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    if outline.blocks.is_empty() {
        println!("{}", "(none)".dimmed());
    }
    for block in &outline.blocks {
        println!(
            "{}{} [{}..={}]",
            "  ".repeat(block.depth),
            block.kind.to_string().bold(),
            block.extent.start,
            block.extent.end
        );
    }
    let kinds: Vec<String> = BlockKind::ALL
        .iter()
        .filter(|k| outline.blocks_of(**k).next().is_none())
        .map(|k| k.to_string())
        .collect();
    if !kinds.is_empty() {
        println!("{} {}", "Not offered:".dimmed(), kinds.join(", ").dimmed());
    }
    for stray in &outline.stray_markers {
        println!(
            "{} unmatched {} at element {}",
            "Warning:".yellow(),
            stray.marker,
            stray.index
        );
    }

    println!();
    println!("{}", "Placeholders".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for (name, count) in &outline.placeholders {
        println!("{} {}", format!("{{{{{}}}}}", name).bold(), format!("×{}", count).dimmed());
    }

    Ok(())
}

fn cmd_tree(data: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = carbonfill::load_context(data)?;

    println!("{}", "Organisation".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    print!("{}", ctx.tree().render_tree());

    println!();
    println!("{}", "Emissions".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    let org = ctx.org_result();
    println!("{}: {}", "Year".bold(), ctx.year());
    println!("{}: {:.2} tCO₂e", "Total".bold(), org.total_tco2e);
    println!(
        "{}: {:.2} / {:.2} / {:.2}",
        "Scopes 1/2/3".bold(),
        org.scope1_tco2e,
        org.scope2_tco2e,
        org.scope3_tco2e
    );
    for (rank, poste) in org.top_postes.iter().enumerate() {
        println!(
            "  {}. {} {:.2}",
            rank + 1,
            ctx.poste_label(&poste.code),
            poste.tco2e
        );
    }
    if !org.other_postes.is_empty() {
        println!("  {} {} other post(s)", "+".dimmed(), org.other_postes.len());
    }

    if !ctx.warnings().is_empty() {
        println!();
        for warning in ctx.warnings() {
            println!("{} {}", "Warning:".yellow(), warning);
        }
    }

    Ok(())
}

fn cmd_batch(
    template: &Path,
    data: &[PathBuf],
    output_dir: &Path,
    builder: Carbonfill,
) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(output_dir)?;
    let package = DocxPackage::open(template)?;

    let pb = ProgressBar::new(data.len() as u64 * 2);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    pb.set_message("Loading data...");
    let mut paths = Vec::new();
    let mut contexts: Vec<ReportContext> = Vec::new();
    let mut failed = 0usize;
    for path in data {
        match carbonfill::load_context(path) {
            Ok(ctx) => {
                paths.push(path);
                contexts.push(ctx);
            }
            Err(e) => {
                pb.println(format!("{} {}: {}", "Failed".red(), path.display(), e));
                failed += 1;
            }
        }
        pb.inc(1);
    }

    log::debug!("{} context(s) loaded, {} failed", contexts.len(), failed);
    pb.set_message("Rendering...");
    let outputs = builder.render_batch(&package, &contexts);
    for (path, result) in paths.into_iter().zip(outputs) {
        let target = default_output(path, output_dir);
        match result.and_then(|out| out.save(&target)) {
            Ok(()) => pb.println(format!("{} {}", "Saved".green(), target.display())),
            Err(e) => {
                pb.println(format!("{} {}: {}", "Failed".red(), path.display(), e));
                failed += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("Done!");

    println!(
        "\n{} {} report(s) written, {} failed",
        "Done!".green().bold(),
        data.len() - failed,
        failed
    );
    if failed > 0 {
        return Err(format!("{} report(s) failed", failed).into());
    }
    Ok(())
}

fn cmd_version() {
    println!("{} {}", "carbonfill".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Emissions report generator for Word templates");
    println!();
    println!(
        "Repository: {}",
        "https://github.com/iyulab/carbonfill".dimmed()
    );
    println!("License: MIT");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_render() {
        let cli = Cli::try_parse_from([
            "carbonfill",
            "render",
            "modele.docx",
            "bilan.json",
            "-o",
            "out.docx",
            "--no-media",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Render {
                output, no_media, ..
            }) => {
                assert_eq!(output, Some(PathBuf::from("out.docx")));
                assert!(no_media);
            }
            _ => panic!("expected render"),
        }
        assert!(Cli::try_parse_from(["carbonfill", "batch", "modele.docx"]).is_err());
    }

    #[test]
    fn test_default_output() {
        assert_eq!(
            default_output(Path::new("data/bilan_2024.json"), Path::new("out")),
            Path::new("out").join("bilan_2024.docx")
        );
    }

    #[test]
    fn test_inspect_blank_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.docx");
        let package = DocxPackage::blank();
        package
            .save(&package.document().unwrap(), &path)
            .unwrap();
        assert!(cmd_inspect(&path, true).is_ok());
        assert!(cmd_inspect(&dir.path().join("missing.docx"), false).is_err());
    }
}
