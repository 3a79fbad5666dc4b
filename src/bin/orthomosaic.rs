use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "orthomosaic", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite a layout into a single PNG.
    Render(RenderArgs),
    /// Compute ownership masks for a layout and store them for later `--reuse-masks` renders.
    Masks(MasksArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input layout JSON.
    #[arg(long)]
    layout: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Alpha-overlay sources instead of pyramid blending.
    #[arg(long)]
    draft: bool,

    /// Fill transparent holes from neighbouring data.
    #[arg(long)]
    fill_holes: bool,

    /// Use masks already present in `--mask-dir`.
    #[arg(long)]
    reuse_masks: bool,

    /// Directory holding `mask.<index>.png` files. Masks stay in memory when omitted.
    #[arg(long)]
    mask_dir: Option<PathBuf>,

    /// Cache budget in MiB.
    #[arg(long, default_value_t = 512)]
    cache_mb: usize,

    /// Tile edge length in pixels.
    #[arg(long, default_value_t = 256)]
    tile_size: usize,

    /// Worker threads (defaults to rayon's choice).
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Parser, Debug)]
struct MasksArgs {
    /// Input layout JSON.
    #[arg(long)]
    layout: PathBuf,

    /// Directory to write `mask.<index>.png` files into.
    #[arg(long)]
    mask_dir: PathBuf,

    /// Cache budget in MiB.
    #[arg(long, default_value_t = 512)]
    cache_mb: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Masks(args) => cmd_masks(args),
    }
}

fn read_layout(path: &Path) -> anyhow::Result<orthomosaic::MosaicLayout> {
    orthomosaic::MosaicLayout::load(path)
        .with_context(|| format!("load layout '{}'", path.display()))
}

fn layout_root(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}

fn cache_with_mb(mb: usize) -> orthomosaic::GenerationCache {
    orthomosaic::GenerationCache::new(mb.saturating_mul(1024 * 1024))
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut layout = read_layout(&args.layout)?;
    let mut opts = layout.opts.unwrap_or_default();
    opts.draft_mode |= args.draft;
    opts.fill_holes |= args.fill_holes;
    opts.reuse_masks |= args.reuse_masks;
    layout.opts = Some(opts);

    let masks: Arc<dyn orthomosaic::MaskStore> = match &args.mask_dir {
        Some(dir) => Arc::new(orthomosaic::DirMaskStore::new(dir)?),
        None if opts.reuse_masks && !opts.draft_mode => {
            anyhow::bail!("--reuse-masks needs --mask-dir");
        }
        None => Arc::new(orthomosaic::MemoryMaskStore::new()),
    };

    let composite = layout.build_composite::<orthomosaic::Rgba>(
        layout_root(&args.layout),
        cache_with_mb(args.cache_mb),
        masks,
    )?;
    let region = orthomosaic::PixelBox::from_size(composite.cols(), composite.rows());
    let tile_opts = orthomosaic::TileOpts {
        tile_size: args.tile_size,
        threads: args.threads,
    };
    let out = orthomosaic::render_tiled(
        &composite,
        region,
        &tile_opts,
        &orthomosaic::CancelToken::new(),
    )?;

    orthomosaic::save_image(&args.out, &out)
        .with_context(|| format!("write png '{}'", args.out.display()))?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_masks(args: MasksArgs) -> anyhow::Result<()> {
    let mut layout = read_layout(&args.layout)?;
    let mut opts = layout.opts.unwrap_or_default();
    opts.draft_mode = false;
    opts.reuse_masks = false;
    layout.opts = Some(opts);

    let store = orthomosaic::DirMaskStore::new(&args.mask_dir)?;
    let composite = layout.build_composite::<orthomosaic::Rgba>(
        layout_root(&args.layout),
        cache_with_mb(args.cache_mb),
        Arc::new(store.clone()),
    )?;
    eprintln!(
        "wrote {} masks to {}",
        composite.source_count(),
        store.dir().display()
    );
    Ok(())
}
