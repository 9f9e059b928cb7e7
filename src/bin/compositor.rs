use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use compositor::{
    Float4, GpuDevice, Int2, NodeTree, OperationRegistry, SoftwareDevice, SoftwareDeviceOpts,
    ViewportCompositor, ViewportCompositorOpts, ViewportHost,
};

#[derive(Parser, Debug)]
#[command(name = "compositor", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a node tree into a PNG.
    Eval(EvalArgs),
    /// Parse and validate a node tree without evaluating it.
    Validate(ValidateArgs),
    /// List the node types with a built-in operation.
    Nodes,
}

#[derive(Parser, Debug)]
struct EvalArgs {
    /// Node tree JSON.
    #[arg(long)]
    tree: PathBuf,

    /// Viewport width.
    #[arg(long)]
    width: u32,

    /// Viewport height.
    #[arg(long)]
    height: u32,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Render pass read by image nodes, as `VIEW_LAYER/PASS=path.png`. Repeatable.
    #[arg(long = "input", value_parser = parse_input_pass)]
    inputs: Vec<InputPass>,

    /// Frame number reported to the node tree.
    #[arg(long, default_value_t = 0)]
    frame: i32,

    /// Evaluate on a single thread.
    #[arg(long)]
    sequential: bool,

    /// Device to evaluate on.
    #[arg(long, value_enum, default_value_t = DeviceChoice::Software)]
    device: DeviceChoice,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DeviceChoice {
    Software,
    #[cfg(feature = "gpu")]
    Gpu,
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Node tree JSON.
    #[arg(long)]
    tree: PathBuf,
}

#[derive(Clone, Debug)]
struct InputPass {
    view_layer: String,
    pass: String,
    path: PathBuf,
}

fn parse_input_pass(arg: &str) -> Result<InputPass, String> {
    let (name, path) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected VIEW_LAYER/PASS=path, got '{arg}'"))?;
    let (view_layer, pass) = name
        .split_once('/')
        .ok_or_else(|| format!("expected VIEW_LAYER/PASS before '=', got '{name}'"))?;
    if view_layer.is_empty() || pass.is_empty() || path.is_empty() {
        return Err(format!("empty component in '{arg}'"));
    }
    Ok(InputPass {
        view_layer: view_layer.to_owned(),
        pass: pass.to_owned(),
        path: PathBuf::from(path),
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Eval(args) => cmd_eval(args),
        Command::Validate(args) => cmd_validate(args),
        Command::Nodes => cmd_nodes(),
    }
}

fn read_tree(path: &Path) -> anyhow::Result<NodeTree> {
    let tree = NodeTree::from_path(path)
        .with_context(|| format!("read node tree '{}'", path.display()))?;
    tree.validate()?;
    Ok(tree)
}

fn load_png(path: &Path) -> anyhow::Result<(Int2, Vec<Float4>)> {
    let image = image::open(path)
        .with_context(|| format!("open image '{}'", path.display()))?
        .into_rgba32f();
    let size = Int2::new(
        i32::try_from(image.width()).context("image too wide")?,
        i32::try_from(image.height()).context("image too tall")?,
    );
    let texels = image
        .pixels()
        .map(|p| Float4::new(p.0[0], p.0[1], p.0[2], p.0[3]))
        .collect();
    Ok((size, texels))
}

fn write_png(path: &Path, width: u32, height: u32, texels: &[Float4]) -> anyhow::Result<()> {
    let data: Vec<u8> = texels
        .iter()
        .flat_map(|t| t.0)
        .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        path,
        &data,
        width,
        height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))
}

fn make_device(choice: DeviceChoice, sequential: bool) -> anyhow::Result<Box<dyn GpuDevice>> {
    match choice {
        DeviceChoice::Software => Ok(Box::new(SoftwareDevice::new(SoftwareDeviceOpts {
            parallel: !sequential,
            ..SoftwareDeviceOpts::default()
        })?)),
        #[cfg(feature = "gpu")]
        DeviceChoice::Gpu => Ok(Box::new(compositor::WgpuDevice::new(
            compositor::WgpuDeviceOpts::default(),
        )?)),
    }
}

fn cmd_eval(args: EvalArgs) -> anyhow::Result<()> {
    let tree = read_tree(&args.tree)?;
    anyhow::ensure!(
        args.width > 0 && args.height > 0,
        "viewport must be at least 1x1"
    );
    let viewport = Int2::new(
        i32::try_from(args.width).context("width out of range")?,
        i32::try_from(args.height).context("height out of range")?,
    );

    let mut gpu = make_device(args.device, args.sequential)?;
    let mut host = ViewportHost::new(gpu.as_mut(), viewport)?;
    host.set_frame_number(args.frame);
    for input in &args.inputs {
        let (size, texels) = load_png(&input.path)?;
        host.upload_input_pass(gpu.as_mut(), &input.view_layer, &input.pass, size, &texels)
            .with_context(|| format!("upload pass {}/{}", input.view_layer, input.pass))?;
    }

    let mut compositor = ViewportCompositor::new(
        gpu,
        Box::new(host),
        ViewportCompositorOpts::default(),
    );
    compositor.set_node_tree(tree);
    compositor.redraw()?;
    if let Some(message) = compositor.context().info_message() {
        eprintln!("info: {message}");
    }

    let texels = compositor.read_output()?;
    write_png(&args.out, args.width, args.height, &texels)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let tree = read_tree(&args.tree)?;
    let registry = OperationRegistry::default();
    let unknown: Vec<&str> = tree
        .nodes
        .iter()
        .filter(|n| !registry.contains(&n.ty))
        .map(|n| n.id.as_str())
        .collect();
    if !unknown.is_empty() {
        eprintln!("nodes without a built-in operation: {}", unknown.join(", "));
    }
    eprintln!(
        "{}: {} nodes, {} links, fingerprint {:032x}",
        args.tree.display(),
        tree.nodes.len(),
        tree.links.len(),
        tree.fingerprint()
    );
    Ok(())
}

fn cmd_nodes() -> anyhow::Result<()> {
    let registry = OperationRegistry::default();
    for ty in registry.node_types() {
        println!("{ty}");
    }
    Ok(())
}
